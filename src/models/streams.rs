use futures_util::Stream;

/// The glasses transport's camera-frame decoder, expressed as a lazy,
/// finite sequence of raw QR payload strings rather than a callback
/// registration API. Cancellation is by dropping the stream.
pub trait QrDetector: Stream<Item = String> + Unpin {}
impl<T: Stream<Item = String> + Unpin> QrDetector for T {}

/// The glasses transport's Bluetooth audio feed, expressed the same way.
/// Out of scope to implement here — the voice front-end that consumes it
/// lives outside this engine — but the boundary is typed so a real
/// transport can be dropped in without touching the payment flow.
pub trait PcmSource: Stream<Item = Vec<u8>> + Unpin {}
impl<T: Stream<Item = Vec<u8>> + Unpin> PcmSource for T {}
