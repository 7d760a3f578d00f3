pub mod qr;
pub mod streams;

pub use qr::QrPayload;
pub use streams::{PcmSource, QrDetector};
