use thiserror::Error;

/// Errors surfaced by the key/signing/storage layer (C1, C3).
///
/// Variant names mirror the error taxonomy the payment flow and tool
/// dispatcher speak back to the voice agent — callers match on these
/// rather than on message text.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("rng-failed: {0}")]
    RngFailed(String),

    #[error("keystore-io: {0}")]
    KeystoreIo(String),

    #[error("no-wallet")]
    NoWallet,

    #[error("invalid-key")]
    InvalidKey,

    #[error("invalid-address: {0}")]
    InvalidAddress(String),

    #[error("signing-failed: {0}")]
    SigningFailed(String),

    #[error("rpc-error: {message} (code {code})")]
    RpcError { message: String, code: i64 },

    #[error("gas-estimation-failed: {0}")]
    GasEstimationFailed(String),

    #[error("reverted: block={block} gas_used={gas_used}")]
    Reverted { block: u64, gas_used: u64 },

    #[error("timeout")]
    Timeout,

    #[error("no-pool")]
    NoPool,
}

/// Errors surfaced by the payment state machine and tool dispatcher (C10, C11).
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid-amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient-funds")]
    InsufficientFunds,

    #[error("invalid-state: {0}")]
    InvalidState(String),

    #[error("busy")]
    Busy,

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl PaymentError {
    /// The `status` string reported to the voice agent in tool responses.
    pub fn status(&self) -> &'static str {
        match self {
            PaymentError::InvalidAmount(_) => "invalid-amount",
            PaymentError::InsufficientFunds => "insufficient-funds",
            PaymentError::InvalidState(_) => "invalid-state",
            PaymentError::Busy => "busy",
            PaymentError::Cancelled => "cancelled",
            PaymentError::Wallet(WalletError::RngFailed(_)) => "rng-failed",
            PaymentError::Wallet(WalletError::KeystoreIo(_)) => "keystore-io",
            PaymentError::Wallet(WalletError::NoWallet) => "no-wallet",
            PaymentError::Wallet(WalletError::InvalidKey) => "invalid-key",
            PaymentError::Wallet(WalletError::InvalidAddress(_)) => "invalid-address",
            PaymentError::Wallet(WalletError::SigningFailed(_)) => "signing-failed",
            PaymentError::Wallet(WalletError::RpcError { .. }) => "rpc-error",
            PaymentError::Wallet(WalletError::GasEstimationFailed(_)) => "gas-estimation-failed",
            PaymentError::Wallet(WalletError::Reverted { .. }) => "reverted",
            PaymentError::Wallet(WalletError::Timeout) => "timeout",
            PaymentError::Wallet(WalletError::NoPool) => "no-pool",
        }
    }
}
