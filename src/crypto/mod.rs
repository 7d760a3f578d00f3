pub mod keccak;
pub mod signer;

pub use keccak::keccak256;
pub use signer::{derive_address, sign_recoverable, RecoverableSignature};
