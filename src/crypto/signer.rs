use crate::error::WalletError;
use alloy_primitives::{Address, B256};
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;

/// A recoverable ECDSA signature: `(r, s, recoveryId)` per spec, kept as raw
/// 32-byte big-endian components rather than a curve-library type so RLP
/// encoding (which strips leading zeros) and transaction assembly don't
/// need to know about `alloy_primitives::Signature` internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

fn signer_from_key(secret: &[u8; 32]) -> Result<PrivateKeySigner, WalletError> {
    if secret.iter().all(|b| *b == 0) {
        return Err(WalletError::InvalidKey);
    }
    PrivateKeySigner::from_bytes(&B256::from(*secret)).map_err(|_| WalletError::InvalidKey)
}

/// Uncompressed pubkey -> drop `0x04` prefix -> keccak -> last 20 bytes.
pub fn derive_address(secret: &[u8; 32]) -> Result<Address, WalletError> {
    let signer = signer_from_key(secret)?;
    Ok(signer.address())
}

/// Feeds the 32-byte digest directly into secp256k1 ECDSA signing (no
/// internal re-hashing) and returns the recoverable signature components.
pub async fn sign_recoverable(
    hash: &[u8; 32],
    secret: &[u8; 32],
) -> Result<RecoverableSignature, WalletError> {
    let signer = signer_from_key(secret)?;
    let signature = signer
        .sign_hash(&B256::from(*hash))
        .await
        .map_err(|e| WalletError::SigningFailed(e.to_string()))?;

    // alloy's Signature::as_bytes() returns r(32) || s(32) || recovery_id(1),
    // with recovery_id already normalized to 0/1 (not the Ethereum 27/28 form).
    let bytes = signature.as_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[0..32]);
    s.copy_from_slice(&bytes[32..64]);
    let recovery_id = bytes[64];

    Ok(RecoverableSignature { r, s, recovery_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    fn test_key(byte: u8) -> [u8; 32] {
        let mut k = [byte; 32];
        k[0] = 0x01; // keep well under curve order n
        k
    }

    #[test]
    fn zero_key_is_rejected() {
        let zero = [0u8; 32];
        assert!(matches!(derive_address(&zero), Err(WalletError::InvalidKey)));
    }

    #[test]
    fn derive_address_is_deterministic() {
        let key = test_key(7);
        let a1 = derive_address(&key).unwrap();
        let a2 = derive_address(&key).unwrap();
        assert_eq!(a1, a2);
    }

    #[tokio::test]
    async fn recovered_pubkey_matches_signer_address() {
        let key = test_key(9);
        let address = derive_address(&key).unwrap();
        let hash = keccak256(b"pay five dollars");
        let sig = sign_recoverable(&hash, &key).await.unwrap();

        let signature = alloy_primitives::Signature::from_bytes_and_parity(
            &[sig.r.as_slice(), sig.s.as_slice()].concat(),
            sig.recovery_id != 0,
        )
        .unwrap();
        let recovered = signature
            .recover_address_from_prehash(&B256::from(hash))
            .unwrap();
        assert_eq!(recovered, address);
    }
}
