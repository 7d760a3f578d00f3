//! OS-backed secret store for the device's single secp256k1 key.
//!
//! Two `keyring` entries back the two access classes a custodied signing
//! key needs: a local-only slot (`ACCOUNT_LOCAL`) and an opt-in
//! cloud-synced slot (`ACCOUNT_CLOUD`), both under the same service
//! namespace. `keyring`'s cross-platform API stores passwords as opaque
//! strings, so the 32-byte scalar is persisted as lowercase hex — the
//! same representation `exportHex`/`importHex` use at the I/O boundary.
//! True OS accessibility classes (`kSecAttrAccessibleWhenUnlockedThisDeviceOnly`
//! and friends) are a platform-specific keychain attribute the portable
//! `keyring` API doesn't expose; see DESIGN.md for how that's handled.

use crate::error::WalletError;
use alloy_primitives::Address;
use keyring::Entry;
use rand::RngCore;
use tracing::{info, warn};

const ACCOUNT_LOCAL: &str = "private_key";
const ACCOUNT_CLOUD: &str = "private_key.cloud";

pub struct Keystore {
    namespace: String,
}

impl Keystore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry, WalletError> {
        Entry::new(&self.namespace, account).map_err(|e| WalletError::KeystoreIo(e.to_string()))
    }

    /// Generate 32 random bytes via the OS CSPRNG and persist them to the
    /// local-only slot. Fails with `already-exists` semantics by way of
    /// `WalletError::KeystoreIo` if a key is already present (callers
    /// should `restore()` first to check).
    pub fn create(&self) -> Result<Address, WalletError> {
        if self.restore().is_ok() {
            return Err(WalletError::KeystoreIo("wallet already exists".into()));
        }

        let mut secret = [0u8; 32];
        rand::rngs::OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| WalletError::RngFailed(e.to_string()))?;

        let address =
            crate::crypto::derive_address(&secret).map_err(|_| WalletError::RngFailed(
                "generated scalar was out of range; retry".into(),
            ))?;

        self.write_local(&secret)?;
        info!("created wallet {address}");
        Ok(address)
    }

    /// Cloud-synced slot first, then local-only; `no-wallet` on a full miss.
    pub fn restore(&self) -> Result<[u8; 32], WalletError> {
        if let Ok(entry) = self.entry(ACCOUNT_CLOUD) {
            if let Ok(hex_secret) = entry.get_password() {
                return hex_to_secret(&hex_secret);
            }
        }
        let entry = self.entry(ACCOUNT_LOCAL)?;
        match entry.get_password() {
            Ok(hex_secret) => hex_to_secret(&hex_secret),
            Err(keyring::Error::NoEntry) => Err(WalletError::NoWallet),
            Err(e) => Err(WalletError::KeystoreIo(e.to_string())),
        }
    }

    pub fn export_hex(&self) -> Result<String, WalletError> {
        let secret = self.restore()?;
        Ok(hex::encode(secret))
    }

    pub fn import_hex(&self, hex_str: &str) -> Result<Address, WalletError> {
        let secret = hex_to_secret(hex_str)?;
        let address = crate::crypto::derive_address(&secret)?;
        self.write_local(&secret)?;
        Ok(address)
    }

    /// Deletes the local-only slot and re-writes the key to the
    /// cloud-synced slot. Idempotent: calling it twice in a row succeeds.
    pub fn enable_cloud_sync(&self) -> Result<(), WalletError> {
        let secret = self.restore()?;
        let cloud = self.entry(ACCOUNT_CLOUD)?;
        cloud
            .set_password(&hex::encode(secret))
            .map_err(|e| WalletError::KeystoreIo(e.to_string()))?;

        if let Ok(local) = self.entry(ACCOUNT_LOCAL) {
            match local.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!("failed to clear local-only slot after cloud sync: {e}"),
            }
        }
        Ok(())
    }

    pub fn delete(&self) -> Result<(), WalletError> {
        let mut last_err = None;
        for account in [ACCOUNT_LOCAL, ACCOUNT_CLOUD] {
            match self.entry(account).and_then(|e| {
                e.delete_credential()
                    .map_err(|err| WalletError::KeystoreIo(err.to_string()))
            }) {
                Ok(()) => {}
                Err(WalletError::KeystoreIo(msg)) if msg.contains("NoEntry") => {}
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_local(&self, secret: &[u8; 32]) -> Result<(), WalletError> {
        let entry = self.entry(ACCOUNT_LOCAL)?;
        entry
            .set_password(&hex::encode(secret))
            .map_err(|e| WalletError::KeystoreIo(e.to_string()))
    }
}

fn hex_to_secret(input: &str) -> Result<[u8; 32], WalletError> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(trimmed).map_err(|_| WalletError::InvalidKey)?;
    if bytes.len() != 32 {
        return Err(WalletError::InvalidKey);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    if out.iter().all(|b| *b == 0) {
        return Err(WalletError::InvalidKey);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_hex() {
        assert!(matches!(hex_to_secret("abcd"), Err(WalletError::InvalidKey)));
    }

    #[test]
    fn rejects_zero_scalar() {
        let zero_hex = "0".repeat(64);
        assert!(matches!(hex_to_secret(&zero_hex), Err(WalletError::InvalidKey)));
    }

    #[test]
    fn accepts_with_or_without_0x_prefix() {
        let hex_str = "01".repeat(32);
        let with_prefix = format!("0x{hex_str}");
        assert_eq!(hex_to_secret(&hex_str).unwrap(), hex_to_secret(&with_prefix).unwrap());
    }
}
