use crate::clock::Clock;
use crate::error::WalletError;
use crate::execution::rpc_client::RpcClient;
use alloy_primitives::Address;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Tracks the next nonce to use for this wallet's address.
///
/// Grounded on the chain-authoritative-with-a-grace-window pattern in the
/// teacher's `polygon_merger.rs::get_nonce`, generalized with an injectable
/// [`Clock`] so the 30-second "trust our own last-used nonce" window is
/// deterministic in tests: within the window we take
/// `max(chainPendingNonce, lastUsed + 1)` so a broadcast that hasn't yet
/// propagated to the node we're reading from doesn't cause a nonce
/// collision; once the window lapses we trust the chain unconditionally,
/// since by then any prior broadcast should be visible.
pub struct NonceManager {
    rpc: Arc<RpcClient>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
    state: Mutex<Option<LastUsed>>,
}

struct LastUsed {
    nonce: u64,
    at: chrono::DateTime<chrono::Utc>,
}

impl NonceManager {
    pub fn new(rpc: Arc<RpcClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rpc,
            clock,
            window: chrono::Duration::seconds(30),
            state: Mutex::new(None),
        }
    }

    /// Returns the nonce to use for the next transaction from `address`.
    /// Does not itself record the nonce as used — call [`Self::record_used`]
    /// only after the transaction has actually been broadcast.
    pub async fn next_nonce(&self, address: Address) -> Result<u64, WalletError> {
        let chain_nonce = self.rpc.pending_nonce(address).await?;

        let last = { self.state.lock().unwrap().as_ref().map(|l| (l.nonce, l.at)) };

        let nonce = match last {
            Some((last_nonce, at)) if self.clock.now() - at < self.window => {
                chain_nonce.max(last_nonce + 1)
            }
            _ => chain_nonce,
        };

        debug!("next nonce for {address}: {nonce} (chain reported {chain_nonce})");
        Ok(nonce)
    }

    /// Records that `nonce` was just used for a broadcast transaction,
    /// starting (or restarting) the grace window from now.
    pub fn record_used(&self, nonce: u64) {
        let mut guard = self.state.lock().unwrap();
        *guard = Some(LastUsed {
            nonce,
            at: self.clock.now(),
        });
    }

    /// Clears all cached state, forcing the next call to trust the chain
    /// unconditionally. Used when a payment is cancelled before broadcast.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = None;
    }
}
