use crate::clock::Clock;
use crate::crypto::{keccak256, sign_recoverable};
use crate::error::WalletError;
use crate::execution::nonce_manager::NonceManager;
use crate::execution::rpc_client::{RpcClient, TransactionReceipt};
use crate::rlp::{encode_signed_transaction, encode_signing_payload};
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Assembles, signs, broadcasts and confirms legacy EIP-155 transactions.
///
/// The gas-price and gas-limit buffers and the receipt-polling backoff are
/// grounded directly on the teacher's `polygon_merger.rs` (`get_gas_price`'s
/// `price * 120 / 100` buffer and `wait_for_receipt`'s capped backoff loop).
pub struct TransactionBuilder {
    rpc: Arc<RpcClient>,
    nonce_manager: Arc<NonceManager>,
    clock: Arc<dyn Clock>,
    chain_id: u64,
    secret: [u8; 32],
    address: Address,
}

const GAS_PRICE_BUFFER_NUM: u64 = 120;
const GAS_PRICE_BUFFER_DEN: u64 = 100;
const GAS_LIMIT_BUFFER_NUM: u64 = 130;
const GAS_LIMIT_BUFFER_DEN: u64 = 100;
const FALLBACK_GAS_LIMIT_TRANSFER: u64 = 21_000;
const FALLBACK_GAS_LIMIT_CONTRACT: u64 = 500_000;
const RECEIPT_POLL_FLOOR: Duration = Duration::from_millis(500);
const RECEIPT_POLL_CAP: Duration = Duration::from_secs(4);
const RECEIPT_TOTAL_CAP: chrono::Duration = chrono::Duration::seconds(120);

pub struct BuiltTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
    pub nonce: u64,
}

impl TransactionBuilder {
    pub fn new(
        rpc: Arc<RpcClient>,
        nonce_manager: Arc<NonceManager>,
        clock: Arc<dyn Clock>,
        chain_id: u64,
        secret: [u8; 32],
        address: Address,
    ) -> Self {
        Self {
            rpc,
            nonce_manager,
            clock,
            chain_id,
            secret,
            address,
        }
    }

    /// Builds, signs and returns (without broadcasting) a transaction to
    /// `to` carrying `value` wei and `data` calldata. Gas price is the
    /// node's current `eth_gasPrice` plus a 20% buffer; gas limit is the
    /// estimated gas plus a 30% buffer, falling back to a flat value if
    /// estimation itself fails (the teacher falls back the same way when
    /// `eth_estimateGas` reverts on a simulation-sensitive call).
    pub async fn build(
        &self,
        to: Address,
        value: U256,
        data: Vec<u8>,
    ) -> Result<BuiltTransaction, WalletError> {
        let nonce = self.nonce_manager.next_nonce(self.address).await?;

        let node_gas_price = self.rpc.gas_price().await?;
        let gas_price = node_gas_price
            .checked_mul(U256::from(GAS_PRICE_BUFFER_NUM))
            .and_then(|v| v.checked_div(U256::from(GAS_PRICE_BUFFER_DEN)))
            .unwrap_or(node_gas_price);

        let gas_limit = match self
            .rpc
            .estimate_gas(self.address, to, value, &data)
            .await
        {
            Ok(estimated) => estimated
                .saturating_mul(GAS_LIMIT_BUFFER_NUM)
                / GAS_LIMIT_BUFFER_DEN,
            Err(e) => {
                let fallback = if data.is_empty() {
                    FALLBACK_GAS_LIMIT_TRANSFER
                } else {
                    FALLBACK_GAS_LIMIT_CONTRACT
                };
                warn!("gas estimation failed ({e}), falling back to {fallback}");
                fallback
            }
        };

        let signing_payload = encode_signing_payload(
            nonce, gas_price, gas_limit, to, value, &data, self.chain_id,
        );
        let digest = keccak256(&signing_payload);
        let sig = sign_recoverable(&digest, &self.secret).await?;

        let v = self.chain_id * 2 + 35 + sig.recovery_id as u64;
        let r = U256::from_be_bytes(sig.r);
        let s = U256::from_be_bytes(sig.s);

        let raw = encode_signed_transaction(nonce, gas_price, gas_limit, to, value, &data, v, r, s);
        let hash = keccak256(&raw);

        Ok(BuiltTransaction { raw, hash, nonce })
    }

    /// Broadcasts a built transaction and records its nonce as used.
    pub async fn broadcast(&self, tx: &BuiltTransaction) -> Result<[u8; 32], WalletError> {
        let hash = self.rpc.send_raw_transaction(&tx.raw).await?;
        self.nonce_manager.record_used(tx.nonce);
        info!("broadcast tx {} nonce={}", hex::encode(hash), tx.nonce);
        Ok(hash)
    }

    /// Polls `eth_getTransactionReceipt` with exponential backoff
    /// (500ms, doubling, capped at 4s) until mined, reverted, or the
    /// 120-second total cap elapses, in which case this returns
    /// `WalletError::Timeout` rather than treating the payment as failed.
    pub async fn wait_for_receipt(
        &self,
        hash: &[u8; 32],
    ) -> Result<TransactionReceipt, WalletError> {
        let started = self.clock.now();
        let mut delay = RECEIPT_POLL_FLOOR;

        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(hash).await? {
                if receipt.success {
                    return Ok(receipt);
                }
                return Err(WalletError::Reverted {
                    block: receipt.block_number,
                    gas_used: receipt.gas_used,
                });
            }

            if self.clock.now() - started >= RECEIPT_TOTAL_CAP {
                return Err(WalletError::Timeout);
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(RECEIPT_POLL_CAP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_limit_buffer_rounds_down() {
        let estimated = 21_000u64;
        let buffered = estimated.saturating_mul(GAS_LIMIT_BUFFER_NUM) / GAS_LIMIT_BUFFER_DEN;
        assert_eq!(buffered, 27_300);
    }

    #[test]
    fn gas_price_buffer_applies_twenty_percent() {
        let price = U256::from(100u64);
        let buffered = price
            .checked_mul(U256::from(GAS_PRICE_BUFFER_NUM))
            .and_then(|v| v.checked_div(U256::from(GAS_PRICE_BUFFER_DEN)))
            .unwrap();
        assert_eq!(buffered, U256::from(120u64));
    }

    #[test]
    fn v_value_follows_eip155_formula() {
        let chain_id = 8453u64;
        let recovery_id = 1u8;
        let v = chain_id * 2 + 35 + recovery_id as u64;
        assert_eq!(v, 8453 * 2 + 36);
    }
}
