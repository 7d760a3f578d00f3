use crate::error::WalletError;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The JSON-RPC transport `RpcClient` speaks through. The real
/// implementation is [`HttpTransport`]; tests substitute a scripted
/// in-memory responder behind the same trait rather than standing up a
/// live chain.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// Mirrors the teacher's request/response envelope handling in
/// `ClobClient`/`PolygonMerger::rpc_call`: one request id, surface
/// `error.message` verbatim, leave hex decoding to the caller.
struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        debug!("rpc -> {method}");
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::RpcError {
                message: e.to_string(),
                code: 0,
            })?;

        let parsed: JsonRpcResponse = resp.json().await.map_err(|e| WalletError::RpcError {
            message: format!("malformed RPC response: {e}"),
            code: 0,
        })?;

        if let Some(err) = parsed.error {
            error!("rpc <- {method} error: {} ({})", err.message, err.code);
            return Err(WalletError::RpcError {
                message: err.message,
                code: err.code,
            });
        }

        parsed.result.ok_or_else(|| WalletError::RpcError {
            message: format!("no result in {method} response"),
            code: 0,
        })
    }
}

/// JSON-RPC 2.0 client over a single chain endpoint. Decode logic lives
/// here; the transport it talks through is swappable (see [`RpcTransport`]).
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Some(std::time::Duration::from_secs(30)))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("failed to build HTTP client");

        Self {
            transport: Arc::new(HttpTransport {
                endpoint: endpoint.into(),
                http,
            }),
        }
    }

    /// Wires an arbitrary transport in place of the real HTTP client —
    /// the seam tests use to drive the engine against a scripted chain.
    pub fn with_transport(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.transport.call(method, params).await
    }

    /// Retries once on a transient `rpc-error` before surfacing it. Only
    /// safe for idempotent reads — `send_raw_transaction` never goes
    /// through this, since retrying a broadcast risks double-sending.
    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        match self.call(method, params.clone()).await {
            Ok(v) => Ok(v),
            Err(WalletError::RpcError { message, code }) => {
                warn!("rpc {method} failed transiently ({message}, code {code}), retrying once");
                self.call(method, params).await
            }
            Err(e) => Err(e),
        }
    }

    fn decode_hex_u64(value: &Value) -> Result<u64, WalletError> {
        let s = value.as_str().ok_or_else(|| WalletError::RpcError {
            message: "expected hex string result".into(),
            code: 0,
        })?;
        u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| WalletError::RpcError {
            message: format!("bad hex integer {s}: {e}"),
            code: 0,
        })
    }

    fn decode_hex_u256(value: &Value) -> Result<U256, WalletError> {
        let s = value.as_str().ok_or_else(|| WalletError::RpcError {
            message: "expected hex string result".into(),
            code: 0,
        })?;
        U256::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| WalletError::RpcError {
            message: format!("bad hex integer {s}: {e}"),
            code: 0,
        })
    }

    /// `eth_getTransactionCount(address, "pending")`, retried once on a
    /// transient RPC error.
    pub async fn pending_nonce(&self, address: Address) -> Result<u64, WalletError> {
        let result = self
            .call_with_retry(
                "eth_getTransactionCount",
                serde_json::json!([format!("{address:?}"), "pending"]),
            )
            .await?;
        Self::decode_hex_u64(&result)
    }

    /// `eth_getBalance(address, "latest")`, retried once on a transient
    /// RPC error.
    pub async fn native_balance(&self, address: Address) -> Result<U256, WalletError> {
        let result = self
            .call_with_retry(
                "eth_getBalance",
                serde_json::json!([format!("{address:?}"), "latest"]),
            )
            .await?;
        Self::decode_hex_u256(&result)
    }

    /// `eth_gasPrice`.
    pub async fn gas_price(&self) -> Result<U256, WalletError> {
        let result = self.call("eth_gasPrice", serde_json::json!([])).await?;
        Self::decode_hex_u256(&result)
    }

    /// `eth_estimateGas({from,to,value,data})`.
    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<u64, WalletError> {
        let params = serde_json::json!([{
            "from": format!("{from:?}"),
            "to": format!("{to:?}"),
            "value": format!("0x{value:x}"),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let result = self
            .call("eth_estimateGas", params)
            .await
            .map_err(|e| WalletError::GasEstimationFailed(e.to_string()))?;
        Self::decode_hex_u64(&result).map_err(|e| WalletError::GasEstimationFailed(e.to_string()))
    }

    /// `eth_call({to,data})` against "latest", retried once on a
    /// transient RPC error. This is the path `balanceOf` reads go
    /// through, so the ERC-20 adapter gets the retry for free.
    pub async fn call_contract(&self, to: Address, data: &[u8]) -> Result<Bytes, WalletError> {
        let params = serde_json::json!([
            {
                "to": format!("{to:?}"),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest",
        ]);
        let result = self.call_with_retry("eth_call", params).await?;
        let s = result.as_str().ok_or_else(|| WalletError::RpcError {
            message: "expected hex string from eth_call".into(),
            code: 0,
        })?;
        hex::decode(s.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| WalletError::RpcError {
                message: format!("bad eth_call return data: {e}"),
                code: 0,
            })
    }

    /// `eth_sendRawTransaction(hex)` -> 32-byte transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<[u8; 32], WalletError> {
        let raw_hex = format!("0x{}", hex::encode(raw));
        let result = self
            .call("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await?;
        let s = result.as_str().ok_or_else(|| WalletError::RpcError {
            message: "expected tx hash string".into(),
            code: 0,
        })?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| WalletError::RpcError {
            message: format!("bad tx hash {s}: {e}"),
            code: 0,
        })?;
        bytes.try_into().map_err(|_| WalletError::RpcError {
            message: "tx hash was not 32 bytes".into(),
            code: 0,
        })
    }

    /// `eth_getTransactionReceipt(hash)`. `None` means not yet mined.
    pub async fn transaction_receipt(
        &self,
        hash: &[u8; 32],
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        let hash_hex = format!("0x{}", hex::encode(hash));
        let result = self
            .call("eth_getTransactionReceipt", serde_json::json!([hash_hex]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: RawReceipt = serde_json::from_value(result).map_err(|e| WalletError::RpcError {
            message: format!("malformed receipt: {e}"),
            code: 0,
        })?;
        Ok(Some(receipt.into_receipt()?))
    }

    /// `eth_blockNumber`, used only as a lightweight readiness probe.
    pub async fn block_number(&self) -> Result<u64, WalletError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        Self::decode_hex_u64(&result)
    }
}

#[derive(Debug, Deserialize)]
struct RawReceipt {
    status: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    #[serde(rename = "gasUsed")]
    gas_used: Option<String>,
}

impl RawReceipt {
    fn into_receipt(self) -> Result<TransactionReceipt, WalletError> {
        let parse_u64 = |s: &str| -> Result<u64, WalletError> {
            u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| WalletError::RpcError {
                message: format!("bad hex integer {s}: {e}"),
                code: 0,
            })
        };
        Ok(TransactionReceipt {
            success: self.status.as_deref() == Some("0x1"),
            block_number: self.block_number.as_deref().map(parse_u64).transpose()?.unwrap_or(0),
            gas_used: self.gas_used.as_deref().map(parse_u64).transpose()?.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub success: bool,
    pub block_number: u64,
    pub gas_used: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails its first call with a transient RPC error, then succeeds.
    struct FlakyOnceTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl RpcTransport for FlakyOnceTransport {
        async fn call(&self, _method: &str, _params: Value) -> Result<Value, WalletError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(WalletError::RpcError {
                    message: "connection reset".into(),
                    code: -32000,
                })
            } else {
                Ok(Value::String("0x2a".into()))
            }
        }
    }

    #[tokio::test]
    async fn call_with_retry_recovers_from_one_transient_failure() {
        let transport = Arc::new(FlakyOnceTransport {
            attempts: AtomicUsize::new(0),
        });
        let client = RpcClient::with_transport(transport.clone());

        let result = client.call_with_retry("eth_blockNumber", serde_json::json!([])).await;
        assert_eq!(result.unwrap(), Value::String("0x2a".into()));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
    }

    struct AlwaysFailsTransport;

    #[async_trait]
    impl RpcTransport for AlwaysFailsTransport {
        async fn call(&self, _method: &str, _params: Value) -> Result<Value, WalletError> {
            Err(WalletError::RpcError {
                message: "still down".into(),
                code: -32000,
            })
        }
    }

    #[tokio::test]
    async fn call_with_retry_gives_up_after_the_second_failure() {
        let client = RpcClient::with_transport(Arc::new(AlwaysFailsTransport));
        let result = client.call_with_retry("eth_blockNumber", serde_json::json!([])).await;
        assert!(matches!(result, Err(WalletError::RpcError { .. })));
    }
}
