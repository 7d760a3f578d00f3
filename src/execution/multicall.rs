use crate::error::WalletError;
use crate::execution::rpc_client::RpcClient;
use alloy_primitives::{address, Address, Bytes};
use alloy_sol_types::{sol, SolCall, SolValue};
use std::sync::Arc;

/// Canonical deployment address, identical across every chain that has it.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct CallResult {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls) external payable returns (CallResult[] memory returnData);
}

/// One read-only call to batch through `aggregate3`.
#[derive(Debug, Clone)]
pub struct BatchedCall {
    pub target: Address,
    pub call_data: Bytes,
}

/// The outcome of one batched call: `Ok(data)` on success, `Err` carrying
/// the tolerated per-call failure (Multicall3's `allowFailure = true`
/// semantics — one reverting call never aborts the whole batch).
pub type BatchedResult = Result<Bytes, ()>;

pub struct Multicall {
    rpc: Arc<RpcClient>,
    address: Address,
}

impl Multicall {
    /// `address` is normally [`MULTICALL3_ADDRESS`]; callers may pass a
    /// different deployment for local test chains that don't have the
    /// canonical one.
    pub fn new(rpc: Arc<RpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }

    /// Runs `calls` through one `eth_call` against Multicall3's
    /// `aggregate3`, tolerating individual failures rather than failing the
    /// whole batch.
    pub async fn aggregate3(&self, calls: Vec<BatchedCall>) -> Result<Vec<BatchedResult>, WalletError> {
        let sol_calls: Vec<Call3> = calls
            .into_iter()
            .map(|c| Call3 {
                target: c.target,
                allowFailure: true,
                callData: c.call_data,
            })
            .collect();

        let call = aggregate3Call { calls: sol_calls };
        let call_data = call.abi_encode();

        let return_data = self.rpc.call_contract(self.address, &call_data).await?;

        let decoded = aggregate3Call::abi_decode_returns(&return_data, true).map_err(|e| {
            WalletError::RpcError {
                message: format!("malformed aggregate3 return data: {e}"),
                code: 0,
            }
        })?;

        Ok(decoded
            .returnData
            .into_iter()
            .map(|r| if r.success { Ok(r.returnData) } else { Err(()) })
            .collect())
    }
}
