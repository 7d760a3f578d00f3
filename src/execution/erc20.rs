use crate::error::WalletError;
use crate::execution::rpc_client::RpcClient;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use std::sync::Arc;

sol! {
    function balanceOf(address account) external view returns (uint256);
    function transfer(address to, uint256 amount) external returns (bool);
    function approve(address spender, uint256 amount) external returns (bool);
}

/// ERC-20 read/calldata-encoding adapter. Mirrors the teacher's habit of
/// keeping ABI-call construction and the bare RPC transport in separate,
/// narrow helper types rather than one god-object client.
pub struct Erc20 {
    rpc: Arc<RpcClient>,
}

impl Erc20 {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, WalletError> {
        let call_data = balanceOfCall { account: owner }.abi_encode();
        let returned = self.rpc.call_contract(token, &call_data).await?;
        balanceOfCall::abi_decode_returns(&returned, true)
            .map(|r| r._0)
            .map_err(|e| WalletError::RpcError {
                message: format!("malformed balanceOf return data: {e}"),
                code: 0,
            })
    }

    /// Selector `0xa9059cbb`.
    pub fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
        transferCall { to, amount }.abi_encode()
    }

    /// Selector `0x095ea7b3`.
    pub fn encode_approve(spender: Address, amount: U256) -> Vec<u8> {
        approveCall { spender, amount }.abi_encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_selector_matches_known_value() {
        let data = Erc20::encode_transfer(Address::ZERO, U256::ZERO);
        assert_eq!(&data[0..4], hex::decode("a9059cbb").unwrap().as_slice());
    }

    #[test]
    fn approve_selector_matches_known_value() {
        let data = Erc20::encode_approve(Address::ZERO, U256::ZERO);
        assert_eq!(&data[0..4], hex::decode("095ea7b3").unwrap().as_slice());
    }

    #[test]
    fn transfer_encodes_recipient_and_amount() {
        let to = Address::repeat_byte(0xAB);
        let amount = U256::from(1_000_000u64);
        let data = Erc20::encode_transfer(to, amount);
        // selector(4) + address word(32) + amount word(32)
        assert_eq!(data.len(), 4 + 32 + 32);
    }
}
