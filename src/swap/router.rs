use crate::swap::pool::PoolKeyData;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolValue};

sol! {
    struct PoolKey {
        address currency0;
        address currency1;
        uint24 fee;
        int24 tickSpacing;
        address hooks;
    }

    struct ExactInputSingleParams {
        PoolKey poolKey;
        bool zeroForOne;
        uint128 amountIn;
        uint128 amountOutMinimum;
        bytes hookData;
    }

    function quoteExactInputSingle(ExactInputSingleParams params) external returns (uint256 amountOut, uint256 gasEstimate);

    function execute(bytes commands, bytes[] inputs, uint256 deadline) external payable;
}

/// `V4_SWAP` Universal Router command byte.
const COMMAND_V4_SWAP: u8 = 0x10;
/// `SWAP_EXACT_IN_SINGLE` v4-router action byte.
const ACTION_SWAP_EXACT_IN_SINGLE: u8 = 0x06;
/// `SETTLE_ALL` v4-router action byte.
const ACTION_SETTLE_ALL: u8 = 0x0c;
/// `TAKE_ALL` v4-router action byte.
const ACTION_TAKE_ALL: u8 = 0x0f;

fn to_sol_pool_key(key: &PoolKeyData) -> PoolKey {
    PoolKey {
        currency0: key.currency0,
        currency1: key.currency1,
        fee: alloy_primitives::Uint::<24, 1>::from(key.fee),
        tickSpacing: alloy_primitives::Signed::<24, 1>::try_from(key.tick_spacing)
            .expect("tick spacing fits in int24"),
        hooks: key.hooks,
    }
}

/// Calldata for the quoter's `quoteExactInputSingle`. The pool key is
/// passed as a struct, never pre-encoded into bytes and smuggled through
/// as an opaque blob.
pub fn encode_quote_call(
    pool_key: &PoolKeyData,
    zero_for_one: bool,
    amount_in: u128,
) -> Vec<u8> {
    let call = quoteExactInputSingleCall {
        params: ExactInputSingleParams {
            poolKey: to_sol_pool_key(pool_key),
            zeroForOne: zero_for_one,
            amountIn: amount_in,
            amountOutMinimum: 0,
            hookData: Bytes::new(),
        },
    };
    call.abi_encode()
}

pub fn decode_quote_return(data: &[u8]) -> alloy_sol_types::Result<U256> {
    quoteExactInputSingleCall::abi_decode_returns(data, true).map(|r| r.amountOut)
}

/// Builds `execute(commands, inputs, deadline)` calldata for a single-hop
/// exact-input swap through the v4 singleton, settling the input currency
/// and taking the output currency to `recipient`.
pub fn encode_exact_input_single_swap(
    pool_key: &PoolKeyData,
    zero_for_one: bool,
    amount_in: u128,
    min_amount_out: u128,
    recipient: Address,
    deadline: U256,
) -> Vec<u8> {
    let actions = Bytes::from(vec![
        ACTION_SWAP_EXACT_IN_SINGLE,
        ACTION_SETTLE_ALL,
        ACTION_TAKE_ALL,
    ]);

    let swap_params = ExactInputSingleParams {
        poolKey: to_sol_pool_key(pool_key),
        zeroForOne: zero_for_one,
        amountIn: amount_in,
        amountOutMinimum: min_amount_out,
        hookData: Bytes::new(),
    };

    let input_currency = if zero_for_one {
        pool_key.currency0
    } else {
        pool_key.currency1
    };
    let output_currency = if zero_for_one {
        pool_key.currency1
    } else {
        pool_key.currency0
    };

    let swap_action_params = swap_params.abi_encode();
    let settle_params = (input_currency, U256::from(amount_in)).abi_encode_params();
    let take_params = (output_currency, recipient, U256::from(min_amount_out)).abi_encode_params();

    let v4_swap_inputs: Vec<Bytes> = vec![
        Bytes::from(swap_action_params),
        Bytes::from(settle_params),
        Bytes::from(take_params),
    ];
    let v4_swap_payload = (actions, v4_swap_inputs).abi_encode_params();

    let commands = Bytes::from(vec![COMMAND_V4_SWAP]);
    let inputs = vec![Bytes::from(v4_swap_payload)];

    executeCall {
        commands,
        inputs,
        deadline,
    }
    .abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> PoolKeyData {
        PoolKeyData::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02), 500, 10)
    }

    #[test]
    fn quote_call_encodes_nonempty() {
        let data = encode_quote_call(&sample_key(), true, 1_000_000);
        assert!(!data.is_empty());
        assert_eq!(&data[0..4], &quoteExactInputSingleCall::SELECTOR);
    }

    #[test]
    fn execute_call_uses_v4_swap_command_byte() {
        let data = encode_exact_input_single_swap(
            &sample_key(),
            true,
            1_000_000,
            990_000,
            Address::repeat_byte(0xAA),
            U256::from(1_700_000_000u64),
        );
        assert_eq!(&data[0..4], &executeCall::SELECTOR);
    }
}
