//! A scripted JSON-RPC transport standing in for a live chain, plus the
//! ABI-encoding helpers needed to script Multicall3 and quoter responses.
//! Shared by the scenario tests, the way the teacher shares backtest
//! fixture-building helpers across `tests/backtest.rs`'s scenario functions.

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use voicepay::error::WalletError;
use voicepay::execution::RpcTransport;

enum Scripted {
    Plain(Result<Value, WalletError>),
    /// Blocks on `notify` before returning, so a test can force an
    /// in-flight call to suspend at a known point and interleave another
    /// task's work (used to script cancellation races deterministically).
    Gated(Result<Value, WalletError>, Arc<Notify>),
}

/// An in-memory `RpcTransport` driven entirely by a script the test pushes
/// ahead of time. Responses are queued per JSON-RPC method name, FIFO —
/// the call order within one method is already deterministic given the
/// engine's code path, so there's no need to key on params too.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, method: &str, value: Value) {
        self.push(method, Scripted::Plain(Ok(value)));
    }

    pub fn push_err(&self, method: &str, message: &str, code: i64) {
        self.push(
            method,
            Scripted::Plain(Err(WalletError::RpcError {
                message: message.into(),
                code,
            })),
        );
    }

    /// Like [`Self::push_ok`], but the call blocks on `notify` before
    /// returning the response.
    pub fn push_ok_gated(&self, method: &str, value: Value, notify: Arc<Notify>) {
        self.push(method, Scripted::Gated(Ok(value), notify));
    }

    fn push(&self, method: &str, entry: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(entry);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.calls.lock().unwrap().push((method.to_string(), params));

        let entry = {
            let mut map = self.responses.lock().unwrap();
            let queue = map
                .get_mut(method)
                .unwrap_or_else(|| panic!("no scripted response queued for {method}"));
            queue
                .pop_front()
                .unwrap_or_else(|| panic!("scripted responses for {method} exhausted"))
        };

        match entry {
            Scripted::Plain(result) => result,
            Scripted::Gated(result, notify) => {
                notify.notified().await;
                result
            }
        }
    }
}

/// Hex-string JSON value for a `u64`, the shape every `eth_*` integer
/// result (`eth_gasPrice`, `eth_estimateGas`, nonces...) is decoded from.
pub fn hex_u64(v: u64) -> Value {
    Value::String(format!("0x{v:x}"))
}

/// Hex-string JSON value for a `U256`.
pub fn hex_u256(v: U256) -> Value {
    Value::String(format!("0x{v:x}"))
}

/// Hex-string JSON value carrying raw ABI-encoded return bytes, the shape
/// `eth_call` results and `eth_sendRawTransaction`/receipt hashes take.
pub fn hex_bytes(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

/// A 32-byte big-endian ABI word holding `value`.
fn word_u256(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// ABI-encodes a single static `uint256` return value — the shape
/// `balanceOf`'s return and `getLiquidity`'s per-call `returnData` both take.
pub fn encode_uint256_return(value: U256) -> Vec<u8> {
    word_u256(value).to_vec()
}

/// ABI-encodes a single static `uint128` return value (`getLiquidity`).
pub fn encode_liquidity_return(liquidity: u128) -> Vec<u8> {
    encode_uint256_return(U256::from(liquidity))
}

/// ABI-encodes `quoteExactInputSingle`'s `(uint256 amountOut, uint256
/// gasEstimate)` return: two concatenated static words, no offset
/// indirection needed since neither field is dynamically sized.
pub fn encode_quote_return(amount_out: u128, gas_estimate: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&word_u256(U256::from(amount_out)));
    out.extend_from_slice(&word_u256(U256::from(gas_estimate)));
    out
}

/// ABI-encodes Multicall3's `aggregate3` return, `CallResult[] memory`
/// where `CallResult { bool success; bytes returnData; }` — a dynamic
/// array of dynamic-sized tuples. Layout:
///
/// ```text
/// word0       = 0x20                      (offset to array data)
/// word1       = N                         (array length)
/// N head words = each tuple's byte offset, relative to the start of the
///                tuple data, i.e. right after the head words
/// per tuple:
///   word  = success (0 or 1, right-aligned)
///   word  = 0x40                          (offset to returnData, relative
///                                           to the start of this tuple)
///   word  = len(returnData)
///   bytes = returnData, right-padded to a 32-byte multiple
/// ```
pub fn encode_call_results(results: &[(bool, Vec<u8>)]) -> Vec<u8> {
    let n = results.len();

    let tuple_bytes: Vec<Vec<u8>> = results
        .iter()
        .map(|(success, data)| {
            let mut tuple = Vec::new();
            tuple.extend_from_slice(&word_u256(U256::from(*success as u8)));
            tuple.extend_from_slice(&word_u256(U256::from(0x40u64)));
            tuple.extend_from_slice(&word_u256(U256::from(data.len() as u64)));
            tuple.extend_from_slice(data);
            let padding = (32 - (data.len() % 32)) % 32;
            tuple.extend(std::iter::repeat(0u8).take(padding));
            tuple
        })
        .collect();

    // Offsets are relative to the start of the array's data section, i.e.
    // right after the length word — which is where the N head words
    // themselves live, so the first element's data starts at `n * 32`.
    let mut head_offsets = Vec::with_capacity(n);
    let mut running = n as u64 * 32;
    for tb in &tuple_bytes {
        head_offsets.push(running);
        running += tb.len() as u64;
    }

    let mut out = Vec::new();
    out.extend_from_slice(&word_u256(U256::from(0x20u64)));
    out.extend_from_slice(&word_u256(U256::from(n as u64)));
    for offset in &head_offsets {
        out.extend_from_slice(&word_u256(U256::from(*offset)));
    }
    for tb in &tuple_bytes {
        out.extend_from_slice(tb);
    }
    out
}
