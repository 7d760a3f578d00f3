#![allow(dead_code)]

mod agent;
mod clock;
mod config;
mod crypto;
mod error;
mod execution;
mod keystore;
mod models;
mod payment;
mod rlp;
mod swap;

use crate::agent::{ToolCall, ToolDispatcher};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::WalletError;
use crate::execution::{Erc20, NonceManager, RpcClient, TransactionBuilder};
use crate::keystore::Keystore;
use crate::payment::PaymentEngine;
use crate::swap::SwapPlanner;
use alloy_primitives::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("================================================");
    info!("  voicepay — on-device voice payment engine");
    info!("================================================");

    let config = Config::load_or_default();
    config.validate()?;

    let keystore = Keystore::new(config.wallet.keystore_namespace.clone());
    let (address, is_created) = match keystore.restore() {
        Ok(secret) => (crypto::derive_address(&secret)?, false),
        Err(WalletError::NoWallet) => (keystore.create()?, true),
        Err(e) => return Err(e.into()),
    };
    info!("wallet address: {address} (created-this-run={is_created})");
    let secret = keystore.restore()?;

    let rpc = Arc::new(RpcClient::new(config.chain.rpc_url.clone()));
    let clock = Arc::new(SystemClock);
    let nonce_manager = Arc::new(NonceManager::new(rpc.clone(), clock.clone()));
    let tx_builder = Arc::new(TransactionBuilder::new(
        rpc.clone(),
        nonce_manager.clone(),
        clock.clone(),
        config.chain.chain_id,
        secret,
        address,
    ));
    let erc20 = Arc::new(Erc20::new(rpc.clone()));
    let swap_planner = Arc::new(SwapPlanner::new(
        rpc.clone(),
        parse_address(&config.chain.state_view_address)?,
        parse_address(&config.chain.quoter_address)?,
        parse_address(&config.chain.universal_router_address)?,
        parse_address(&config.chain.wrapped_native_address)?,
        parse_address(&config.chain.multicall3_address)?,
    ));

    let engine = Arc::new(PaymentEngine {
        rpc: rpc.clone(),
        nonce_manager,
        tx_builder,
        erc20,
        swap_planner,
        clock,
        own_address: address,
        usdc_address: parse_address(&config.chain.usdc_address)?,
        wrapped_native_address: parse_address(&config.chain.wrapped_native_address)?,
        safety_ceiling_usd: config.payment.safety_ceiling_usd,
        warning_band_multiplier: config.payment.warning_band_multiplier,
        default_slippage_bps: config.payment.default_slippage_bps,
        swap_deadline_minutes: config.payment.swap_deadline_minutes,
        swap_gas_reserve_wei: U256::from(1_000_000_000_000_000u64), // 0.001 native, flat estimate
    });

    let dispatcher = ToolDispatcher::new(engine);

    info!("ready: reading line-delimited tool calls on stdin");
    run_tool_loop(dispatcher).await
}

fn parse_address(raw: &str) -> anyhow::Result<Address> {
    Address::from_str(raw).map_err(|e| anyhow::anyhow!("invalid address {raw}: {e}"))
}

/// Reads one JSON [`ToolCall`] per line from stdin, dispatches it, and
/// writes one JSON [`ToolResponse`](crate::agent::ToolResponse) per line to
/// stdout — the transport the voice agent process speaks.
async fn run_tool_loop(dispatcher: ToolDispatcher) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => dispatcher.handle(call).await,
            Err(e) => {
                error!("malformed tool call: {e}");
                crate::agent::ToolResponse {
                    ok: false,
                    status: "invalid-state".into(),
                    message: Some(format!("malformed tool call: {e}")),
                    tx_hash: None,
                }
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    Ok(())
}
