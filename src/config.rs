use serde::{Deserialize, Serialize};

/// Chain id 143, native symbol MON — the only network this build targets.
pub const CHAIN_ID: u64 = 143;
pub const NATIVE_SYMBOL: &str = "MON";

/// Multicall3 is deployed at the same address on every chain it supports.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub wallet: WalletConfig,
    pub payment: PaymentConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub usdc_address: String,
    pub universal_router_address: String,
    pub state_view_address: String,
    pub quoter_address: String,
    pub multicall3_address: String,
    pub wrapped_native_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Keystore service namespace, e.g. "com.voicepay.wallet".
    pub keystore_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Per-transaction safety ceiling in USD. Above this, `invalid-amount`.
    pub safety_ceiling_usd: f64,
    /// Between ceiling and 2x ceiling: a warning, not a hard failure,
    /// unless the caller proceeds without acknowledgment.
    pub warning_band_multiplier: f64,
    /// Default slippage in basis points for swaps; one of {10, 50, 100, 200}.
    pub default_slippage_bps: u32,
    /// Receipt polling: initial backoff, cap, and total wait cap (ms).
    pub receipt_poll_initial_ms: u64,
    pub receipt_poll_cap_ms: u64,
    pub receipt_poll_total_cap_ms: u64,
    /// Gas price buffer applied on top of the chain's reported gas price.
    pub gas_price_buffer_pct: u32,
    /// Gas limit buffer applied on top of `eth_estimateGas`.
    pub gas_limit_buffer_pct: u32,
    /// Nonce cache validity window in seconds.
    pub nonce_cache_window_secs: i64,
    /// Universal Router swap deadline, minutes from now.
    pub swap_deadline_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://testnet-rpc.monad.xyz".into(),
            chain_id: CHAIN_ID,
            usdc_address: "0x0000000000000000000000000000000000000000".into(),
            universal_router_address: "0x0000000000000000000000000000000000000000".into(),
            state_view_address: "0x0000000000000000000000000000000000000000".into(),
            quoter_address: "0x0000000000000000000000000000000000000000".into(),
            multicall3_address: MULTICALL3_ADDRESS.into(),
            wrapped_native_address: "0x0000000000000000000000000000000000000000".into(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keystore_namespace: "com.voicepay.wallet".into(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            safety_ceiling_usd: 1000.0,
            warning_band_multiplier: 2.0,
            default_slippage_bps: 50,
            receipt_poll_initial_ms: 500,
            receipt_poll_cap_ms: 4_000,
            receipt_poll_total_cap_ms: 120_000,
            gas_price_buffer_pct: 20,
            gas_limit_buffer_pct: 30,
            nonce_cache_window_secs: 30,
            swap_deadline_minutes: 20,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            wallet: WalletConfig::default(),
            payment: PaymentConfig::default(),
            telemetry: TelemetryConfig {
                log_level: "info".into(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables (`.env` file) with defaults.
    ///
    /// Required env vars:
    ///   CHAIN_RPC_URL, USDC_ADDRESS, UNIVERSAL_ROUTER_ADDRESS,
    ///   STATE_VIEW_ADDRESS, QUOTER_ADDRESS, WRAPPED_NATIVE_ADDRESS
    ///
    /// Optional env vars:
    ///   MULTICALL3_ADDRESS (defaults to the canonical cross-chain address)
    ///   SAFETY_CEILING_USD, DEFAULT_SLIPPAGE_BPS, RUST_LOG
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("CHAIN_RPC_URL") {
            config.chain.rpc_url = url;
        }
        if let Ok(addr) = std::env::var("USDC_ADDRESS") {
            config.chain.usdc_address = addr;
        }
        if let Ok(addr) = std::env::var("UNIVERSAL_ROUTER_ADDRESS") {
            config.chain.universal_router_address = addr;
        }
        if let Ok(addr) = std::env::var("STATE_VIEW_ADDRESS") {
            config.chain.state_view_address = addr;
        }
        if let Ok(addr) = std::env::var("QUOTER_ADDRESS") {
            config.chain.quoter_address = addr;
        }
        if let Ok(addr) = std::env::var("WRAPPED_NATIVE_ADDRESS") {
            config.chain.wrapped_native_address = addr;
        }
        if let Ok(addr) = std::env::var("MULTICALL3_ADDRESS") {
            if !addr.is_empty() {
                config.chain.multicall3_address = addr;
            }
        }
        if let Ok(v) = std::env::var("SAFETY_CEILING_USD") {
            if let Ok(parsed) = v.parse() {
                config.payment.safety_ceiling_usd = parsed;
            }
        }
        if let Ok(v) = std::env::var("DEFAULT_SLIPPAGE_BPS") {
            if let Ok(parsed) = v.parse() {
                config.payment.default_slippage_bps = parsed;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.telemetry.log_level = level;
        }

        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.chain.rpc_url.is_empty(), "CHAIN_RPC_URL must be set");
        anyhow::ensure!(
            self.chain.usdc_address.parse::<alloy_primitives::Address>().is_ok(),
            "USDC_ADDRESS must be a valid 20-byte address"
        );
        anyhow::ensure!(
            matches!(self.payment.default_slippage_bps, 10 | 50 | 100 | 200),
            "DEFAULT_SLIPPAGE_BPS must be one of 10, 50, 100, 200"
        );
        anyhow::ensure!(
            self.payment.safety_ceiling_usd > 0.0,
            "safety_ceiling_usd must be positive"
        );
        Ok(())
    }
}
