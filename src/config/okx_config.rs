//! OKX credential and deployment-mode configuration parsed from the
//! environment. Mirrors the broker config split the rest of this module
//! uses: one small struct per concern, composed by the parent `Config`.

use std::env;

use anyhow::{Context, Result};

use crate::domain::market::timeframe::Timeframe;

/// OKX REST v5 credentials plus the account-mode knobs that shape order
/// placement (`tdMode`, `posSide`, demo trading).
#[derive(Debug, Clone)]
pub struct OkxEnvConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub base_url: String,
    /// `x-simulated-trading: 1` when true, hitting OKX's paper environment
    /// instead of the live one under the same credential scheme.
    pub is_demo: bool,
    pub default_market: String,
    /// `cross` or `isolated`; forwarded as `tdMode` on every order.
    pub td_mode: String,
    /// `long_short` when the account runs hedge mode, `net` otherwise.
    /// `None` lets the executor infer from `default_market`.
    pub pos_mode: Option<String>,
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub candle_limit: usize,
    pub wait_fill: bool,
    pub wait_fill_timeout_s: u64,
    pub wait_fill_interval_s: u64,
    pub sync_account: bool,
}

impl OkxEnvConfig {
    pub fn from_env() -> Result<Self> {
        let symbols_str = env::var("OKX_SYMBOLS").unwrap_or_else(|_| "BTC-USDT-SWAP".to_string());
        let symbols: Vec<String> = symbols_str.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();

        let timeframe = env::var("OKX_TIMEFRAME")
            .unwrap_or_else(|_| "15m".to_string())
            .parse::<Timeframe>()
            .context("failed to parse OKX_TIMEFRAME")?;

        let pos_mode = env::var("OKX_POS_MODE").ok().filter(|s| !s.is_empty());

        Ok(Self {
            api_key: env::var("OKX_API_KEY").unwrap_or_default(),
            api_secret: env::var("OKX_API_SECRET").unwrap_or_default(),
            passphrase: env::var("OKX_API_PASSPHRASE").unwrap_or_default(),
            base_url: env::var("OKX_BASE_URL").unwrap_or_else(|_| "https://www.okx.com".to_string()),
            is_demo: Self::parse_bool("OKX_IS_DEMO", true),
            default_market: env::var("OKX_DEFAULT_MARKET").unwrap_or_else(|_| "swap".to_string()),
            td_mode: env::var("OKX_TD_MODE").unwrap_or_else(|_| "cross".to_string()),
            pos_mode,
            symbols,
            timeframe,
            candle_limit: Self::parse_usize("OKX_CANDLE_LIMIT", 200)?,
            wait_fill: Self::parse_bool("OKX_WAIT_FILL", true),
            wait_fill_timeout_s: Self::parse_u64("OKX_WAIT_FILL_TIMEOUT_S", 8)?,
            wait_fill_interval_s: Self::parse_u64("OKX_WAIT_FILL_INTERVAL_S", 1)?,
            sync_account: Self::parse_bool("OKX_SYNC_ACCOUNT", true),
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<usize>().context(format!("failed to parse {key}"))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u64>().context(format!("failed to parse {key}"))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<bool>().unwrap_or(default)
    }
}
