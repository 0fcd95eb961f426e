//! Environment-sourced configuration, composed from one small struct per
//! concern and aggregated here, the same split the broker/risk/strategy
//! configs used before the exchange surface narrowed to OKX.

pub mod allocator_config;
pub mod observability_config;
pub mod okx_config;
pub mod risk_env_config;
pub mod scheduler_config;

use std::env;

use anyhow::{Context, Result};

pub use allocator_config::AllocatorEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use okx_config::OkxEnvConfig;
pub use risk_env_config::RiskEnvConfig;
pub use scheduler_config::SchedulerEnvConfig;

/// Deployment mode: whether the executor submits to OKX for real or runs
/// against the in-memory book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Simulated,
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "simulated" | "paper" | "sim" => Ok(Mode::Simulated),
            other => Err(anyhow::anyhow!("invalid MODE '{other}', expected 'live' or 'simulated'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub mode: Mode,
    /// Master kill switch: false forces every `CreateOrderRequest` through
    /// the risk chain as `signal_ok = false`, guaranteeing rejection.
    pub trading_enabled: bool,
    /// When false, the OKX adapter still reads market/account state but
    /// `create_order`/`cancel_order` return an error instead of calling out.
    pub api_write_enabled: bool,
    pub okx: OkxEnvConfig,
    pub risk: RiskEnvConfig,
    pub allocator: AllocatorEnvConfig,
    pub scheduler: SchedulerEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/rustrade.db".to_string()),
            mode: env::var("MODE")
                .unwrap_or_else(|_| "simulated".to_string())
                .parse::<Mode>()
                .context("failed to parse MODE")?,
            trading_enabled: Self::parse_bool("TRADING_ENABLED", false),
            api_write_enabled: Self::parse_bool("API_WRITE_ENABLED", false),
            okx: OkxEnvConfig::from_env()?,
            risk: RiskEnvConfig::from_env()?,
            allocator: AllocatorEnvConfig::from_env()?,
            scheduler: SchedulerEnvConfig::from_env()?,
            observability: ObservabilityEnvConfig::from_env(),
        })
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<bool>().unwrap_or(default)
    }
}
