//! Cadence knobs for the daemon's background loops: candle ingestion, order
//! sync, and the trading cycle itself all poll on independent timers.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct SchedulerEnvConfig {
    pub ingestion_tick_interval: Duration,
    pub ingestion_overlap_bars: u32,
    pub ingestion_page_limit: u32,
    pub order_sync_interval: Duration,
    pub trading_cycle_interval: Duration,
}

impl SchedulerEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            ingestion_tick_interval: Duration::from_secs(Self::parse_u64("INGESTION_TICK_INTERVAL_S", 60)?),
            ingestion_overlap_bars: Self::parse_u32("INGESTION_OVERLAP_BARS", 3)?,
            ingestion_page_limit: Self::parse_u32("INGESTION_PAGE_LIMIT", 200)?,
            order_sync_interval: Duration::from_secs(Self::parse_u64("ORDER_SYNC_INTERVAL_S", 30)?),
            trading_cycle_interval: Duration::from_secs(Self::parse_u64("TRADING_CYCLE_INTERVAL_S", 900)?),
        })
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u32>().context(format!("failed to parse {key}"))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u64>().context(format!("failed to parse {key}"))
    }
}
