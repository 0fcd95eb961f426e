//! Allocator and regime-scoring configuration parsed from the environment.

use std::env;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::domain::allocation::allocator::AllocatorConfig;
use crate::domain::market::regime::RegimeThresholds;
use crate::domain::strategy::scheduler::PortfolioScheduler;

#[derive(Debug, Clone)]
pub struct AllocatorEnvConfig {
    pub global_leverage: Decimal,
    pub diff_threshold: Decimal,
    pub min_notional: Decimal,
    pub top_n: usize,
    pub min_score: f64,
    pub adx_threshold: f64,
    pub bb_width_threshold: f64,
}

impl AllocatorEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            global_leverage: Self::parse_decimal("ALLOCATOR_GLOBAL_LEVERAGE", Decimal::from(1))?,
            diff_threshold: Self::parse_decimal("ALLOCATOR_DIFF_THRESHOLD", Decimal::from(1))?,
            min_notional: Self::parse_decimal("ALLOCATOR_MIN_NOTIONAL", Decimal::from(10))?,
            top_n: Self::parse_usize("SCHEDULER_TOP_N", 3)?,
            min_score: Self::parse_f64("SCHEDULER_MIN_SCORE", 0.45)?,
            adx_threshold: Self::parse_f64("REGIME_ADX_THRESHOLD", 25.0)?,
            bb_width_threshold: Self::parse_f64("REGIME_BB_WIDTH_THRESHOLD", 0.04)?,
        })
    }

    pub fn to_allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig { global_leverage: self.global_leverage, diff_threshold: self.diff_threshold, min_notional: self.min_notional }
    }

    pub fn to_scheduler(&self) -> PortfolioScheduler {
        PortfolioScheduler::new(self.top_n, self.min_score)
    }

    pub fn to_regime_thresholds(&self) -> RegimeThresholds {
        RegimeThresholds { adx_threshold: self.adx_threshold, bb_width_threshold: self.bb_width_threshold }
    }

    fn parse_decimal(key: &str, default: Decimal) -> Result<Decimal> {
        match env::var(key) {
            Ok(v) => v.parse::<Decimal>().context(format!("failed to parse {key}")),
            Err(_) => Ok(default),
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<usize>().context(format!("failed to parse {key}"))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<f64>().context(format!("failed to parse {key}"))
    }
}
