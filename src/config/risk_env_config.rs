//! Risk chain configuration parsed from the environment: the notional and
//! leverage ceilings `domain::risk::rules` checks every order against.

use std::env;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::domain::risk::rules::RiskConfig;

#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub max_notional: Decimal,
    pub max_leverage: Decimal,
    pub min_confidence: f64,
}

impl RiskEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_notional: Self::parse_decimal("MAX_NOTIONAL", Decimal::from(5_000))?,
            max_leverage: Self::parse_decimal("MAX_LEVERAGE", Decimal::from(5))?,
            min_confidence: Self::parse_f64("MIN_CONFIDENCE", 0.45)?,
        })
    }

    pub fn to_risk_config(&self) -> RiskConfig {
        RiskConfig { max_notional: self.max_notional, max_leverage: self.max_leverage, min_confidence: self.min_confidence }
    }

    fn parse_decimal(key: &str, default: Decimal) -> Result<Decimal> {
        match env::var(key) {
            Ok(v) => v.parse::<Decimal>().context(format!("failed to parse {key}")),
            Err(_) => Ok(default),
        }
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<f64>().context(format!("failed to parse {key}"))
    }
}
