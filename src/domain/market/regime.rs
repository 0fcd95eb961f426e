//! Market regime classification from a single indicator snapshot.
//!
//! A richer decision tree than a plain ADX/BB-width split: nine ordered
//! branches collapsing onto six distinct labels, consumed downstream by the
//! strategy scorer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::market::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Breakout,
    StrongTrend,
    WeakTrend,
    HighVolatility,
    LowVolatility,
    Range,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Breakout => "BREAKOUT",
            Regime::StrongTrend => "STRONG_TREND",
            Regime::WeakTrend => "WEAK_TREND",
            Regime::HighVolatility => "HIGH_VOLATILITY",
            Regime::LowVolatility => "LOW_VOLATILITY",
            Regime::Range => "RANGE",
        };
        write!(f, "{s}")
    }
}

impl Regime {
    /// Maps a regime to the coarser bucket used when matching a strategy's
    /// declared `regimes` set: STRONG_TREND/WEAK_TREND -> TREND,
    /// HIGH_VOLATILITY -> BREAKOUT, LOW_VOLATILITY -> RANGE.
    pub fn scoring_bucket(&self) -> &'static str {
        match self {
            Regime::StrongTrend | Regime::WeakTrend => "TREND",
            Regime::HighVolatility => "BREAKOUT",
            Regime::LowVolatility => "RANGE",
            Regime::Breakout => "BREAKOUT",
            Regime::Range => "RANGE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeThresholds {
    pub adx_threshold: f64,
    pub bb_width_threshold: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            adx_threshold: 25.0,
            bb_width_threshold: 0.04,
        }
    }
}

/// Nine-branch decision tree, first match wins. Branch order is load-bearing:
/// several branches overlap on purpose and earlier ones must be tried first.
pub fn classify(ind: &IndicatorSnapshot, thresholds: RegimeThresholds) -> Regime {
    if ind.bb_width_ratio >= 1.5 && ind.bb_width > thresholds.bb_width_threshold && ind.volume_trend >= 0.2 {
        return Regime::Breakout;
    }
    if ind.adx > 30.0 && ind.price_efficiency > 0.7 {
        return Regime::StrongTrend;
    }
    if ind.adx >= 20.0 && ind.adx <= 30.0 {
        return Regime::WeakTrend;
    }
    if ind.atr_percentile >= 80.0 {
        return Regime::HighVolatility;
    }
    if ind.atr_percentile <= 20.0 {
        return Regime::LowVolatility;
    }
    if ind.adx < 20.0 && ind.bb_width <= thresholds.bb_width_threshold {
        return Regime::Range;
    }
    if ind.adx >= thresholds.adx_threshold {
        return Regime::WeakTrend;
    }
    if ind.bb_width <= thresholds.bb_width_threshold {
        return Regime::Range;
    }
    Regime::Breakout
}
