use std::collections::HashMap;

use serde::Serialize;

use crate::domain::market::candle::Candle;
use crate::domain::market::indicators::latest_snapshot;
use crate::domain::market::regime::{classify, Regime, RegimeThresholds};
use crate::domain::strategy::spec::{enabled_specs, StrategySpec};

/// One strategy's contribution to a scored portfolio, before renormalization.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAllocation {
    pub strategy_id: &'static str,
    pub score: f64,
    pub weight: f64,
    pub regime_score: f64,
    pub performance_score: f64,
    pub notes: String,
}

/// The scorer's verdict for one symbol/timeframe at one point in time, before
/// the scheduler filters and renormalizes it into a tradeable set.
#[derive(Debug, Clone)]
pub struct PortfolioDecision {
    pub symbol: String,
    pub timeframe: String,
    pub ts_ms: i64,
    pub regime: Regime,
    pub allocations: Vec<StrategyAllocation>,
}

/// Raw backtest rows for one (symbol, timeframe, strategy_key): up to the 50
/// most recent win_rate/total_return/max_drawdown triples, most-recent last.
pub type BacktestHistory = HashMap<&'static str, Vec<(f64, f64, f64)>>;

/// `0.5*normalized_win_rate + 0.3*normalized_return + 0.2*(1-normalized_drawdown)`.
/// Defaults to 0.5 when a strategy has no backtest history at all.
pub fn aggregate_performance_score(rows: &[(f64, f64, f64)]) -> f64 {
    if rows.is_empty() {
        return 0.5;
    }
    let n = rows.len() as f64;
    let win_rate_avg: f64 = rows.iter().map(|r| r.0).sum::<f64>() / n;
    let return_avg: f64 = rows.iter().map(|r| r.1).sum::<f64>() / n;
    let drawdown_avg: f64 = rows.iter().map(|r| r.2).sum::<f64>() / n;

    let win_rate_score = win_rate_avg.clamp(0.0, 100.0) / 100.0;
    let return_score = return_avg.clamp(-100.0, 100.0) / 200.0 + 0.5;
    let drawdown_score = 1.0 - drawdown_avg.clamp(0.0, 100.0) / 100.0;

    0.5 * win_rate_score + 0.3 * return_score + 0.2 * drawdown_score
}

/// 1.0 if the regime's scoring bucket is in `spec.regimes`; 0.3 if not; 0.6
/// when the spec declares no regime affinity at all.
pub fn regime_score(regime: Regime, spec: &StrategySpec) -> f64 {
    if spec.regimes.is_empty() {
        return 0.6;
    }
    let bucket = regime.scoring_bucket();
    if spec.regimes.contains(&bucket) {
        1.0
    } else {
        0.3
    }
}

/// Computes the regime and scores every enabled strategy against it and its
/// backtest history. `history` holds up to 50 most-recent rows per strategy
/// key; absent entries score 0.5.
pub fn score(
    symbol: &str,
    timeframe: &str,
    candles: &[Candle],
    thresholds: RegimeThresholds,
    history: &BacktestHistory,
) -> PortfolioDecision {
    let Some(last) = candles.last() else {
        return PortfolioDecision {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            ts_ms: 0,
            regime: Regime::Range,
            allocations: Vec::new(),
        };
    };

    let snapshot = latest_snapshot(candles);
    let regime = classify(&snapshot, thresholds);

    let mut allocations: Vec<StrategyAllocation> = enabled_specs()
        .map(|spec| {
            let r_score = regime_score(regime, spec);
            let p_score = history.get(spec.key).map(|rows| aggregate_performance_score(rows)).unwrap_or(0.5);
            let final_score = 0.6 * r_score + 0.4 * p_score;
            StrategyAllocation {
                strategy_id: spec.key,
                score: final_score,
                weight: 0.0,
                regime_score: r_score,
                performance_score: p_score,
                notes: format!("regime={regime}, base={r_score:.2}, perf={p_score:.2}"),
            }
        })
        .collect();

    allocations.sort_by(|a, b| b.score.partial_cmp(&a.score).expect("scores are finite"));

    PortfolioDecision {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        ts_ms: last.ts_ms,
        regime,
        allocations,
    }
}
