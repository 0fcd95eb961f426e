//! Pluggable decision source: the orchestrator asks one question — "what
//! should this symbol's portfolio look like right now" — and doesn't care
//! whether the answer comes from the scoring engine below or an external
//! model. HOLD is represented as `Ok(None)`, never an error.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::market::regime::RegimeThresholds;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{BacktestRepository, CandleRepository};
use crate::domain::strategy::scheduler::PortfolioScheduler;
use crate::domain::strategy::scorer::{score, BacktestHistory, StrategyAllocation};
use crate::domain::strategy::spec::enabled_specs;

#[derive(Debug, Clone)]
pub struct TradingDecision {
    pub regime: String,
    pub allocations: Vec<StrategyAllocation>,
    pub reasoning: String,
    pub ts_ms: i64,
    /// Last candle close, the reference price the allocator sizes orders against.
    pub price: Decimal,
}

#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> anyhow::Result<Option<TradingDecision>>;
}

/// The canonical decision source: regime classification plus backtest
/// history scoring, filtered and renormalized by a top-N scheduler.
pub struct PortfolioDecisionSource {
    pub candles: Arc<dyn CandleRepository>,
    pub backtests: Arc<dyn BacktestRepository>,
    pub scheduler: PortfolioScheduler,
    pub thresholds: RegimeThresholds,
    pub history_limit: usize,
}

impl PortfolioDecisionSource {
    pub fn new(candles: Arc<dyn CandleRepository>, backtests: Arc<dyn BacktestRepository>, scheduler: PortfolioScheduler, thresholds: RegimeThresholds) -> Self {
        Self { candles, backtests, scheduler, thresholds, history_limit: 50 }
    }

    async fn load_history(&self, symbol: &str, timeframe_str: &str) -> anyhow::Result<BacktestHistory> {
        let rows = self.backtests.recent_for(symbol, timeframe_str, self.history_limit).await?;
        let mut history = BacktestHistory::new();
        for spec in enabled_specs() {
            let triples: Vec<(f64, f64, f64)> = rows.iter().filter(|r| r.strategy_key == spec.key).map(|r| (r.win_rate, r.total_return, r.max_drawdown)).collect();
            if !triples.is_empty() {
                history.insert(spec.key, triples);
            }
        }
        Ok(history)
    }
}

#[async_trait]
impl DecisionSource for PortfolioDecisionSource {
    async fn decide(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> anyhow::Result<Option<TradingDecision>> {
        let timeframe_str = timeframe.to_okx_string();
        let candles = self.candles.latest(symbol, timeframe_str, limit).await?;
        if candles.is_empty() {
            return Ok(None);
        }
        let price = candles.last().map(|c| c.close).unwrap_or_default();
        let history = self.load_history(symbol, timeframe_str).await?;
        let decision = score(symbol, timeframe_str, &candles, self.thresholds, &history);
        let allocations = self.scheduler.allocate(&decision.allocations);
        if allocations.is_empty() {
            return Ok(None);
        }
        let reasoning = allocations.iter().map(|a| format!("{}={:.2}", a.strategy_id, a.weight)).collect::<Vec<_>>().join(", ");
        Ok(Some(TradingDecision { regime: decision.regime.to_string(), allocations, reasoning, ts_ms: decision.ts_ms, price }))
    }
}
