//! `run_cycle`: one tick of the trading cycle. Sequences account/order sync,
//! the decision source, the allocator, and order submission. Every call site
//! (`src/bin/trading_daemon.rs`) wraps it in its own loop and logs-and-continues
//! on error, so a bad tick never stops the next one.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::application::executor::live::LiveExecutor;
use crate::application::executor::tracker::OrderTracker;
use crate::application::executor::{CreateOrderRequest, OrderExecutor};
use crate::domain::allocation::allocator::PortfolioAllocator;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::orchestrator::decision_source::DecisionSource;
use crate::domain::repositories::{BalanceRepository, DecisionRepository, PositionRepository};
use crate::domain::trading::types::Decision;

/// Deployment knobs that don't belong to any one collaborator.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Gates `signal_ok` on every order this cycle submits; false turns
    /// every order into a guaranteed risk-chain rejection (dry-run mode).
    pub trade_enabled: bool,
    /// Resync balances/positions from the exchange before deciding.
    pub sync_account: bool,
    /// After submitting, wait for fill confirmation then resync the
    /// account. Only takes effect when `live` is `Some`.
    pub wait_fill: bool,
    /// Equity to allocate against; falls back to the latest stored USDT
    /// balance row when absent.
    pub equity_override: Option<Decimal>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { trade_enabled: true, sync_account: true, wait_fill: true, equity_override: None }
    }
}

/// One trading-cycle tick for `symbol`. `live` and `tracker` are `None` for a
/// simulated/paper deployment; when present they drive the exchange-side
/// sync and fill-wait steps the simulated executor has no use for.
#[allow(clippy::too_many_arguments)]
pub async fn run_cycle(
    symbol: &str,
    timeframe: Timeframe,
    limit: usize,
    executor: Arc<dyn OrderExecutor>,
    live: Option<Arc<LiveExecutor>>,
    tracker: Option<Arc<OrderTracker>>,
    decision_source: Arc<dyn DecisionSource>,
    allocator: &PortfolioAllocator,
    positions: Arc<dyn PositionRepository>,
    balances: Arc<dyn BalanceRepository>,
    decisions: Arc<dyn DecisionRepository>,
    config: CycleConfig,
) -> anyhow::Result<()> {
    if config.sync_account {
        if let Some(live) = &live {
            let scoped = [symbol.to_string()];
            if let Err(e) = live.sync_account_state(Some(&scoped)).await {
                warn!(symbol, error = %e, "account sync failed, continuing on stale state");
            }
        }
    }
    if let Some(tracker) = &tracker {
        if let Err(e) = tracker.sync_orders(None, true).await {
            warn!(symbol, error = %e, "order sync failed, continuing on stale state");
        }
    }

    let Some(decision) = decision_source.decide(symbol, timeframe, limit).await? else {
        info!(symbol, %timeframe, "cycle produced no decision, holding");
        return Ok(());
    };

    let technical_analysis = serde_json::to_string(&decision.allocations).unwrap_or_default();
    let decision_row = Decision::now(
        symbol.to_string(),
        timeframe.to_okx_string().to_string(),
        "PORTFOLIO".to_string(),
        decision.reasoning.clone(),
        technical_analysis,
        decision.ts_ms,
    );
    decisions.insert(&decision_row).await?;

    let equity = match config.equity_override {
        Some(e) => e,
        None => match balances.latest("USDT").await? {
            Some(b) => b.total,
            None => {
                warn!(symbol, "no equity source (no override, no stored USDT balance), aborting cycle");
                return Ok(());
            }
        },
    };

    let open_positions = positions.find_by_symbol(symbol).await?;
    let weights: Vec<(String, f64)> = decision.allocations.iter().map(|a| (a.strategy_id.to_string(), a.weight)).collect();
    let (plan, order) = allocator.build_orders(symbol, &weights, equity, &open_positions, decision.price);

    info!(symbol, regime = %decision.regime, plan = ?plan, "cycle allocation plan");
    let Some(order) = order else {
        info!(symbol, "allocation produced no order this cycle");
        return Ok(());
    };

    let confidence = decision.allocations.iter().map(|a| a.score).fold(0.0_f64, f64::max);
    let request = CreateOrderRequest {
        symbol: order.symbol.clone(),
        side: order.side,
        order_type: order.order_type,
        quantity: order.amount,
        price: order.price,
        leverage: order.leverage,
        confidence: Some(confidence),
        signal_ok: config.trade_enabled,
    };

    let submitted = executor.create_order(request).await?;
    info!(symbol, client_order_id = %submitted.client_order_id, status = ?submitted.status, "order submitted");

    if config.wait_fill {
        if let Some(live) = &live {
            let final_order = live.wait_for_fill(&submitted.client_order_id).await?;
            info!(symbol, status = ?final_order.map(|o| o.status), "fill wait complete");
            let scoped = [symbol.to_string()];
            if let Err(e) = live.sync_account_state(Some(&scoped)).await {
                warn!(symbol, error = %e, "post-fill account resync failed");
            }
        }
    }

    Ok(())
}
