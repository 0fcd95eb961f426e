//! Entry point: wires the SQLite store, the OKX gateway, and the executor
//! the deployment mode calls for, then runs the ingestion schedulers and the
//! trading cycle loop side by side until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use alpha_core::application::executor::live::{LiveExecutor, LiveExecutorConfig};
use alpha_core::application::executor::simulated::SimulatedExecutor;
use alpha_core::application::executor::tracker::OrderTracker;
use alpha_core::application::executor::OrderExecutor;
use alpha_core::config::{Config, Mode};
use alpha_core::domain::allocation::allocator::PortfolioAllocator;
use alpha_core::domain::ingestion::engine::IngestionEngine;
use alpha_core::domain::ingestion::scheduler::IngestionScheduler;
use alpha_core::domain::orchestrator::{run_cycle, CycleConfig, DecisionSource, PortfolioDecisionSource};
use alpha_core::domain::repositories::RiskEventRepository;
use alpha_core::domain::risk::manager::{RiskEventSink, RiskManager};
use alpha_core::domain::time::{Clock, SystemClock};
use alpha_core::infrastructure::okx::OkxGateway;
use alpha_core::infrastructure::persistence::repositories::{
    SqliteBacktestRepository, SqliteBalanceRepository, SqliteCandleRepository, SqliteDecisionRepository,
    SqliteFundingRateRepository, SqliteIngestionRunRepository, SqliteOpenInterestRepository, SqliteOrderRepository,
    SqlitePositionRepository, SqlitePriceSnapshotRepository, SqliteRiskEventRepository, SqliteTradeRepository,
};
use alpha_core::infrastructure::persistence::Database;
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Bridges the plain `RiskEventRepository` row writer to the `RiskEventSink`
/// the risk manager calls on denial; the two signatures already match.
struct RiskEventRecorder(Arc<dyn RiskEventRepository>);

#[async_trait]
impl RiskEventSink for RiskEventRecorder {
    async fn record_risk_event(&self, symbol: &str, ts_s: i64, level: &str, rule: &str, details: &str) -> anyhow::Result<()> {
        self.0.insert(symbol, ts_s, level, rule, details).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;
    info!(mode = ?config.mode, symbols = ?config.okx.symbols, "starting trading daemon");

    let db = Database::new(&config.database_url).await?;
    let pool = db.pool.clone();

    let candles = Arc::new(SqliteCandleRepository::new(pool.clone()));
    let funding_rates = Arc::new(SqliteFundingRateRepository::new(pool.clone()));
    let price_snapshots = Arc::new(SqlitePriceSnapshotRepository::new(pool.clone()));
    let open_interest = Arc::new(SqliteOpenInterestRepository::new(pool.clone()));
    let balances = Arc::new(SqliteBalanceRepository::new(pool.clone()));
    let orders = Arc::new(SqliteOrderRepository::new(pool.clone()));
    let trades = Arc::new(SqliteTradeRepository::new(pool.clone()));
    let positions = Arc::new(SqlitePositionRepository::new(pool.clone()));
    let decisions = Arc::new(SqliteDecisionRepository::new(pool.clone()));
    let risk_events = Arc::new(SqliteRiskEventRepository::new(pool.clone()));
    let ingestion_runs = Arc::new(SqliteIngestionRunRepository::new(pool.clone()));
    let backtests = Arc::new(SqliteBacktestRepository::new(pool.clone()));

    let exchange = Arc::new(OkxGateway::new(config.okx.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let risk_config = config.risk.to_risk_config();
    let risk_sink: Arc<dyn RiskEventSink> = Arc::new(RiskEventRecorder(risk_events.clone()));

    let (executor, live, tracker): (Arc<dyn OrderExecutor>, Option<Arc<LiveExecutor>>, Option<Arc<OrderTracker>>) =
        if config.mode == Mode::Live && config.api_write_enabled {
            let live_config = LiveExecutorConfig {
                td_mode: Some(config.okx.td_mode.clone()),
                pos_mode: config.okx.pos_mode.clone(),
                default_market: config.okx.default_market.clone(),
                wait_fill_timeout_s: config.okx.wait_fill_timeout_s,
                wait_fill_interval_s: config.okx.wait_fill_interval_s,
            };
            let live = Arc::new(LiveExecutor::new(
                exchange.clone(),
                orders.clone(),
                trades.clone(),
                balances.clone(),
                positions.clone(),
                RiskManager::default(),
                risk_config,
                risk_sink.clone(),
                clock.clone(),
                live_config,
            ));
            let tracker = Arc::new(OrderTracker::new(exchange.clone(), orders.clone(), trades.clone(), clock.clone()));
            (live.clone(), Some(live), Some(tracker))
        } else {
            let sim = Arc::new(SimulatedExecutor::new(
                orders.clone(),
                trades.clone(),
                positions.clone(),
                RiskManager::default(),
                risk_config,
                risk_sink,
                clock.clone(),
            ));
            (sim, None, None)
        };

    let allocator = PortfolioAllocator { config: config.allocator.to_allocator_config() };
    let decision_source: Arc<dyn DecisionSource> = Arc::new(PortfolioDecisionSource::new(
        candles.clone(),
        backtests,
        config.allocator.to_scheduler(),
        config.allocator.to_regime_thresholds(),
    ));

    let engine = Arc::new(IngestionEngine {
        exchange: exchange.clone(),
        candles: candles.clone(),
        funding_rates,
        price_snapshots,
        open_interest,
        balances: balances.clone(),
        runs: ingestion_runs,
        clock: clock.clone(),
    });

    let mut shutdown_senders = Vec::new();
    for symbol in &config.okx.symbols {
        let scheduler = IngestionScheduler {
            engine: engine.clone(),
            symbol: symbol.clone(),
            timeframes: vec![config.okx.timeframe],
            overlap_bars: config.scheduler.ingestion_overlap_bars,
            page_limit: config.scheduler.ingestion_page_limit,
            tick_interval: config.scheduler.ingestion_tick_interval,
        };
        let (tx, rx) = tokio::sync::oneshot::channel();
        shutdown_senders.push(tx);
        tokio::spawn(async move { scheduler.run(rx).await });
    }

    let cycle_config = CycleConfig {
        trade_enabled: config.trading_enabled,
        sync_account: config.okx.sync_account,
        wait_fill: config.okx.wait_fill,
        equity_override: None,
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(config.scheduler.trading_cycle_interval.as_secs().max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, stopping ingestion schedulers");
                for tx in shutdown_senders {
                    let _ = tx.send(());
                }
                break;
            }
            _ = ticker.tick() => {
                for symbol in &config.okx.symbols {
                    let result = run_cycle(
                        symbol,
                        config.okx.timeframe,
                        config.okx.candle_limit,
                        executor.clone(),
                        live.clone(),
                        tracker.clone(),
                        decision_source.clone(),
                        &allocator,
                        positions.clone(),
                        balances.clone(),
                        decisions.clone(),
                        cycle_config.clone(),
                    )
                    .await;
                    if let Err(e) = result {
                        error!(symbol, error = %e, "trading cycle failed, continuing to next tick");
                    }
                }
            }
        }
    }

    warn!("trading daemon stopped");
    Ok(())
}
