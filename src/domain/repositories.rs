//! Persistence contracts. The core depends only on these traits; the
//! concrete SQLite-backed implementation lives in `infrastructure::persistence`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::market::candle::Candle;
use crate::domain::market::market_data::{Balance, FundingRate, PriceSnapshot};
use crate::domain::trading::types::{Decision, LifecycleEvent, Order, Position, Trade};

#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// Upserts under `(symbol, timeframe, ts_ms)`, discarding duplicates.
    async fn upsert_many(&self, candles: &[Candle]) -> anyhow::Result<usize>;
    async fn latest_ts(&self, symbol: &str, timeframe: &str) -> anyhow::Result<Option<i64>>;
    /// Ordered ascending by `ts_ms`, inclusive range.
    async fn range(&self, symbol: &str, timeframe: &str, start_ts: i64, end_ts: i64) -> anyhow::Result<Vec<Candle>>;
    /// Most recent `limit` candles, ascending by `ts_ms`.
    async fn latest(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Vec<Candle>>;
}

#[async_trait]
pub trait FundingRateRepository: Send + Sync {
    async fn upsert(&self, rate: &FundingRate) -> anyhow::Result<bool>;
    async fn latest(&self, symbol: &str) -> anyhow::Result<Option<FundingRate>>;
    async fn recent(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<FundingRate>>;
}

#[async_trait]
pub trait PriceSnapshotRepository: Send + Sync {
    async fn upsert(&self, snapshot: &PriceSnapshot) -> anyhow::Result<bool>;
    async fn latest(&self, symbol: &str) -> anyhow::Result<Option<PriceSnapshot>>;
}

#[derive(Debug, Clone)]
pub struct OpenInterest {
    pub symbol: String,
    pub ts_ms: i64,
    pub open_interest: Decimal,
    pub open_interest_value: Option<Decimal>,
}

#[async_trait]
pub trait OpenInterestRepository: Send + Sync {
    async fn upsert(&self, row: &OpenInterest) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait BalanceRepository: Send + Sync {
    async fn upsert(&self, balance: &Balance) -> anyhow::Result<()>;
    async fn latest(&self, currency: &str) -> anyhow::Result<Option<Balance>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a CREATED order and returns its row id.
    async fn insert(&self, order: &Order) -> anyhow::Result<i64>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Order>>;
    async fn find_by_client_order_id(&self, client_order_id: &str) -> anyhow::Result<Option<Order>>;
    async fn find_by_exchange_order_id(&self, exchange_order_id: &str) -> anyhow::Result<Option<Order>>;
    async fn find_open(&self, symbol: Option<&str>) -> anyhow::Result<Vec<Order>>;
    /// Persists the full mutated row and appends `event` in one transaction.
    async fn update_with_event(&self, order: &Order, event: &LifecycleEvent) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// `true` if inserted, `false` if a matching `(order_row_id, ts_ms,
    /// price, amount, side)` row already existed.
    async fn insert_if_absent(&self, trade: &Trade) -> anyhow::Result<bool>;
    async fn exists_for_order(&self, order_row_id: i64) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn upsert(&self, position: &Position) -> anyhow::Result<()>;
    /// Deletes the `(symbol, side)` row; called once net size collapses to ~0.
    async fn delete(&self, symbol: &str, side: crate::domain::trading::types::OrderSide) -> anyhow::Result<()>;
    async fn find_by_symbol(&self, symbol: &str) -> anyhow::Result<Vec<Position>>;
    async fn all(&self) -> anyhow::Result<Vec<Position>>;
}

#[async_trait]
pub trait DecisionRepository: Send + Sync {
    async fn insert(&self, decision: &Decision) -> anyhow::Result<i64>;
}

/// Integrity-event severities, per the gap/duplicate scan's bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityEventType {
    Gap,
    Duplicate,
    Repair,
}

#[derive(Debug, Clone)]
pub struct IntegrityEvent {
    pub symbol: String,
    pub timeframe: String,
    pub event_type: IntegrityEventType,
    pub start_ts: i64,
    pub end_ts: i64,
    pub expected_bars: i64,
    pub actual_bars: i64,
    pub missing_bars: i64,
    pub duplicate_bars: i64,
    pub severity: Severity,
    pub detected_at_s: i64,
    pub repair_job_id: Option<String>,
}

#[async_trait]
pub trait IntegrityEventRepository: Send + Sync {
    async fn insert(&self, event: &IntegrityEvent) -> anyhow::Result<i64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairJobStatus {
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RepairJob {
    pub job_id: String,
    pub symbol: String,
    pub timeframe: String,
    pub range_start_ts: i64,
    pub range_end_ts: i64,
    pub status: RepairJobStatus,
    pub repaired_bars: i64,
    pub message: Option<String>,
}

#[async_trait]
pub trait RepairJobRepository: Send + Sync {
    async fn insert(&self, job: &RepairJob) -> anyhow::Result<()>;
    async fn finish(&self, job_id: &str, status: RepairJobStatus, repaired_bars: i64, message: Option<&str>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionRunStatus {
    Running,
    Success,
    Failed,
    Skipped,
}

#[async_trait]
pub trait IngestionRunRepository: Send + Sync {
    /// Returns the run's row id.
    async fn start(&self, source: &str, symbol: &str, timeframe: Option<&str>, data_type: &str, started_at_s: i64) -> anyhow::Result<i64>;
    async fn finish(&self, run_id: i64, status: IngestionRunStatus, rows_inserted: i64, error: Option<&str>, ended_at_s: i64) -> anyhow::Result<()>;
}

/// One backtest row consulted read-only when scoring a strategy's historical performance.
#[derive(Debug, Clone)]
pub struct BacktestRow {
    pub strategy_key: String,
    pub win_rate: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
}

#[async_trait]
pub trait BacktestRepository: Send + Sync {
    /// Up to the `limit` most recent rows for `(symbol, timeframe)`, newest first.
    async fn recent_for(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Vec<BacktestRow>>;
}

#[async_trait]
pub trait RiskEventRepository: Send + Sync {
    async fn insert(&self, symbol: &str, ts_s: i64, level: &str, rule: &str, details: &str) -> anyhow::Result<()>;
}
