//! SQLite-backed implementations of every `domain::repositories` trait.
//! Decimal columns round-trip through `rust_decimal`'s canonical string
//! form; sqlx binds/reads `Decimal` directly via its `rust_decimal` feature.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::market::candle::Candle;
use crate::domain::market::market_data::{Balance, FundingRate, PriceSnapshot};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{
    BacktestRepository, BacktestRow, BalanceRepository, CandleRepository, DecisionRepository, FundingRateRepository, IngestionRunRepository,
    IngestionRunStatus, IntegrityEvent, IntegrityEventRepository, IntegrityEventType, OpenInterest, OpenInterestRepository, OrderRepository,
    PositionRepository, PriceSnapshotRepository, RepairJob, RepairJobRepository, RepairJobStatus, RiskEventRepository, Severity, TradeRepository,
};
use crate::domain::trading::types::{Decision, LifecycleEvent, Order, OrderSide, OrderStatus, OrderType, Position, Trade};

pub struct SqliteCandleRepository {
    pool: SqlitePool,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_candle(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Candle> {
    let timeframe_str: String = row.try_get("timeframe")?;
    Ok(Candle {
        symbol: row.try_get("symbol")?,
        timeframe: Timeframe::from_str(&timeframe_str)?,
        ts_ms: row.try_get("timestamp")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get("volume")?,
    })
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn upsert_many(&self, candles: &[Candle]) -> anyhow::Result<usize> {
        let mut inserted = 0;
        let mut tx = self.pool.begin().await?;
        for c in candles {
            let result = sqlx::query(
                r#"
                INSERT INTO market_data (symbol, timeframe, timestamp, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, timeframe, timestamp) DO NOTHING
                "#,
            )
            .bind(&c.symbol)
            .bind(c.timeframe.to_okx_string())
            .bind(c.ts_ms)
            .bind(c.open)
            .bind(c.high)
            .bind(c.low)
            .bind(c.close)
            .bind(c.volume)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn latest_ts(&self, symbol: &str, timeframe: &str) -> anyhow::Result<Option<i64>> {
        let row = sqlx::query("SELECT MAX(timestamp) as ts FROM market_data WHERE symbol = ? AND timeframe = ?")
            .bind(symbol)
            .bind(timeframe)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<i64>, _>("ts")?)
    }

    async fn range(&self, symbol: &str, timeframe: &str, start_ts: i64, end_ts: i64) -> anyhow::Result<Vec<Candle>> {
        let rows = sqlx::query(
            "SELECT * FROM market_data WHERE symbol = ? AND timeframe = ? AND timestamp >= ? AND timestamp <= ? ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start_ts)
        .bind(end_ts)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_candle).collect()
    }

    async fn latest(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Vec<Candle>> {
        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM market_data WHERE symbol = ? AND timeframe = ? ORDER BY timestamp DESC LIMIT ?) ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_candle).collect()
    }
}

pub struct SqliteFundingRateRepository {
    pool: SqlitePool,
}

impl SqliteFundingRateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_funding_rate(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<FundingRate> {
    Ok(FundingRate {
        symbol: row.try_get("symbol")?,
        ts_ms: row.try_get("timestamp")?,
        rate: row.try_get("funding_rate")?,
        next_funding_ts: row.try_get("next_funding_time")?,
    })
}

#[async_trait]
impl FundingRateRepository for SqliteFundingRateRepository {
    async fn upsert(&self, rate: &FundingRate) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO funding_rates (symbol, timestamp, funding_rate, next_funding_time)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(symbol, timestamp) DO NOTHING
            "#,
        )
        .bind(&rate.symbol)
        .bind(rate.ts_ms)
        .bind(rate.rate)
        .bind(rate.next_funding_ts)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest(&self, symbol: &str) -> anyhow::Result<Option<FundingRate>> {
        let row = sqlx::query("SELECT * FROM funding_rates WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_funding_rate).transpose()
    }

    async fn recent(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<FundingRate>> {
        let rows = sqlx::query("SELECT * FROM funding_rates WHERE symbol = ? ORDER BY timestamp DESC LIMIT ?")
            .bind(symbol)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_funding_rate).collect()
    }
}

pub struct SqlitePriceSnapshotRepository {
    pool: SqlitePool,
}

impl SqlitePriceSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceSnapshotRepository for SqlitePriceSnapshotRepository {
    async fn upsert(&self, snapshot: &PriceSnapshot) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO price_snapshots (symbol, timestamp, last_price, mark_price, index_price)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timestamp) DO NOTHING
            "#,
        )
        .bind(&snapshot.symbol)
        .bind(snapshot.ts_ms)
        .bind(snapshot.last)
        .bind(snapshot.mark)
        .bind(snapshot.index)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest(&self, symbol: &str) -> anyhow::Result<Option<PriceSnapshot>> {
        let row = sqlx::query("SELECT * FROM price_snapshots WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(r) => Some(PriceSnapshot {
                symbol: r.try_get("symbol")?,
                ts_ms: r.try_get("timestamp")?,
                last: r.try_get("last_price")?,
                mark: r.try_get("mark_price")?,
                index: r.try_get("index_price")?,
            }),
            None => None,
        })
    }
}

pub struct SqliteOpenInterestRepository {
    pool: SqlitePool,
}

impl SqliteOpenInterestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpenInterestRepository for SqliteOpenInterestRepository {
    async fn upsert(&self, row: &OpenInterest) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO open_interest (symbol, timestamp, open_interest, open_interest_value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(symbol, timestamp) DO NOTHING
            "#,
        )
        .bind(&row.symbol)
        .bind(row.ts_ms)
        .bind(row.open_interest)
        .bind(row.open_interest_value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct SqliteBalanceRepository {
    pool: SqlitePool,
}

impl SqliteBalanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for SqliteBalanceRepository {
    async fn upsert(&self, balance: &Balance) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (currency, timestamp, total, free, used)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(currency) DO UPDATE SET timestamp = excluded.timestamp, total = excluded.total, free = excluded.free, used = excluded.used
            "#,
        )
        .bind(&balance.currency)
        .bind(balance.ts_ms)
        .bind(balance.total)
        .bind(balance.free)
        .bind(balance.used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self, currency: &str) -> anyhow::Result<Option<Balance>> {
        let row = sqlx::query("SELECT * FROM balances WHERE currency = ?").bind(currency).fetch_optional(&self.pool).await?;
        Ok(match row {
            Some(r) => Some(Balance {
                currency: r.try_get("currency")?,
                ts_ms: r.try_get("timestamp")?,
                total: r.try_get("total")?,
                free: r.try_get("free")?,
                used: r.try_get("used")?,
            }),
            None => None,
        })
    }
}

fn side_to_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

fn side_from_str(s: &str) -> anyhow::Result<OrderSide> {
    match s {
        "BUY" => Ok(OrderSide::Buy),
        "SELL" => Ok(OrderSide::Sell),
        other => Err(anyhow::anyhow!("unknown order side '{other}'")),
    }
}

fn order_type_to_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
    }
}

fn order_type_from_str(s: &str) -> anyhow::Result<OrderType> {
    match s {
        "MARKET" => Ok(OrderType::Market),
        "LIMIT" => Ok(OrderType::Limit),
        other => Err(anyhow::anyhow!("unknown order type '{other}'")),
    }
}

fn status_to_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Created => "CREATED",
        OrderStatus::New => "NEW",
        OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
        OrderStatus::Filled => "FILLED",
        OrderStatus::Canceled => "CANCELED",
        OrderStatus::Rejected => "REJECTED",
    }
}

fn status_from_str(s: &str) -> anyhow::Result<OrderStatus> {
    match s {
        "CREATED" => Ok(OrderStatus::Created),
        "NEW" => Ok(OrderStatus::New),
        "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELED" => Ok(OrderStatus::Canceled),
        "REJECTED" => Ok(OrderStatus::Rejected),
        other => Err(anyhow::anyhow!("unknown order status '{other}'")),
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Order> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        client_order_id: row.try_get("client_order_id")?,
        exchange_order_id: row.try_get("exchange_order_id")?,
        symbol: row.try_get("symbol")?,
        side: side_from_str(&side)?,
        order_type: order_type_from_str(&order_type)?,
        price: row.try_get("price")?,
        amount: row.try_get("amount")?,
        filled_amount: row.try_get("filled_amount")?,
        remaining_amount: row.try_get("remaining_amount")?,
        average_price: row.try_get("average_price")?,
        status: status_from_str(&status)?,
        leverage: row.try_get("leverage")?,
        time_in_force: None,
        created_at_s: row.try_get("created_at")?,
        updated_at_s: row.try_get("updated_at")?,
    })
}

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn insert(&self, order: &Order) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (client_order_id, exchange_order_id, symbol, side, order_type, price, amount, filled_amount, remaining_amount, average_price, status, leverage, time_in_force, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.client_order_id)
        .bind(&order.exchange_order_id)
        .bind(&order.symbol)
        .bind(side_to_str(order.side))
        .bind(order_type_to_str(order.order_type))
        .bind(order.price)
        .bind(order.amount)
        .bind(order.filled_amount)
        .bind(order.remaining_amount)
        .bind(order.average_price)
        .bind(status_to_str(order.status))
        .bind(order.leverage)
        .bind(None::<String>)
        .bind(order.created_at_s)
        .bind(order.updated_at_s)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_by_client_order_id(&self, client_order_id: &str) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE client_order_id = ?").bind(client_order_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_by_exchange_order_id(&self, exchange_order_id: &str) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE exchange_order_id = ?").bind(exchange_order_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_open(&self, symbol: Option<&str>) -> anyhow::Result<Vec<Order>> {
        let rows = match symbol {
            Some(s) => {
                sqlx::query("SELECT * FROM orders WHERE symbol = ? AND status NOT IN ('FILLED','CANCELED','REJECTED') ORDER BY created_at ASC")
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query("SELECT * FROM orders WHERE status NOT IN ('FILLED','CANCELED','REJECTED') ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        };
        rows.iter().map(row_to_order).collect()
    }

    async fn update_with_event(&self, order: &Order, event: &LifecycleEvent) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE orders SET exchange_order_id = ?, price = ?, amount = ?, filled_amount = ?, remaining_amount = ?, average_price = ?, status = ?, leverage = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&order.exchange_order_id)
        .bind(order.price)
        .bind(order.amount)
        .bind(order.filled_amount)
        .bind(order.remaining_amount)
        .bind(order.average_price)
        .bind(status_to_str(order.status))
        .bind(order.leverage)
        .bind(order.updated_at_s)
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO order_lifecycle_events (order_row_id, from_status, to_status, message, exchange_status, exchange_event_ts, raw_payload, trade_id, fill_qty, fill_price, fee, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.order_row_id)
        .bind(status_to_str(event.from_status))
        .bind(status_to_str(event.to_status))
        .bind(&event.message)
        .bind(&event.exchange_status)
        .bind(event.exchange_ts)
        .bind(&event.raw_payload)
        .bind(event.trade_id)
        .bind(event.fill_qty)
        .bind(event.fill_price)
        .bind(event.fee)
        .bind(order.updated_at_s)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn insert_if_absent(&self, trade: &Trade) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (order_row_id, symbol, side, price, amount, fee, fee_currency, realized_pnl, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_row_id, timestamp, price, amount, side) DO NOTHING
            "#,
        )
        .bind(trade.order_row_id)
        .bind(&trade.symbol)
        .bind(side_to_str(trade.side))
        .bind(trade.price)
        .bind(trade.amount)
        .bind(trade.fee)
        .bind(&trade.fee_ccy)
        .bind(trade.realized_pnl)
        .bind(trade.ts_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_for_order(&self, order_row_id: i64) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM trades WHERE order_row_id = ?").bind(order_row_id).fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }
}

pub struct SqlitePositionRepository {
    pool: SqlitePool,
}

impl SqlitePositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_position(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Position> {
    let side: String = row.try_get("side")?;
    Ok(Position {
        symbol: row.try_get("symbol")?,
        side: side_from_str(&side)?,
        size: row.try_get("size")?,
        entry_price: row.try_get("entry_price")?,
        leverage: row.try_get("leverage")?,
        unrealized_pnl: row.try_get("unrealized_pnl")?,
        margin: row.try_get("margin")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PositionRepository for SqlitePositionRepository {
    async fn upsert(&self, position: &Position) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (symbol, side, size, entry_price, leverage, unrealized_pnl, margin, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, side) DO UPDATE SET
                size = excluded.size, entry_price = excluded.entry_price, leverage = excluded.leverage,
                unrealized_pnl = excluded.unrealized_pnl, margin = excluded.margin, updated_at = excluded.updated_at
            "#,
        )
        .bind(&position.symbol)
        .bind(side_to_str(position.side))
        .bind(position.size)
        .bind(position.entry_price)
        .bind(position.leverage)
        .bind(position.unrealized_pnl)
        .bind(position.margin)
        .bind(position.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, symbol: &str, side: OrderSide) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM positions WHERE symbol = ? AND side = ?").bind(symbol).bind(side_to_str(side)).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_symbol(&self, symbol: &str) -> anyhow::Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE symbol = ?").bind(symbol).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_position).collect()
    }

    async fn all(&self) -> anyhow::Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_position).collect()
    }
}

pub struct SqliteDecisionRepository {
    pool: SqlitePool,
}

impl SqliteDecisionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for SqliteDecisionRepository {
    async fn insert(&self, decision: &Decision) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO decisions (symbol, timeframe, timestamp, action, confidence, reasoning, technical_analysis, accepted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&decision.symbol)
        .bind(&decision.timeframe)
        .bind(decision.ts_ms)
        .bind(&decision.action)
        .bind(decision.confidence)
        .bind(&decision.reasoning)
        .bind(&decision.technical_analysis)
        .bind(decision.accepted)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

pub struct SqliteRiskEventRepository {
    pool: SqlitePool,
}

impl SqliteRiskEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskEventRepository for SqliteRiskEventRepository {
    async fn insert(&self, symbol: &str, ts_s: i64, level: &str, rule: &str, details: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO risk_events (symbol, timestamp, level, rule, details) VALUES (?, ?, ?, ?, ?)")
            .bind(symbol)
            .bind(ts_s)
            .bind(level)
            .bind(rule)
            .bind(details)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SqliteIngestionRunRepository {
    pool: SqlitePool,
}

impl SqliteIngestionRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn ingestion_status_to_str(s: IngestionRunStatus) -> &'static str {
    match s {
        IngestionRunStatus::Running => "running",
        IngestionRunStatus::Success => "success",
        IngestionRunStatus::Failed => "failed",
        IngestionRunStatus::Skipped => "skipped",
    }
}

#[async_trait]
impl IngestionRunRepository for SqliteIngestionRunRepository {
    async fn start(&self, source: &str, symbol: &str, timeframe: Option<&str>, data_type: &str, started_at_s: i64) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ingestion_runs (source, symbol, timeframe, data_type, started_at, status, rows_inserted)
            VALUES (?, ?, ?, ?, ?, 'running', 0)
            "#,
        )
        .bind(source)
        .bind(symbol)
        .bind(timeframe)
        .bind(data_type)
        .bind(started_at_s)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn finish(&self, run_id: i64, status: IngestionRunStatus, rows_inserted: i64, error: Option<&str>, ended_at_s: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE ingestion_runs SET status = ?, rows_inserted = ?, error = ?, ended_at = ? WHERE id = ?")
            .bind(ingestion_status_to_str(status))
            .bind(rows_inserted)
            .bind(error)
            .bind(ended_at_s)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SqliteIntegrityEventRepository {
    pool: SqlitePool,
}

impl SqliteIntegrityEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn severity_to_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

fn event_type_to_str(t: IntegrityEventType) -> &'static str {
    match t {
        IntegrityEventType::Gap => "gap",
        IntegrityEventType::Duplicate => "duplicate",
        IntegrityEventType::Repair => "repair",
    }
}

#[async_trait]
impl IntegrityEventRepository for SqliteIntegrityEventRepository {
    async fn insert(&self, event: &IntegrityEvent) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO candle_integrity_events
                (symbol, timeframe, event_type, start_ts, end_ts, expected_bars, actual_bars, missing_bars, duplicate_bars, severity, detected_at, repair_job_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.symbol)
        .bind(&event.timeframe)
        .bind(event_type_to_str(event.event_type))
        .bind(event.start_ts)
        .bind(event.end_ts)
        .bind(event.expected_bars)
        .bind(event.actual_bars)
        .bind(event.missing_bars)
        .bind(event.duplicate_bars)
        .bind(severity_to_str(event.severity))
        .bind(event.detected_at_s)
        .bind(&event.repair_job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

pub struct SqliteRepairJobRepository {
    pool: SqlitePool,
}

impl SqliteRepairJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn repair_status_to_str(s: RepairJobStatus) -> &'static str {
    match s {
        RepairJobStatus::Running => "running",
        RepairJobStatus::Done => "done",
        RepairJobStatus::Failed => "failed",
    }
}

#[async_trait]
impl RepairJobRepository for SqliteRepairJobRepository {
    async fn insert(&self, job: &RepairJob) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candle_repair_jobs (job_id, symbol, timeframe, range_start_ts, range_end_ts, status, repaired_bars, message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.symbol)
        .bind(&job.timeframe)
        .bind(job.range_start_ts)
        .bind(job.range_end_ts)
        .bind(repair_status_to_str(job.status))
        .bind(job.repaired_bars)
        .bind(&job.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish(&self, job_id: &str, status: RepairJobStatus, repaired_bars: i64, message: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE candle_repair_jobs SET status = ?, repaired_bars = ?, message = ?, finished_at = strftime('%s','now') WHERE job_id = ?")
            .bind(repair_status_to_str(status))
            .bind(repaired_bars)
            .bind(message)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SqliteBacktestRepository {
    pool: SqlitePool,
}

impl SqliteBacktestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BacktestRepository for SqliteBacktestRepository {
    async fn recent_for(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Vec<BacktestRow>> {
        let rows = sqlx::query(
            "SELECT strategy_key, win_rate, total_return, max_drawdown FROM backtest_results WHERE symbol = ? AND timeframe = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                Ok(BacktestRow {
                    strategy_key: r.try_get("strategy_key")?,
                    win_rate: r.try_get("win_rate")?,
                    total_return: r.try_get("total_return")?,
                    max_drawdown: r.try_get("max_drawdown")?,
                })
            })
            .collect()
    }
}
