use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Pooled SQLite handle; owns schema creation so every binary that opens one
/// gets a ready-to-use database regardless of entry point.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent).await.context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true).journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await.context("failed to connect to sqlite database")?;

        info!(db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Creates every table this crate persists to, idempotently. Decimal
    /// columns are TEXT (`rust_decimal`'s canonical string form); timestamps
    /// are INTEGER ms for market data, s for operational rows.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_data (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe, timestamp)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create market_data table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS funding_rates (
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                funding_rate TEXT NOT NULL,
                next_funding_time INTEGER,
                PRIMARY KEY (symbol, timestamp)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create funding_rates table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_snapshots (
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                last_price TEXT,
                mark_price TEXT,
                index_price TEXT,
                PRIMARY KEY (symbol, timestamp)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create price_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS open_interest (
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open_interest TEXT NOT NULL,
                open_interest_value TEXT,
                PRIMARY KEY (symbol, timestamp)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create open_interest table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balances (
                currency TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                total TEXT NOT NULL,
                free TEXT NOT NULL,
                used TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create balances table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_order_id TEXT NOT NULL UNIQUE,
                exchange_order_id TEXT,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                price TEXT,
                amount TEXT NOT NULL,
                filled_amount TEXT NOT NULL,
                remaining_amount TEXT NOT NULL,
                average_price TEXT,
                status TEXT NOT NULL,
                leverage TEXT,
                time_in_force TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create orders table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_symbol_status ON orders (symbol, status)").execute(&mut *conn).await.ok();
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_exchange_order_id ON orders (exchange_order_id)").execute(&mut *conn).await.ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_row_id INTEGER NOT NULL REFERENCES orders(id),
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                price TEXT NOT NULL,
                amount TEXT NOT NULL,
                fee TEXT,
                fee_currency TEXT,
                realized_pnl TEXT,
                timestamp INTEGER NOT NULL,
                UNIQUE(order_row_id, timestamp, price, amount, side)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_lifecycle_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_row_id INTEGER NOT NULL REFERENCES orders(id),
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                message TEXT NOT NULL,
                exchange_status TEXT,
                exchange_event_ts INTEGER,
                raw_payload TEXT,
                trade_id INTEGER,
                fill_qty TEXT,
                fill_price TEXT,
                fee TEXT,
                timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create order_lifecycle_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                size TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                leverage TEXT,
                unrealized_pnl TEXT,
                margin TEXT,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (symbol, side)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS position_snapshots (
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                side TEXT NOT NULL,
                size TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                mark_price TEXT,
                unrealized_pnl TEXT,
                PRIMARY KEY (symbol, timestamp, side)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create position_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                action TEXT NOT NULL,
                confidence REAL,
                reasoning TEXT NOT NULL,
                technical_analysis TEXT NOT NULL,
                accepted BOOLEAN NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create decisions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                level TEXT NOT NULL,
                rule TEXT NOT NULL,
                details TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create risk_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT,
                data_type TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                status TEXT NOT NULL,
                rows_inserted INTEGER NOT NULL DEFAULT 0,
                error TEXT
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create ingestion_runs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candle_integrity_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                event_type TEXT NOT NULL,
                start_ts INTEGER NOT NULL,
                end_ts INTEGER NOT NULL,
                expected_bars INTEGER NOT NULL,
                actual_bars INTEGER NOT NULL,
                missing_bars INTEGER NOT NULL,
                duplicate_bars INTEGER NOT NULL,
                severity TEXT NOT NULL,
                detected_at INTEGER NOT NULL,
                repair_job_id TEXT
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create candle_integrity_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candle_repair_jobs (
                job_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                range_start_ts INTEGER NOT NULL,
                range_end_ts INTEGER NOT NULL,
                status TEXT NOT NULL,
                repaired_bars INTEGER NOT NULL DEFAULT 0,
                message TEXT,
                started_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                finished_at INTEGER
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create candle_repair_jobs table")?;

        // Consulted read-only by the scorer; created empty here so a fresh
        // database never fails the scorer's history lookup.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                strategy_key TEXT NOT NULL,
                params_json TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create backtest_configs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                config_id INTEGER REFERENCES backtest_configs(id),
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                strategy_key TEXT NOT NULL,
                win_rate REAL NOT NULL,
                total_return REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create backtest_results table")?;

        info!("database schema initialized");
        Ok(())
    }
}
