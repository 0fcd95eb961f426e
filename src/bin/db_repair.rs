//! Operator CLI for candle integrity: scan a stored range for gaps and
//! duplicates, or repair a range either by re-fetching it from OKX or by
//! flat-filling it from the preceding close.

use std::sync::Arc;

use alpha_core::config::Config;
use alpha_core::domain::integrity::repair::{CandleRepairer, RepairMode};
use alpha_core::domain::integrity::scanner::IntegrityScanner;
use alpha_core::domain::market::timeframe::Timeframe;
use alpha_core::domain::time::{Clock, SystemClock};
use alpha_core::infrastructure::okx::OkxGateway;
use alpha_core::infrastructure::persistence::repositories::{
    SqliteCandleRepository, SqliteIntegrityEventRepository, SqliteRepairJobRepository,
};
use alpha_core::infrastructure::persistence::Database;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Candle integrity scan and repair tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a stored range and record gap/duplicate events, without writing any candles.
    Scan {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
        #[arg(long)]
        start_ms: i64,
        #[arg(long)]
        end_ms: i64,
    },
    /// Repair a range, either by re-fetching it from the exchange or flat-filling it.
    Repair {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
        #[arg(long)]
        start_ms: i64,
        #[arg(long)]
        end_ms: i64,
        /// "refetch" or "fill"
        #[arg(long, default_value = "refetch")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let pool = db.pool.clone();

    let candles = Arc::new(SqliteCandleRepository::new(pool.clone()));
    let events = Arc::new(SqliteIntegrityEventRepository::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Scan { symbol, timeframe, start_ms, end_ms } => {
            let timeframe: Timeframe = timeframe.parse()?;
            let scanner = IntegrityScanner::new(candles, events, clock);
            let summary = scanner.scan(&symbol, timeframe, start_ms, end_ms).await?;
            info!(symbol, %timeframe, candles = summary.count, gaps = summary.gaps, duplicates = summary.duplicates, "scan complete");
        }
        Commands::Repair { symbol, timeframe, start_ms, end_ms, mode } => {
            let timeframe: Timeframe = timeframe.parse()?;
            let mode = match mode.as_str() {
                "refetch" => RepairMode::Refetch,
                "fill" => RepairMode::Fill,
                other => anyhow::bail!("unknown repair mode '{other}', expected 'refetch' or 'fill'"),
            };
            let jobs = Arc::new(SqliteRepairJobRepository::new(pool.clone()));
            let exchange = Arc::new(OkxGateway::new(config.okx.clone()));
            let repairer = CandleRepairer::new(exchange, candles, jobs, events, clock);
            let repaired = repairer.repair(&symbol, timeframe, start_ms, end_ms, mode).await?;
            info!(symbol, %timeframe, repaired, "repair complete");
        }
    }

    Ok(())
}
