use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::ingestion::engine::IngestionEngine;
use crate::domain::market::timeframe::Timeframe;

/// Runs `ingest_ohlcv` forever per timeframe, re-fetching the last `overlap_bars`
/// bars each tick to absorb late exchange revisions. One tick produces a
/// batch per timeframe sequentially; ticks never overlap each other.
pub struct IngestionScheduler {
    pub engine: Arc<IngestionEngine>,
    pub symbol: String,
    pub timeframes: Vec<Timeframe>,
    pub overlap_bars: u32,
    pub page_limit: u32,
    pub tick_interval: Duration,
}

impl IngestionScheduler {
    pub fn new(engine: Arc<IngestionEngine>, symbol: String, timeframes: Vec<Timeframe>) -> Self {
        Self { engine, symbol, timeframes, overlap_bars: 3, page_limit: 200, tick_interval: Duration::from_secs(60) }
    }

    /// Runs until `shutdown` resolves. A tick in progress finishes before
    /// shutdown is observed; the next tick is simply never started.
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    return;
                }
                _ = self.tick() => {}
            }
            tokio::select! {
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }
    }

    async fn tick(&self) {
        for timeframe in &self.timeframes {
            let since_ms = self.overlap_since_ms(*timeframe).await;
            match self.engine.ingest_ohlcv(&self.symbol, *timeframe, Some(since_ms), self.page_limit, None, true).await {
                Ok(_) => {}
                Err(e) => warn!(symbol = %self.symbol, timeframe = %timeframe, error = %e, "scheduled ohlcv ingest failed"),
            }
        }
    }

    async fn overlap_since_ms(&self, timeframe: Timeframe) -> i64 {
        let tf = timeframe.to_okx_string();
        let last_ts = self.engine.candles.latest_ts(&self.symbol, tf).await.unwrap_or(None);
        overlap_since(last_ts, timeframe, self.overlap_bars, self.engine.clock.now_ms())
    }
}

/// Re-fetch start point: `overlap_bars` back from the last stored bar, or
/// 30 days ago when the series is empty.
fn overlap_since(last_ts: Option<i64>, timeframe: Timeframe, overlap_bars: u32, now_ms: i64) -> i64 {
    match last_ts {
        Some(ts) => ts - overlap_bars as i64 * timeframe.interval_ms(),
        None => now_ms - 30 * 24 * 60 * 60 * 1000,
    }
}
