//! Candle repair: backfills a known-bad range either by re-fetching it from
//! the exchange or by flat-filling it from the last known close.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::errors::IntegrityError;
use crate::domain::exchange::ExchangeGateway;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{
    CandleRepository, IntegrityEvent, IntegrityEventRepository, IntegrityEventType, RepairJob, RepairJobRepository, RepairJobStatus, Severity,
};
use crate::domain::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    Refetch,
    Fill,
}

pub struct CandleRepairer {
    pub exchange: Arc<dyn ExchangeGateway>,
    pub candles: Arc<dyn CandleRepository>,
    pub jobs: Arc<dyn RepairJobRepository>,
    pub events: Arc<dyn IntegrityEventRepository>,
    pub clock: Arc<dyn Clock>,
}

impl CandleRepairer {
    pub fn new(
        exchange: Arc<dyn ExchangeGateway>,
        candles: Arc<dyn CandleRepository>,
        jobs: Arc<dyn RepairJobRepository>,
        events: Arc<dyn IntegrityEventRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { exchange, candles, jobs, events, clock }
    }

    pub async fn repair(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range_start_ts: i64,
        range_end_ts: i64,
        mode: RepairMode,
    ) -> Result<i64, IntegrityError> {
        let tf = timeframe.to_okx_string();
        let job_id = Uuid::new_v4().to_string();
        let job = RepairJob {
            job_id: job_id.clone(),
            symbol: symbol.to_string(),
            timeframe: tf.to_string(),
            range_start_ts,
            range_end_ts,
            status: RepairJobStatus::Running,
            repaired_bars: 0,
            message: None,
        };
        self.jobs.insert(&job).await.map_err(|e| IntegrityError::RepairFailed {
            job_id: job_id.clone(),
            symbol: symbol.to_string(),
            timeframe: tf.to_string(),
            reason: e.to_string(),
        })?;

        let outcome = match mode {
            RepairMode::Refetch => self.repair_by_refetch(symbol, timeframe, range_start_ts, range_end_ts).await,
            RepairMode::Fill => self.repair_by_fill(symbol, timeframe, range_start_ts, range_end_ts).await,
        };

        match outcome {
            Ok(repaired) => {
                let _ = self.jobs.finish(&job_id, RepairJobStatus::Done, repaired, None).await;
                let interval = timeframe.interval_ms();
                let event = IntegrityEvent {
                    symbol: symbol.to_string(),
                    timeframe: tf.to_string(),
                    event_type: IntegrityEventType::Repair,
                    start_ts: range_start_ts,
                    end_ts: range_end_ts,
                    expected_bars: (range_end_ts - range_start_ts) / interval + 1,
                    actual_bars: repaired,
                    missing_bars: 0,
                    duplicate_bars: 0,
                    severity: Severity::Low,
                    detected_at_s: self.clock.now_s(),
                    repair_job_id: Some(job_id.clone()),
                };
                let _ = self.events.insert(&event).await;
                Ok(repaired)
            }
            Err(e) => {
                let reason = e.to_string();
                let _ = self.jobs.finish(&job_id, RepairJobStatus::Failed, 0, Some(&reason)).await;
                let event = IntegrityEvent {
                    symbol: symbol.to_string(),
                    timeframe: tf.to_string(),
                    event_type: IntegrityEventType::Repair,
                    start_ts: range_start_ts,
                    end_ts: range_end_ts,
                    expected_bars: 0,
                    actual_bars: 0,
                    missing_bars: 0,
                    duplicate_bars: 0,
                    severity: Severity::High,
                    detected_at_s: self.clock.now_s(),
                    repair_job_id: Some(job_id.clone()),
                };
                let _ = self.events.insert(&event).await;
                Err(e)
            }
        }
    }

    async fn repair_by_refetch(&self, symbol: &str, timeframe: Timeframe, range_start_ts: i64, range_end_ts: i64) -> Result<i64, IntegrityError> {
        let tf = timeframe.to_okx_string();
        let interval = timeframe.interval_ms();
        let mut since = range_start_ts;
        let mut repaired = 0i64;
        loop {
            if since > range_end_ts {
                break;
            }
            let bars = self
                .exchange
                .fetch_ohlcv(symbol, tf, Some(since), 200)
                .await
                .map_err(|e| IntegrityError::RepairFailed { job_id: String::new(), symbol: symbol.to_string(), timeframe: tf.to_string(), reason: e.to_string() })?;
            if bars.is_empty() {
                break;
            }
            let filtered: Vec<Candle> = bars
                .iter()
                .filter(|b| b.ts_ms <= range_end_ts)
                .map(|b| Candle { symbol: symbol.to_string(), timeframe, ts_ms: b.ts_ms, open: b.open, high: b.high, low: b.low, close: b.close, volume: b.volume })
                .collect();
            let page_len = bars.len();
            let inserted = self
                .candles
                .upsert_many(&filtered)
                .await
                .map_err(|e| IntegrityError::RepairFailed { job_id: String::new(), symbol: symbol.to_string(), timeframe: tf.to_string(), reason: e.to_string() })?;
            repaired += inserted as i64;

            let last_ts = bars.last().expect("checked non-empty above").ts_ms;
            if last_ts < since {
                break;
            }
            let next_since = last_ts + interval;
            if page_len < 200 && last_ts >= range_end_ts {
                break;
            }
            since = next_since;
            tokio::time::sleep(Duration::from_millis(self.exchange.rate_limit_ms())).await;
        }
        Ok(repaired)
    }

    async fn repair_by_fill(&self, symbol: &str, timeframe: Timeframe, range_start_ts: i64, range_end_ts: i64) -> Result<i64, IntegrityError> {
        let tf = timeframe.to_okx_string();
        let interval = timeframe.interval_ms();
        let prior = self
            .candles
            .range(symbol, tf, range_start_ts - interval, range_start_ts - 1)
            .await
            .map_err(|e| IntegrityError::RepairFailed { job_id: String::new(), symbol: symbol.to_string(), timeframe: tf.to_string(), reason: e.to_string() })?;
        let prev_close: Decimal = prior
            .last()
            .map(|c| c.close)
            .ok_or_else(|| IntegrityError::NoPrecedingClose { symbol: symbol.to_string(), timeframe: tf.to_string(), range_start_ts })?;

        let mut candles = Vec::new();
        let mut ts = range_start_ts;
        while ts <= range_end_ts {
            candles.push(Candle { symbol: symbol.to_string(), timeframe, ts_ms: ts, open: prev_close, high: prev_close, low: prev_close, close: prev_close, volume: Decimal::ZERO });
            ts += interval;
        }
        let inserted = self
            .candles
            .upsert_many(&candles)
            .await
            .map_err(|e| IntegrityError::RepairFailed { job_id: String::new(), symbol: symbol.to_string(), timeframe: tf.to_string(), reason: e.to_string() })?;
        Ok(inserted as i64)
    }
}
