//! Gap and duplicate detection over a stored candle range.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{CandleRepository, IntegrityEvent, IntegrityEventRepository, IntegrityEventType, Severity};
use crate::domain::time::Clock;

/// `>=100 missing/duplicate bars -> HIGH`, `>=20 -> MEDIUM`, else `LOW`.
fn severity_from_count(missing: i64, duplicate: i64) -> Severity {
    if missing >= 100 || duplicate >= 100 {
        Severity::High
    } else if missing >= 20 || duplicate >= 20 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub struct ScanSummary {
    pub count: usize,
    pub gaps: usize,
    pub duplicates: usize,
}

pub struct IntegrityScanner {
    pub candles: Arc<dyn CandleRepository>,
    pub events: Arc<dyn IntegrityEventRepository>,
    pub clock: Arc<dyn Clock>,
}

impl IntegrityScanner {
    pub fn new(candles: Arc<dyn CandleRepository>, events: Arc<dyn IntegrityEventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { candles, events, clock }
    }

    /// Scans `[range_start, range_end]` for `(symbol, timeframe)`, inserting
    /// one GAP event per hole and one DUPLICATE event per repeated timestamp.
    pub async fn scan(&self, symbol: &str, timeframe: Timeframe, range_start: i64, range_end: i64) -> anyhow::Result<ScanSummary> {
        let tf = timeframe.to_okx_string();
        let interval = timeframe.interval_ms();
        let rows = self.candles.range(symbol, tf, range_start, range_end).await?;
        let detected_at = self.clock.now_s();

        if rows.is_empty() {
            return Ok(ScanSummary { count: 0, gaps: 0, duplicates: 0 });
        }

        let mut counts: HashMap<i64, i64> = HashMap::new();
        for c in &rows {
            *counts.entry(c.ts_ms).or_insert(0) += 1;
        }
        let mut unique_ts: Vec<i64> = counts.keys().copied().collect();
        unique_ts.sort_unstable();

        let mut gap_events = 0usize;
        for pair in unique_ts.windows(2) {
            let (prev_ts, curr_ts) = (pair[0], pair[1]);
            let delta = curr_ts - prev_ts;
            if delta > interval {
                let missing = delta / interval - 1;
                gap_events += 1;
                let event = IntegrityEvent {
                    symbol: symbol.to_string(),
                    timeframe: tf.to_string(),
                    event_type: IntegrityEventType::Gap,
                    start_ts: prev_ts + interval,
                    end_ts: curr_ts - interval,
                    expected_bars: delta / interval + 1,
                    actual_bars: 2,
                    missing_bars: missing,
                    duplicate_bars: 0,
                    severity: severity_from_count(missing, 0),
                    detected_at_s: detected_at,
                    repair_job_id: None,
                };
                self.events.insert(&event).await?;
            }
        }

        let duplicates: Vec<(i64, i64)> = counts.iter().filter(|(_, &cnt)| cnt > 1).map(|(&ts, &cnt)| (ts, cnt)).collect();
        for (ts, cnt) in &duplicates {
            let event = IntegrityEvent {
                symbol: symbol.to_string(),
                timeframe: tf.to_string(),
                event_type: IntegrityEventType::Duplicate,
                start_ts: *ts,
                end_ts: *ts,
                expected_bars: 1,
                actual_bars: *cnt,
                missing_bars: 0,
                duplicate_bars: cnt - 1,
                severity: severity_from_count(0, cnt - 1),
                detected_at_s: detected_at,
                repair_job_id: None,
            };
            self.events.insert(&event).await?;
        }

        Ok(ScanSummary { count: unique_ts.len(), gaps: gap_events, duplicates: duplicates.len() })
    }
}
