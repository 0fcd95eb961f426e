use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::errors::IngestionError;
use crate::domain::exchange::ExchangeGateway;
use crate::domain::market::candle::Candle;
use crate::domain::market::market_data::{Balance, FundingRate, PriceSnapshot};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{
    BalanceRepository, CandleRepository, FundingRateRepository, IngestionRunRepository, IngestionRunStatus,
    OpenInterest, OpenInterestRepository, PriceSnapshotRepository,
};
use crate::domain::time::Clock;

const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Pulls market data from the exchange and persists it gap-free. One
/// instance is shared across every (symbol, timeframe) the scheduler drives.
pub struct IngestionEngine {
    pub exchange: Arc<dyn ExchangeGateway>,
    pub candles: Arc<dyn CandleRepository>,
    pub funding_rates: Arc<dyn FundingRateRepository>,
    pub price_snapshots: Arc<dyn PriceSnapshotRepository>,
    pub open_interest: Arc<dyn OpenInterestRepository>,
    pub balances: Arc<dyn BalanceRepository>,
    pub runs: Arc<dyn IngestionRunRepository>,
    pub clock: Arc<dyn Clock>,
}

impl IngestionEngine {
    /// Backfills `(symbol, timeframe)` forward from the last stored bar (or
    /// `since_ms`/30-days-ago when the series is empty), paging until an
    /// empty/short page arrives or `max_bars` is exceeded. Returns rows inserted.
    pub async fn ingest_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: Option<i64>,
        limit: u32,
        max_bars: Option<u32>,
        override_since: bool,
    ) -> Result<usize, IngestionError> {
        let tf = timeframe.to_okx_string();
        let interval_ms = timeframe.interval_ms();
        let now = self.clock.now_s();

        let since = if override_since && since_ms.is_some() {
            since_ms.unwrap().max(0)
        } else if let Some(last_ts) = self
            .candles
            .latest_ts(symbol, &tf)
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?
        {
            last_ts + interval_ms
        } else {
            since_ms.unwrap_or_else(|| self.clock.now_ms() - THIRTY_DAYS_MS)
        };
        let mut since = since;

        let run_id = self
            .runs
            .start("okx", symbol, Some(&tf), "ohlcv", now)
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;

        let mut total = 0usize;
        let result = self.ingest_ohlcv_loop(symbol, timeframe, &mut since, interval_ms, limit, max_bars, &mut total).await;

        match &result {
            Ok(()) => {
                self.runs
                    .finish(run_id, IngestionRunStatus::Success, total as i64, None, self.clock.now_s())
                    .await
                    .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
            }
            Err(e) => {
                self.runs
                    .finish(run_id, IngestionRunStatus::Failed, total as i64, Some(&e.to_string()), self.clock.now_s())
                    .await
                    .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
            }
        }
        result.map(|()| total)
    }

    async fn ingest_ohlcv_loop(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: &mut i64,
        interval_ms: i64,
        limit: u32,
        max_bars: Option<u32>,
        total: &mut usize,
    ) -> Result<(), IngestionError> {
        let tf_str = timeframe.to_okx_string();
        loop {
            let bars = self
                .exchange
                .fetch_ohlcv(symbol, tf_str, Some(*since), limit)
                .await
                .map_err(|e| IngestionError::ExchangeCall { symbol: symbol.to_string(), timeframe: tf_str.to_string(), reason: e.to_string() })?;
            if bars.is_empty() {
                break;
            }
            let candles: Vec<Candle> = bars
                .iter()
                .map(|b| Candle { symbol: symbol.to_string(), timeframe, ts_ms: b.ts_ms, open: b.open, high: b.high, low: b.low, close: b.close, volume: b.volume })
                .collect();
            let page_len = candles.len();
            let inserted = self
                .candles
                .upsert_many(&candles)
                .await
                .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
            *total += inserted;
            *since = candles.last().expect("checked non-empty above").ts_ms + interval_ms;

            if let Some(max) = max_bars {
                if *total >= max as usize {
                    break;
                }
            }
            if page_len < limit as usize {
                break;
            }
        }
        Ok(())
    }

    pub async fn ingest_funding_rate(&self, symbol: &str) -> Result<usize, IngestionError> {
        let now = self.clock.now_s();
        let run_id = self
            .runs
            .start("okx", symbol, None, "funding_rate", now)
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;

        let reply = match self.exchange.fetch_funding_rate(symbol).await {
            Ok(r) => r,
            Err(e) => {
                let reason = e.to_string();
                let _ = self.runs.finish(run_id, IngestionRunStatus::Failed, 0, Some(&reason), self.clock.now_s()).await;
                return Err(IngestionError::ExchangeCall { symbol: symbol.to_string(), timeframe: String::new(), reason });
            }
        };

        let rate = FundingRate { symbol: symbol.to_string(), ts_ms: reply.ts_ms, rate: reply.rate, next_funding_ts: reply.next_funding_ts };
        self.funding_rates.upsert(&rate).await.map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        self.runs
            .finish(run_id, IngestionRunStatus::Success, 1, None, self.clock.now_s())
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        Ok(1)
    }

    pub async fn ingest_price_snapshot(&self, symbol: &str) -> Result<usize, IngestionError> {
        let now = self.clock.now_s();
        let run_id = self
            .runs
            .start("okx", symbol, None, "price_snapshot", now)
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;

        let ticker = match self.exchange.fetch_ticker(symbol).await {
            Ok(t) => t,
            Err(e) => {
                let reason = e.to_string();
                let _ = self.runs.finish(run_id, IngestionRunStatus::Failed, 0, Some(&reason), self.clock.now_s()).await;
                return Err(IngestionError::ExchangeCall { symbol: symbol.to_string(), timeframe: String::new(), reason });
            }
        };

        let snapshot = PriceSnapshot { symbol: symbol.to_string(), ts_ms: ticker.ts_ms, last: ticker.last, mark: ticker.mark, index: ticker.index };
        if !snapshot.is_valid() {
            self.runs
                .finish(run_id, IngestionRunStatus::Skipped, 0, Some("no last/mark/index present"), self.clock.now_s())
                .await
                .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
            return Ok(0);
        }
        self.price_snapshots.upsert(&snapshot).await.map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        self.runs
            .finish(run_id, IngestionRunStatus::Success, 1, None, self.clock.now_s())
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        Ok(1)
    }

    pub async fn ingest_open_interest(&self, symbol: &str) -> Result<usize, IngestionError> {
        let now = self.clock.now_s();
        let run_id = self
            .runs
            .start("okx", symbol, None, "open_interest", now)
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;

        let reply = match self.exchange.fetch_open_interest(symbol).await {
            Ok(r) => r,
            Err(e) => {
                let reason = e.to_string();
                let _ = self.runs.finish(run_id, IngestionRunStatus::Failed, 0, Some(&reason), self.clock.now_s()).await;
                return Err(IngestionError::ExchangeCall { symbol: symbol.to_string(), timeframe: String::new(), reason });
            }
        };
        let Some(oi) = reply.open_interest else {
            self.runs
                .finish(run_id, IngestionRunStatus::Skipped, 0, Some("missing openInterest"), self.clock.now_s())
                .await
                .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
            return Ok(0);
        };
        let row = OpenInterest { symbol: symbol.to_string(), ts_ms: reply.ts_ms, open_interest: oi, open_interest_value: reply.open_interest_value };
        self.open_interest.upsert(&row).await.map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        self.runs
            .finish(run_id, IngestionRunStatus::Success, 1, None, self.clock.now_s())
            .await
            .map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        Ok(1)
    }

    pub async fn sync_account_state(&self) -> Result<(), IngestionError> {
        let reply = self.exchange.fetch_balance().await.map_err(|e| IngestionError::ExchangeCall { symbol: "account".to_string(), timeframe: String::new(), reason: e.to_string() })?;
        for (currency, total) in &reply.total {
            let free = reply.free.iter().find(|(c, _)| c == currency).map(|(_, v)| *v).unwrap_or(Decimal::ZERO);
            let used = reply.used.iter().find(|(c, _)| c == currency).map(|(_, v)| *v).unwrap_or(Decimal::ZERO);
            let balance = Balance { currency: currency.clone(), ts_ms: reply.ts_ms, total: *total, free, used };
            self.balances.upsert(&balance).await.map_err(|e| IngestionError::StoreWrite { reason: e.to_string() })?;
        }
        info!(n = reply.total.len(), "synced account balances");
        Ok(())
    }

    /// Composes the single-shot ingests for every timeframe, sleeping one
    /// rate-limit interval between them.
    pub async fn ingest_all(&self, symbol: &str, timeframes: &[Timeframe], since_days: i64, limit: u32, max_bars: Option<u32>) {
        let since_ms = self.clock.now_ms() - since_days * 24 * 60 * 60 * 1000;
        for tf in timeframes {
            match self.ingest_ohlcv(symbol, *tf, Some(since_ms), limit, max_bars, false).await {
                Ok(n) => info!(symbol, timeframe = %tf, rows = n, "ingested ohlcv"),
                Err(e) => warn!(symbol, timeframe = %tf, error = %e, "ohlcv ingest failed"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(self.exchange.rate_limit_ms())).await;
        }
        if let Err(e) = self.ingest_funding_rate(symbol).await {
            warn!(symbol, error = %e, "funding rate ingest failed");
        }
        if let Err(e) = self.ingest_price_snapshot(symbol).await {
            warn!(symbol, error = %e, "price snapshot ingest failed");
        }
    }
}
