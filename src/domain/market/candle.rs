use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::timeframe::Timeframe;

/// A single OHLCV bar for `(symbol, timeframe, ts_ms)`.
///
/// `low <= min(open, close)` and `high >= max(open, close)` are enforced by
/// `validate`, not by construction — callers decide whether to reject or log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub ts_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn validate(&self) -> Result<(), String> {
        if self.open.is_sign_negative()
            || self.high.is_sign_negative()
            || self.low.is_sign_negative()
            || self.close.is_sign_negative()
            || self.volume.is_sign_negative()
        {
            return Err(format!(
                "candle {}@{} has a negative field",
                self.symbol, self.ts_ms
            ));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!(
                "candle {}@{} low {} exceeds min(open,close)",
                self.symbol, self.ts_ms, self.low
            ));
        }
        if self.high < self.open.max(self.close) {
            return Err(format!(
                "candle {}@{} high {} below max(open,close)",
                self.symbol, self.ts_ms, self.high
            ));
        }
        if self.ts_ms % self.timeframe.interval_ms() != 0 {
            return Err(format!(
                "candle {}@{} is not aligned to {} interval",
                self.symbol,
                self.ts_ms,
                self.timeframe.to_okx_string()
            ));
        }
        Ok(())
    }

    /// Builds a flat synthetic bar (used by the gap-repair `fill` mode):
    /// open = high = low = close = `close`, zero volume.
    pub fn flat(symbol: &str, timeframe: Timeframe, ts_ms: i64, close: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            ts_ms,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }
}
