use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One funding-rate print for a perpetual swap. Inserts are monotonic by
/// `(symbol, ts_ms)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRate {
    pub symbol: String,
    pub ts_ms: i64,
    pub rate: Decimal,
    pub next_funding_ts: Option<i64>,
}

/// A mark/index/last price triple; at least one field must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub ts_ms: i64,
    pub last: Option<Decimal>,
    pub mark: Option<Decimal>,
    pub index: Option<Decimal>,
}

impl PriceSnapshot {
    pub fn is_valid(&self) -> bool {
        self.last.is_some() || self.mark.is_some() || self.index.is_some()
    }

    /// Effective price for notional math: last, else mark, else index.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.last.or(self.mark).or(self.index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    pub ts_ms: i64,
    pub total: Decimal,
    pub free: Decimal,
    pub used: Decimal,
}
