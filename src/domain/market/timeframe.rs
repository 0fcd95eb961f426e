use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar interval for candle series. Mirrors the OKX perpetual-swap
/// timeframe set; every variant must round-trip through `to_okx_string`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    TwoHour,
    FourHour,
    SixHour,
    TwelveHour,
    OneDay,
}

impl Timeframe {
    /// Duration of this timeframe in minutes.
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::ThreeMin => 3,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::TwoHour => 120,
            Timeframe::FourHour => 240,
            Timeframe::SixHour => 360,
            Timeframe::TwelveHour => 720,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Interval length in milliseconds, the unit candle timestamps are stored in.
    pub fn interval_ms(&self) -> i64 {
        self.to_seconds() * 1000
    }

    /// Converts to the OKX candlestick bar string (e.g. "15m", "4H", "1D").
    pub fn to_okx_string(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::ThreeMin => "3m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1H",
            Timeframe::TwoHour => "2H",
            Timeframe::FourHour => "4H",
            Timeframe::SixHour => "6H",
            Timeframe::TwelveHour => "12H",
            Timeframe::OneDay => "1D",
        }
    }

    /// Returns all available timeframes in ascending order.
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::ThreeMin,
            Timeframe::FiveMin,
            Timeframe::FifteenMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::TwoHour,
            Timeframe::FourHour,
            Timeframe::SixHour,
            Timeframe::TwelveHour,
            Timeframe::OneDay,
        ]
    }

    /// True if `timestamp_ms` falls exactly on a period boundary for this timeframe.
    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        timestamp_ms % self.interval_ms() == 0
    }

    /// Start timestamp (ms) of the period containing `timestamp_ms`.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let interval = self.interval_ms();
        timestamp_ms - (timestamp_ms.rem_euclid(interval))
    }

    /// 1-minute-candle count needed to warm up an indicator of this period on this timeframe,
    /// with a 10% buffer.
    pub fn warmup_candles(&self, indicator_period: usize) -> usize {
        let required = indicator_period * self.to_minutes();
        (required as f64 * 1.1) as usize
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" => Ok(Timeframe::OneMin),
            "3m" => Ok(Timeframe::ThreeMin),
            "5m" => Ok(Timeframe::FiveMin),
            "15m" => Ok(Timeframe::FifteenMin),
            "30m" => Ok(Timeframe::ThirtyMin),
            "1h" => Ok(Timeframe::OneHour),
            "2h" => Ok(Timeframe::TwoHour),
            "4h" => Ok(Timeframe::FourHour),
            "6h" => Ok(Timeframe::SixHour),
            "12h" => Ok(Timeframe::TwelveHour),
            "1d" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "invalid timeframe '{}', expected one of 1m,3m,5m,15m,30m,1h,2h,4h,6h,12h,1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_okx_string())
    }
}
