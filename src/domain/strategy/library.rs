use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::market::indicators::{atr, bollinger_bands, ema, macd, rsi, volume_ma};
use crate::domain::strategy::spec::{SignalType, Strategy, StrategyInput, StrategySignal};

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn from_f64(v: f64) -> Decimal {
    Decimal::from_f64_retain(v).unwrap_or_default()
}

/// EMA(9/21/55) stack trend-following with MACD and volume confirmation.
pub struct EmaTrendStrategy {
    pub ema_fast: usize,
    pub ema_medium: usize,
    pub ema_slow: usize,
    pub atr_period: usize,
    pub stop_loss_atr: f64,
    pub take_profit_atr: f64,
    pub position_size: f64,
    pub max_leverage: Decimal,
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub rsi_short_min: f64,
    pub rsi_short_max: f64,
    pub volume_threshold: f64,
}

impl Default for EmaTrendStrategy {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_medium: 21,
            ema_slow: 55,
            atr_period: 14,
            stop_loss_atr: 2.0,
            take_profit_atr: 4.0,
            position_size: 0.20,
            max_leverage: dec!(3),
            rsi_min: 50.0,
            rsi_max: 70.0,
            rsi_short_min: 30.0,
            rsi_short_max: 50.0,
            volume_threshold: 1.2,
        }
    }
}

impl Strategy for EmaTrendStrategy {
    fn key(&self) -> &'static str {
        "ema_trend"
    }

    fn generate_signal(&self, input: &StrategyInput) -> StrategySignal {
        let candles = input.candles;
        if candles.len() < self.ema_slow + 5 {
            return hold(self.key(), input, "not_enough_data");
        }

        let closes: Vec<f64> = candles.iter().map(|c| to_f64(c.close)).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| to_f64(c.volume)).collect();
        let ema_fast = ema(&closes, self.ema_fast);
        let ema_medium = ema(&closes, self.ema_medium);
        let ema_slow = ema(&closes, self.ema_slow);
        let atr_series = atr(candles, self.atr_period);
        let rsi_series = rsi(&closes, 14);
        let vol_ma = volume_ma(&volumes, 20);
        let macd_out = macd(&closes, 12, 26, 9);

        let i = candles.len() - 1;
        let last = &candles[i];
        let price = to_f64(last.close);

        let is_uptrend = ema_fast[i] > ema_medium[i] && ema_medium[i] > ema_slow[i] && price > ema_fast[i];
        let is_downtrend = ema_fast[i] < ema_medium[i] && ema_medium[i] < ema_slow[i] && price < ema_fast[i];

        let volume_ok = vol_ma[i].map(|m| volumes[i] > m * self.volume_threshold).unwrap_or(false);
        let macd_bullish = macd_out.macd[i] > macd_out.signal[i] && macd_out.macd[i] > 0.0;
        let macd_bearish = macd_out.macd[i] < macd_out.signal[i] && macd_out.macd[i] < 0.0;
        let rsi_val = rsi_series[i];
        let atr_val = atr_series[i].unwrap_or(0.0);

        if is_uptrend && macd_bullish && volume_ok && rsi_val > self.rsi_min && rsi_val < self.rsi_max {
            let (sl, tp) = if atr_val != 0.0 {
                (Some(from_f64(price - atr_val * self.stop_loss_atr)), Some(from_f64(price + atr_val * self.take_profit_atr)))
            } else {
                (None, None)
            };
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::Buy,
                confidence: 0.85,
                ts_ms: last.ts_ms,
                price: last.close,
                stop_loss: sl,
                take_profit: tp,
                position_size: Some(self.position_size),
                leverage: Some(self.max_leverage),
                reasoning: "EMA trend up with MACD confirmation and volume surge.",
            };
        }

        if is_downtrend && macd_bearish && volume_ok && rsi_val > self.rsi_short_min && rsi_val < self.rsi_short_max {
            let (sl, tp) = if atr_val != 0.0 {
                (Some(from_f64(price + atr_val * self.stop_loss_atr)), Some(from_f64(price - atr_val * self.take_profit_atr)))
            } else {
                (None, None)
            };
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::Sell,
                confidence: 0.85,
                ts_ms: last.ts_ms,
                price: last.close,
                stop_loss: sl,
                take_profit: tp,
                position_size: Some(self.position_size),
                leverage: Some(self.max_leverage),
                reasoning: "EMA trend down with MACD confirmation and volume surge.",
            };
        }

        hold(self.key(), input, "no_signal")
    }
}

/// Mean reversion off Bollinger band touches, gated to tight-range markets.
pub struct BollingerRangeStrategy {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bandwidth_max: f64,
    pub touch_threshold: f64,
    pub stop_loss_pct: f64,
    pub position_size: f64,
    pub max_leverage: Decimal,
}

impl Default for BollingerRangeStrategy {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std: 2.0,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            bandwidth_max: 0.04,
            touch_threshold: 1.005,
            stop_loss_pct: 0.02,
            position_size: 0.25,
            max_leverage: dec!(2),
        }
    }
}

impl Strategy for BollingerRangeStrategy {
    fn key(&self) -> &'static str {
        "bollinger_range"
    }

    fn generate_signal(&self, input: &StrategyInput) -> StrategySignal {
        let candles = input.candles;
        if candles.len() < self.bb_period + 5 {
            return hold(self.key(), input, "not_enough_data");
        }

        let closes: Vec<f64> = candles.iter().map(|c| to_f64(c.close)).collect();
        let bands = bollinger_bands(&closes, self.bb_period, self.bb_std);
        let rsi_series = rsi(&closes, 14);

        let i = candles.len() - 1;
        let last = &candles[i];
        let price = to_f64(last.close);
        let bandwidth = bands.bandwidth[i].unwrap_or(1.0);
        let rsi_val = rsi_series[i];

        if bandwidth > self.bandwidth_max {
            return hold(self.key(), input, "bandwidth_too_wide");
        }

        let lower = bands.lower[i].unwrap_or(price);
        let upper = bands.upper[i].unwrap_or(price);
        let mid = bands.mid[i].unwrap_or(price);

        if price <= lower * self.touch_threshold && rsi_val < self.rsi_oversold {
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::Buy,
                confidence: 0.75,
                ts_ms: last.ts_ms,
                price: last.close,
                stop_loss: Some(from_f64(price * (1.0 - self.stop_loss_pct))),
                take_profit: Some(from_f64(mid)),
                position_size: Some(self.position_size),
                leverage: Some(self.max_leverage),
                reasoning: "Price touched lower band in low-volatility range.",
            };
        }

        if price >= upper / self.touch_threshold && rsi_val > self.rsi_overbought {
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::Sell,
                confidence: 0.75,
                ts_ms: last.ts_ms,
                price: last.close,
                stop_loss: Some(from_f64(price * (1.0 + self.stop_loss_pct))),
                take_profit: Some(from_f64(mid)),
                position_size: Some(self.position_size),
                leverage: Some(self.max_leverage),
                reasoning: "Price touched upper band in low-volatility range.",
            };
        }

        hold(self.key(), input, "no_signal")
    }
}

/// Harvests persistently elevated perpetual funding; the only strategy that
/// reads the funding-rate stream rather than purely the candle window.
pub struct FundingRateArbitrageStrategy {
    pub min_funding_rate: Decimal,
    pub exit_funding_rate: Decimal,
    pub position_size: f64,
    pub max_leverage: Decimal,
    pub min_duration: usize,
}

impl Default for FundingRateArbitrageStrategy {
    fn default() -> Self {
        Self {
            min_funding_rate: dec!(0.001),
            exit_funding_rate: dec!(0.0005),
            position_size: 0.50,
            max_leverage: dec!(1),
            min_duration: 3,
        }
    }
}

impl FundingRateArbitrageStrategy {
    /// `recent` is the last `min_duration` (or fewer) funding-rate
    /// observations, most-recent last; callers own retaining this history
    /// since a single `StrategyInput` carries only the latest rate.
    pub fn generate_signal_with_history(&self, input: &StrategyInput, recent: &[Decimal]) -> StrategySignal {
        let Some(funding) = input.funding else {
            return hold(self.key(), input, "no_funding_data");
        };
        let price = input.candles.last().map(|c| c.close).unwrap_or_default();

        if funding.rate >= self.min_funding_rate
            && recent.len() >= self.min_duration
            && recent[recent.len() - self.min_duration..].iter().all(|r| *r >= self.min_funding_rate)
        {
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::Buy,
                confidence: 0.9,
                ts_ms: funding.ts_ms,
                price,
                stop_loss: None,
                take_profit: None,
                position_size: Some(self.position_size),
                leverage: Some(self.max_leverage),
                reasoning: "Funding rate elevated for consecutive cycles.",
            };
        }

        if funding.rate <= self.exit_funding_rate {
            return StrategySignal {
                strategy: self.key(),
                symbol: input.symbol.to_string(),
                timeframe: input.timeframe.to_string(),
                signal_type: SignalType::CloseLong,
                confidence: 0.8,
                ts_ms: funding.ts_ms,
                price,
                stop_loss: None,
                take_profit: None,
                position_size: None,
                leverage: None,
                reasoning: "Funding rate normalized; exit arbitrage.",
            };
        }

        hold(self.key(), input, "no_signal")
    }
}

impl Strategy for FundingRateArbitrageStrategy {
    fn key(&self) -> &'static str {
        "funding_rate_arbitrage"
    }

    fn generate_signal(&self, input: &StrategyInput) -> StrategySignal {
        let recent = input.funding.map(|f| vec![f.rate]).unwrap_or_default();
        self.generate_signal_with_history(input, &recent)
    }
}

fn hold(strategy: &'static str, input: &StrategyInput, reason: &'static str) -> StrategySignal {
    let (ts_ms, price) = input
        .candles
        .last()
        .map(|c| (c.ts_ms, c.close))
        .unwrap_or((0, Decimal::ZERO));
    StrategySignal::hold(strategy, input.symbol, input.timeframe, ts_ms, price, reason)
}
