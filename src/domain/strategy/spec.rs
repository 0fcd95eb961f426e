use crate::domain::market::candle::Candle;
use crate::domain::market::market_data::FundingRate;
use rust_decimal::Decimal;

/// One of the five signal types a strategy can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    CloseLong,
    CloseShort,
}

/// A strategy's verdict for one symbol/timeframe at one point in time.
#[derive(Debug, Clone)]
pub struct StrategySignal {
    pub strategy: &'static str,
    pub symbol: String,
    pub timeframe: String,
    pub signal_type: SignalType,
    pub confidence: f64,
    pub ts_ms: i64,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub position_size: Option<f64>,
    pub leverage: Option<Decimal>,
    pub reasoning: &'static str,
}

impl StrategySignal {
    pub fn hold(strategy: &'static str, symbol: &str, timeframe: &str, ts_ms: i64, price: Decimal, reasoning: &'static str) -> Self {
        Self {
            strategy,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            signal_type: SignalType::Hold,
            confidence: 0.0,
            ts_ms,
            price,
            stop_loss: None,
            take_profit: None,
            position_size: None,
            leverage: None,
            reasoning,
        }
    }
}

/// Input a strategy needs to produce a signal: a candle window plus the
/// latest funding rate (only the funding-arbitrage variant reads it).
pub struct StrategyInput<'a> {
    pub symbol: &'a str,
    pub timeframe: &'a str,
    pub candles: &'a [Candle],
    pub funding: Option<&'a FundingRate>,
}

/// Uniform operation every strategy implements, so the registry can hold
/// them as trait objects rather than matching on a strategy-id enum.
pub trait Strategy: Send + Sync {
    fn key(&self) -> &'static str;
    fn generate_signal(&self, input: &StrategyInput) -> StrategySignal;
}

/// Static description of a strategy: id, display name, whether it's wired
/// up to run, and which regimes it's suited for. Kept as a flat list of
/// data rather than scattered across constructors, so the enabled set and
/// regime affinities can be read and audited in one place.
pub struct StrategySpec {
    pub key: &'static str,
    pub name: &'static str,
    pub enabled: bool,
    pub implemented: bool,
    pub description: &'static str,
    /// Regimes this strategy is suited for, using the scoring-bucket labels
    /// (TREND/RANGE/BREAKOUT). Empty means "regime-agnostic".
    pub regimes: &'static [&'static str],
}

/// The full catalogue, enabled and disabled alike. Only entries with
/// `enabled && implemented` are wired into a running [`Strategy`] and
/// considered by the scorer; the rest document strategies that exist on
/// paper but have no implementation behind them yet.
pub const STRATEGY_SPECS: &[StrategySpec] = &[
    StrategySpec {
        key: "ema_trend",
        name: "EMA Trend",
        enabled: true,
        implemented: true,
        description: "EMA stack trend-following with MACD and volume confirmation.",
        regimes: &["TREND"],
    },
    StrategySpec {
        key: "bollinger_range",
        name: "Bollinger Range",
        enabled: true,
        implemented: true,
        description: "Mean reversion off Bollinger band touches in tight ranges.",
        regimes: &["RANGE"],
    },
    StrategySpec {
        key: "funding_rate_arbitrage",
        name: "Funding Rate Arbitrage",
        enabled: true,
        implemented: true,
        description: "Harvest persistently elevated perpetual funding.",
        regimes: &[],
    },
    StrategySpec {
        key: "breakout",
        name: "Breakout",
        enabled: false,
        implemented: false,
        description: "Range-expansion breakout entries.",
        regimes: &["BREAKOUT"],
    },
    StrategySpec {
        key: "grid_trading",
        name: "Grid Trading",
        enabled: false,
        implemented: false,
        description: "Fixed-grid limit ladders in ranging markets.",
        regimes: &["RANGE"],
    },
    StrategySpec {
        key: "momentum",
        name: "Momentum",
        enabled: false,
        implemented: false,
        description: "Short-horizon momentum continuation.",
        regimes: &["TREND", "BREAKOUT"],
    },
    StrategySpec {
        key: "mean_reversion",
        name: "Mean Reversion",
        enabled: false,
        implemented: false,
        description: "Statistical mean reversion on extended moves.",
        regimes: &["RANGE"],
    },
    StrategySpec {
        key: "onchain_signal",
        name: "On-chain Signal",
        enabled: false,
        implemented: false,
        description: "On-chain flow driven directional bias.",
        regimes: &[],
    },
    StrategySpec {
        key: "time_cycle",
        name: "Time Cycle",
        enabled: false,
        implemented: false,
        description: "Session/time-of-day seasonality.",
        regimes: &[],
    },
    StrategySpec {
        key: "volatility",
        name: "Volatility",
        enabled: false,
        implemented: false,
        description: "Long/short volatility regime plays.",
        regimes: &["HIGH_VOLATILITY"],
    },
];

/// Specs with `enabled && implemented`, in declaration order.
pub fn enabled_specs() -> impl Iterator<Item = &'static StrategySpec> {
    STRATEGY_SPECS.iter().filter(|s| s.enabled && s.implemented)
}

pub fn find_spec(key: &str) -> Option<&'static StrategySpec> {
    STRATEGY_SPECS.iter().find(|s| s.key == key)
}
