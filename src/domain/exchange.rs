//! The exchange contract the core depends on. Semantic, not wire-level: an
//! adapter translates OKX's actual REST/WS shapes into these types.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::trading::types::{OrderSide, OrderType};

#[derive(Debug, Clone)]
pub struct OhlcvBar {
    pub ts_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone)]
pub struct FundingRateReply {
    pub ts_ms: i64,
    pub rate: Decimal,
    pub next_funding_ts: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TickerReply {
    pub ts_ms: i64,
    pub last: Option<Decimal>,
    pub mark: Option<Decimal>,
    pub index: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct BalanceReply {
    pub ts_ms: i64,
    pub total: Vec<(String, Decimal)>,
    pub free: Vec<(String, Decimal)>,
    pub used: Vec<(String, Decimal)>,
}

#[derive(Debug, Clone)]
pub struct OpenInterestReply {
    pub ts_ms: i64,
    pub open_interest: Option<Decimal>,
    pub open_interest_value: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct PositionReply {
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct FeeInfo {
    pub cost: Decimal,
    pub currency: String,
}

/// Semantic reply shape shared by `create_order`/`fetch_order`/paged order queries.
#[derive(Debug, Clone)]
pub struct ExchangeOrderReply {
    pub exchange_order_id: String,
    pub status: String,
    pub filled: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub average: Option<Decimal>,
    pub fee: Option<FeeInfo>,
    pub ts_ms: i64,
}

#[derive(Debug, Clone)]
pub struct ExchangeTradeReply {
    pub exchange_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Option<FeeInfo>,
    pub ts_ms: i64,
}

/// Extra knobs needed to place an order (leverage, hedge-mode position side,
/// margin mode) that don't fit the semantic `create_order` signature itself.
#[derive(Debug, Clone, Default)]
pub struct OrderParams {
    pub td_mode: Option<String>,
    pub pos_side: Option<String>,
    pub leverage: Option<Decimal>,
}

#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<OhlcvBar>>;
    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<FundingRateReply>;
    async fn fetch_ticker(&self, symbol: &str) -> anyhow::Result<TickerReply>;
    async fn fetch_open_interest(&self, symbol: &str) -> anyhow::Result<OpenInterestReply>;
    async fn fetch_balance(&self) -> anyhow::Result<BalanceReply>;
    async fn fetch_positions(&self, symbols: Option<&[String]>) -> anyhow::Result<Vec<PositionReply>>;

    async fn create_order(&self, symbol: &str, order_type: OrderType, side: OrderSide, qty: Decimal, price: Option<Decimal>, params: &OrderParams) -> anyhow::Result<ExchangeOrderReply>;
    async fn fetch_order(&self, exchange_order_id: &str, symbol: &str) -> anyhow::Result<ExchangeOrderReply>;
    async fn cancel_order(&self, exchange_order_id: &str, symbol: &str) -> anyhow::Result<()>;
    async fn fetch_open_orders(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeOrderReply>>;
    async fn fetch_closed_orders(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeOrderReply>>;
    async fn fetch_my_trades(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeTradeReply>>;

    /// Hint in milliseconds; callers sleep this long between paged requests.
    fn rate_limit_ms(&self) -> u64;
}

/// Maps a raw exchange reply to one of the six order states.
/// `canceled|cancelled` -> CANCELED; `rejected` -> REJECTED; `filled >= amount`
/// (both known positive) or a `closed|filled` status string -> FILLED;
/// `filled > 0` -> PARTIALLY_FILLED; else NEW.
pub fn map_exchange_status(reply: &ExchangeOrderReply) -> crate::domain::trading::types::OrderStatus {
    use crate::domain::trading::types::OrderStatus;
    let status = reply.status.to_lowercase();
    if status.contains("cancel") {
        return OrderStatus::Canceled;
    }
    if status.contains("reject") {
        return OrderStatus::Rejected;
    }
    if status.contains("closed") || status.contains("filled") {
        return OrderStatus::Filled;
    }
    if let (Some(filled), Some(amount)) = (reply.filled, reply.amount) {
        if filled > Decimal::ZERO && amount > Decimal::ZERO && filled >= amount {
            return OrderStatus::Filled;
        }
        if filled > Decimal::ZERO {
            return OrderStatus::PartiallyFilled;
        }
    }
    OrderStatus::New
}
