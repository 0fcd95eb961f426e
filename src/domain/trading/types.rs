use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for Buy, -1 for Sell — used when summing signed notional across positions.
    pub fn sign(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// The six-state order machine: `CREATED -> NEW -> {PARTIALLY_FILLED
/// -> FILLED | FILLED | CANCELED | REJECTED}`, plus `CREATED -> REJECTED`.
/// Terminal states are FILLED, CANCELED, REJECTED; there are no back edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected)
    }

    /// True if `self -> next` is a legal edge in the state machine (no back edges).
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, New)
                | (Created, Rejected)
                | (New, PartiallyFilled)
                | (New, Filled)
                | (New, Canceled)
                | (New, Rejected)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Canceled)
                | (PartiallyFilled, Rejected)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Time-in-force, forwarded verbatim to the exchange when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTilCanceled,
    ImmediateOrCancel,
    FillOrKill,
}

/// An order row. `client_order_id` is the idempotency key every repository
/// upserts on; `exchange_order_id` is populated once the exchange accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub filled_amount: Decimal,
    pub remaining_amount: Decimal,
    pub average_price: Option<Decimal>,
    pub status: OrderStatus,
    pub leverage: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub created_at_s: i64,
    pub updated_at_s: i64,
}

impl Order {
    /// Builds a fresh CREATED order with a generated client id.
    pub fn new(symbol: String, side: OrderSide, order_type: OrderType, amount: Decimal, price: Option<Decimal>, now_s: i64) -> Self {
        Self {
            id: 0,
            client_order_id: Uuid::new_v4().to_string(),
            exchange_order_id: None,
            symbol,
            side,
            order_type,
            price,
            amount,
            filled_amount: Decimal::ZERO,
            remaining_amount: amount,
            average_price: None,
            status: OrderStatus::Created,
            leverage: None,
            time_in_force: None,
            created_at_s: now_s,
            updated_at_s: now_s,
        }
    }

    pub fn notional(&self) -> Option<Decimal> {
        self.price.map(|p| p * self.amount)
    }
}

/// One fill. Unique by `(order_row_id, ts_ms, price, amount, side)`; created
/// only once an order reaches FILLED or PARTIALLY_FILLED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub order_row_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Option<Decimal>,
    pub fee_ccy: Option<String>,
    pub realized_pnl: Option<Decimal>,
    pub ts_ms: i64,
}

/// Append-only record of one order status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub order_row_id: i64,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub message: String,
    pub exchange_status: Option<String>,
    pub exchange_ts: Option<i64>,
    pub raw_payload: Option<String>,
    pub trade_id: Option<i64>,
    pub fill_qty: Option<Decimal>,
    pub fill_price: Option<Decimal>,
    pub fee: Option<Decimal>,
}

impl LifecycleEvent {
    pub fn status_change(order_row_id: i64, from_status: OrderStatus, to_status: OrderStatus, message: impl Into<String>) -> Self {
        Self {
            order_row_id,
            from_status,
            to_status,
            message: message.into(),
            exchange_status: None,
            exchange_ts: None,
            raw_payload: None,
            trade_id: None,
            fill_qty: None,
            fill_price: None,
            fee: None,
        }
    }
}

/// A single net position per `(symbol, side)`; deleted once net size
/// collapses to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub leverage: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub updated_at: i64,
}

impl Position {
    /// Signed notional at `price`: positive for long, negative for short.
    pub fn signed_notional(&self, price: Decimal) -> Decimal {
        Decimal::from(self.side.sign()) * self.size * price
    }
}

/// Historical point-in-time copy of a position; never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub ts_ms: i64,
    pub side: OrderSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

/// One immutable decision record — the output of `decide()` persisted before
/// any order it justifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: i64,
    pub symbol: String,
    pub timeframe: String,
    pub ts_ms: i64,
    pub action: String,
    pub confidence: Option<f64>,
    pub reasoning: String,
    pub technical_analysis: String,
    pub accepted: bool,
}

impl Decision {
    pub fn now(symbol: String, timeframe: String, action: String, reasoning: String, technical_analysis: String, now_ms: i64) -> Self {
        Self {
            id: 0,
            symbol,
            timeframe,
            ts_ms: now_ms,
            action,
            confidence: None,
            reasoning,
            technical_analysis,
            accepted: true,
        }
    }
}

pub fn now_s() -> i64 {
    Utc::now().timestamp()
}
