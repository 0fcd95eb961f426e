//! Shared state-transition helper. Every executor and the order tracker
//! persist transitions through this single path so the order row update and
//! its lifecycle event always land in the same store call.

use rust_decimal::Decimal;

use crate::domain::repositories::OrderRepository;
use crate::domain::trading::types::{LifecycleEvent, Order, OrderStatus};

/// Moves `order` to `to`, persisting the row and a matching lifecycle event.
/// Panics only via the repository's own error path — callers are expected to
/// have already checked `order.status.can_transition_to(to)` where it matters.
pub async fn transition(orders: &dyn OrderRepository, mut order: Order, to: OrderStatus, message: impl Into<String>, now_s: i64) -> anyhow::Result<Order> {
    let from = order.status;
    order.status = to;
    order.updated_at_s = now_s;
    let event = LifecycleEvent::status_change(order.id, from, to, message);
    orders.update_with_event(&order, &event).await?;
    Ok(order)
}

/// Same as [`transition`] but stamps the lifecycle event with exchange
/// reply metadata (raw status string, exchange timestamp, observed fill).
pub async fn transition_with_fill(
    orders: &dyn OrderRepository,
    mut order: Order,
    to: OrderStatus,
    message: impl Into<String>,
    now_s: i64,
    exchange_status: Option<String>,
    exchange_ts: Option<i64>,
    fill_qty: Option<Decimal>,
    fill_price: Option<Decimal>,
    fee: Option<Decimal>,
) -> anyhow::Result<Order> {
    let from = order.status;
    order.status = to;
    order.updated_at_s = now_s;
    let event = LifecycleEvent {
        order_row_id: order.id,
        from_status: from,
        to_status: to,
        message: message.into(),
        exchange_status,
        exchange_ts,
        raw_payload: None,
        trade_id: None,
        fill_qty,
        fill_price,
        fee,
    };
    orders.update_with_event(&order, &event).await?;
    Ok(order)
}
