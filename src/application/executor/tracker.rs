//! Polls the exchange for orders the core lost track of (restart, missed
//! websocket update) and reconciles them through the same lifecycle path
//! the executors use.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::application::executor::lifecycle::transition_with_fill;
use crate::domain::exchange::{map_exchange_status, ExchangeGateway};
use crate::domain::repositories::{OrderRepository, TradeRepository};
use crate::domain::time::Clock;
use crate::domain::trading::types::{Order, OrderStatus, Trade};

pub struct OrderTracker {
    pub exchange: Arc<dyn ExchangeGateway>,
    pub orders: Arc<dyn OrderRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub clock: Arc<dyn Clock>,
}

fn event_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::New => "ORDER_SUBMITTED",
        OrderStatus::PartiallyFilled => "PARTIAL_FILL",
        OrderStatus::Filled => "ORDER_FILLED",
        OrderStatus::Canceled => "ORDER_CANCELED",
        OrderStatus::Rejected => "ORDER_REJECTED",
        OrderStatus::Created => "ORDER_UPDATE",
    }
}

impl OrderTracker {
    pub fn new(exchange: Arc<dyn ExchangeGateway>, orders: Arc<dyn OrderRepository>, trades: Arc<dyn TradeRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { exchange, orders, trades, clock }
    }

    async fn load_orders(&self, order_ids: Option<&[String]>, only_open: bool) -> anyhow::Result<Vec<Order>> {
        if let Some(ids) = order_ids {
            let mut rows = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(order) = self.orders.find_by_client_order_id(id).await? {
                    rows.push(order);
                }
            }
            return Ok(rows);
        }
        if only_open {
            return self.orders.find_open(None).await;
        }
        self.orders.find_open(None).await
    }

    /// Refreshes each tracked order from the exchange, returning the count
    /// whose status actually changed.
    pub async fn sync_orders(&self, order_ids: Option<&[String]>, only_open: bool) -> anyhow::Result<usize> {
        let rows = self.load_orders(order_ids, only_open).await?;
        let mut updated = 0usize;
        for order in rows {
            let Some(exchange_id) = order.exchange_order_id.clone() else {
                continue;
            };
            let reply = match self.exchange.fetch_order(&exchange_id, &order.symbol).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(exchange_id, error = %e, "fetch_order failed during sync");
                    continue;
                }
            };
            if self.apply_order_update(order, reply).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Applies one exchange reply to one stored order. Returns whether the
    /// status changed.
    async fn apply_order_update(&self, order: Order, reply: crate::domain::exchange::ExchangeOrderReply) -> anyhow::Result<bool> {
        let new_status = map_exchange_status(&reply);
        let old_status = order.status;
        let old_filled = order.filled_amount;
        let now_s = self.clock.now_s();

        let filled_increased = reply.filled.map(|f| f > old_filled).unwrap_or(false)
            && matches!(new_status, OrderStatus::New | OrderStatus::PartiallyFilled);

        let status_changed = new_status != old_status;
        let message = if filled_increased && !status_changed {
            format!("PARTIAL_FILL filled={}", reply.filled.unwrap_or(Decimal::ZERO))
        } else {
            event_message(new_status).to_string()
        };

        if !status_changed && !filled_increased {
            return Ok(false);
        }

        let updated = transition_with_fill(
            self.orders.as_ref(),
            order,
            new_status,
            message,
            now_s,
            Some(reply.status.clone()),
            Some(reply.ts_ms),
            reply.filled,
            reply.average,
            reply.fee.as_ref().map(|f| f.cost),
        )
        .await?;

        if new_status == OrderStatus::Filled {
            self.persist_trade(&updated, &reply).await?;
        }

        Ok(status_changed)
    }

    async fn persist_trade(&self, order: &Order, reply: &crate::domain::exchange::ExchangeOrderReply) -> anyhow::Result<()> {
        if self.trades.exists_for_order(order.id).await? {
            return Ok(());
        }
        let price = reply.average.or(order.price).unwrap_or(Decimal::ZERO);
        let amount = reply.filled.unwrap_or(order.amount);
        let (fee, fee_ccy) = reply.fee.as_ref().map(|f| (Some(f.cost), Some(f.currency.clone()))).unwrap_or((None, None));
        let trade = Trade { order_row_id: order.id, symbol: order.symbol.clone(), side: order.side, price, amount, fee, fee_ccy, realized_pnl: None, ts_ms: reply.ts_ms };
        self.trades.insert_if_absent(&trade).await?;
        Ok(())
    }
}
