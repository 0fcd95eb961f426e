//! Instant-fill executor for backtests and paper trading. No exchange call:
//! every accepted order transitions `CREATED -> NEW -> FILLED` in one step.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::executor::lifecycle::transition;
use crate::application::executor::{CreateOrderRequest, OrderExecutor};
use crate::domain::repositories::{OrderRepository, PositionRepository, TradeRepository};
use crate::domain::risk::manager::{RiskEventSink, RiskManager};
use crate::domain::risk::rules::{RiskCheckRequest, RiskConfig};
use crate::domain::time::Clock;
use crate::domain::trading::types::{Order, OrderSide, OrderStatus, OrderType, Position, Trade};

pub struct SimulatedExecutor {
    pub orders: Arc<dyn OrderRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub positions: Arc<dyn PositionRepository>,
    pub risk: RiskManager,
    pub risk_config: RiskConfig,
    pub risk_sink: Arc<dyn RiskEventSink>,
    pub clock: Arc<dyn Clock>,
}

impl SimulatedExecutor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        trades: Arc<dyn TradeRepository>,
        positions: Arc<dyn PositionRepository>,
        risk: RiskManager,
        risk_config: RiskConfig,
        risk_sink: Arc<dyn RiskEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { orders, trades, positions, risk, risk_config, risk_sink, clock }
    }

    async fn persist_trade(&self, order: &Order) -> anyhow::Result<()> {
        if self.trades.exists_for_order(order.id).await? {
            return Ok(());
        }
        let trade = Trade {
            order_row_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            price: order.price.unwrap_or(Decimal::ZERO),
            amount: order.amount,
            fee: None,
            fee_ccy: None,
            realized_pnl: None,
            ts_ms: self.clock.now_ms(),
        };
        self.trades.insert_if_absent(&trade).await?;
        Ok(())
    }

    /// Maintains a single net position per symbol: adds signed size,
    /// reweights entry on same-direction adds, resets entry on reversal,
    /// deletes the row once net size collapses to ~0.
    async fn update_position(&self, order: &Order) -> anyhow::Result<()> {
        if order.amount <= Decimal::ZERO {
            return Ok(());
        }
        let signed_qty = Decimal::from(order.side.sign()) * order.amount;
        let existing = self.positions.find_by_symbol(&order.symbol).await?;

        let mut net_size = Decimal::ZERO;
        let mut entry_price: Option<Decimal> = None;
        for pos in &existing {
            net_size += Decimal::from(pos.side.sign()) * pos.size;
            if entry_price.is_none() {
                entry_price = Some(pos.entry_price);
            }
        }

        let new_net = net_size + signed_qty;
        if new_net.abs() < Decimal::new(1, 8) {
            for pos in &existing {
                self.positions.delete(&order.symbol, pos.side).await?;
            }
            return Ok(());
        }

        let price = order.price.or(entry_price).unwrap_or(Decimal::ZERO);
        let new_entry = if net_size == Decimal::ZERO || net_size * new_net < Decimal::ZERO {
            price
        } else if net_size * signed_qty > Decimal::ZERO {
            let base_entry = entry_price.unwrap_or(price);
            (net_size.abs() * base_entry + signed_qty.abs() * price) / new_net.abs()
        } else {
            entry_price.unwrap_or(price)
        };

        let new_side = if new_net > Decimal::ZERO { OrderSide::Buy } else { OrderSide::Sell };
        for pos in &existing {
            self.positions.delete(&order.symbol, pos.side).await?;
        }
        self.positions
            .upsert(&Position {
                symbol: order.symbol.clone(),
                side: new_side,
                size: new_net.abs(),
                entry_price: new_entry,
                leverage: order.leverage,
                unrealized_pnl: None,
                margin: None,
                updated_at: self.clock.now_s(),
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderExecutor for SimulatedExecutor {
    async fn create_order(&self, request: CreateOrderRequest) -> anyhow::Result<Order> {
        let now_s = self.clock.now_s();
        let mut order = Order::new(request.symbol.clone(), request.side, request.order_type, request.quantity, request.price, now_s);
        order.leverage = request.leverage;
        let row_id = self.orders.insert(&order).await?;
        order.id = row_id;

        let risk_request = RiskCheckRequest {
            symbol: request.symbol.clone(),
            price: request.price,
            quantity: request.quantity,
            leverage: request.leverage,
            signal_ok: request.signal_ok,
            confidence: request.confidence,
        };
        let outcome = self.risk.check_and_record(&risk_request, &self.risk_config, self.risk_sink.as_ref(), now_s).await?;
        if !outcome.ok {
            let reason = outcome.reason.unwrap_or_default();
            return transition(self.orders.as_ref(), order, OrderStatus::Rejected, reason, now_s).await;
        }

        let order = transition(self.orders.as_ref(), order, OrderStatus::New, "accepted", now_s).await?;
        let order = transition(self.orders.as_ref(), order, OrderStatus::Filled, "instant fill", now_s).await?;
        self.persist_trade(&order).await?;
        self.update_position(&order).await?;
        Ok(order)
    }

    async fn cancel_order(&self, client_order_id: &str) -> anyhow::Result<bool> {
        let Some(order) = self.orders.find_by_client_order_id(client_order_id).await? else {
            return Ok(false);
        };
        if order.status.is_terminal() {
            return Ok(false);
        }
        let now_s = self.clock.now_s();
        transition(self.orders.as_ref(), order, OrderStatus::Canceled, "canceled", now_s).await?;
        Ok(true)
    }

    async fn get_order(&self, client_order_id: &str) -> anyhow::Result<Option<Order>> {
        self.orders.find_by_client_order_id(client_order_id).await
    }
}
