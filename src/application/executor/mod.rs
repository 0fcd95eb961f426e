//! Order executors: own the order state machine and invoke the exchange (or
//! a synthetic fill path). Two variants share one interface so the trading
//! cycle orchestrator never branches on which is active.

pub mod lifecycle;
pub mod live;
pub mod simulated;
pub mod tracker;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::trading::types::{Order, OrderSide, OrderType};

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub confidence: Option<f64>,
    pub signal_ok: bool,
}

#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn create_order(&self, request: CreateOrderRequest) -> anyhow::Result<Order>;
    async fn cancel_order(&self, client_order_id: &str) -> anyhow::Result<bool>;
    async fn get_order(&self, client_order_id: &str) -> anyhow::Result<Option<Order>>;
}
