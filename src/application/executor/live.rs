//! Live executor: submits to the real exchange, reconciling its reply into
//! the order state machine. Mirrors the simulated executor's interface so
//! the orchestrator can swap one for the other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use crate::application::executor::lifecycle::{transition, transition_with_fill};
use crate::application::executor::{CreateOrderRequest, OrderExecutor};
use crate::domain::exchange::{map_exchange_status, ExchangeGateway, OrderParams};
use crate::domain::market::market_data::Balance;
use crate::domain::repositories::{BalanceRepository, OrderRepository, PositionRepository, TradeRepository};
use crate::domain::risk::manager::{RiskEventSink, RiskManager};
use crate::domain::risk::rules::{RiskCheckRequest, RiskConfig};
use crate::domain::time::Clock;
use crate::domain::trading::types::{Order, OrderSide, OrderStatus, OrderType, Position, Trade};

/// Hedge-mode posSide placement and fill-wait knobs that don't belong on the
/// request itself.
#[derive(Debug, Clone)]
pub struct LiveExecutorConfig {
    pub td_mode: Option<String>,
    pub pos_mode: Option<String>,
    pub default_market: String,
    pub wait_fill_timeout_s: u64,
    pub wait_fill_interval_s: u64,
}

impl Default for LiveExecutorConfig {
    fn default() -> Self {
        Self { td_mode: None, pos_mode: None, default_market: "swap".to_string(), wait_fill_timeout_s: 8, wait_fill_interval_s: 1 }
    }
}

fn hedge_mode(config: &LiveExecutorConfig) -> bool {
    config.default_market == "swap" && matches!(config.pos_mode.as_deref().map(|s| s.to_lowercase()), Some(ref m) if m == "long_short" || m == "hedge" || m == "longshort")
}

pub struct LiveExecutor {
    pub exchange: Arc<dyn ExchangeGateway>,
    pub orders: Arc<dyn OrderRepository>,
    pub trades: Arc<dyn TradeRepository>,
    pub balances: Arc<dyn BalanceRepository>,
    pub positions: Arc<dyn PositionRepository>,
    pub risk: RiskManager,
    pub risk_config: RiskConfig,
    pub risk_sink: Arc<dyn RiskEventSink>,
    pub clock: Arc<dyn Clock>,
    pub config: LiveExecutorConfig,
}

impl LiveExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: Arc<dyn ExchangeGateway>,
        orders: Arc<dyn OrderRepository>,
        trades: Arc<dyn TradeRepository>,
        balances: Arc<dyn BalanceRepository>,
        positions: Arc<dyn PositionRepository>,
        risk: RiskManager,
        risk_config: RiskConfig,
        risk_sink: Arc<dyn RiskEventSink>,
        clock: Arc<dyn Clock>,
        config: LiveExecutorConfig,
    ) -> Self {
        Self { exchange, orders, trades, balances, positions, risk, risk_config, risk_sink, clock, config }
    }

    /// Pulls balances and positions from the exchange and replaces the
    /// stored view wholesale: every currency reported is upserted, and every
    /// symbol/side the exchange no longer reports is deleted.
    pub async fn sync_account_state(&self, symbols: Option<&[String]>) -> anyhow::Result<()> {
        let now_ms = self.clock.now_ms();
        let balance = self.exchange.fetch_balance().await?;
        for (currency, total) in &balance.total {
            let free = balance.free.iter().find(|(c, _)| c == currency).map(|(_, v)| *v).unwrap_or(Decimal::ZERO);
            let used = balance.used.iter().find(|(c, _)| c == currency).map(|(_, v)| *v).unwrap_or(Decimal::ZERO);
            self.balances.upsert(&Balance { currency: currency.clone(), ts_ms: now_ms, total: *total, free, used }).await?;
        }

        let reported = self.exchange.fetch_positions(symbols).await?;
        let mut seen: Vec<(String, OrderSide)> = Vec::new();
        for reply in &reported {
            let Some(side) = reply.side else { continue };
            seen.push((reply.symbol.clone(), side));
            let position = Position {
                symbol: reply.symbol.clone(),
                side,
                size: reply.size,
                entry_price: reply.entry_price.unwrap_or(Decimal::ZERO),
                leverage: reply.leverage,
                unrealized_pnl: reply.unrealized_pnl,
                margin: reply.margin,
                updated_at: now_ms / 1000,
            };
            self.positions.upsert(&position).await?;
        }

        let symbols_to_check = match symbols {
            Some(list) => list.to_vec(),
            None => self.positions.all().await?.into_iter().map(|p| p.symbol).collect(),
        };
        for symbol in symbols_to_check {
            for existing in self.positions.find_by_symbol(&symbol).await? {
                if !seen.contains(&(existing.symbol.clone(), existing.side)) {
                    self.positions.delete(&existing.symbol, existing.side).await?;
                }
            }
        }
        Ok(())
    }

    async fn estimate_price(&self, symbol: &str) -> Option<Decimal> {
        let ticker = self.exchange.fetch_ticker(symbol).await.ok()?;
        ticker.last.or(ticker.mark).or(ticker.index)
    }

    fn build_params(&self, side: OrderSide) -> OrderParams {
        let mut params = OrderParams { td_mode: self.config.td_mode.clone(), pos_side: None, leverage: None };
        if hedge_mode(&self.config) {
            params.pos_side = Some(if side == OrderSide::Buy { "long".to_string() } else { "short".to_string() });
        }
        params
    }

    /// On a submit error mentioning `posSide` while in hedge mode, flips or
    /// drops the flag once and retries; a second failure is a hard reject.
    async fn submit_with_posside_retry(
        &self,
        symbol: &str,
        order_type: OrderType,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
        params: OrderParams,
    ) -> Result<crate::domain::exchange::ExchangeOrderReply, String> {
        match self.exchange.create_order(symbol, order_type, side, qty, price, &params).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                let message = e.to_string();
                if self.config.default_market != "swap" || !message.contains("posSide") {
                    return Err(message);
                }
                let mut retry_params = params.clone();
                if retry_params.pos_side.is_some() {
                    retry_params.pos_side = None;
                } else {
                    retry_params.pos_side = Some(if side == OrderSide::Buy { "long".to_string() } else { "short".to_string() });
                }
                self.exchange.create_order(symbol, order_type, side, qty, price, &retry_params).await.map_err(|e| e.to_string())
            }
        }
    }

    async fn persist_trade_from_reply(&self, order: &Order, reply: &crate::domain::exchange::ExchangeOrderReply) -> anyhow::Result<()> {
        if self.trades.exists_for_order(order.id).await? {
            return Ok(());
        }
        let filled = reply.filled.unwrap_or(order.amount);
        let price = reply.average.or(order.price).unwrap_or(Decimal::ZERO);
        let (fee, fee_ccy) = reply.fee.as_ref().map(|f| (Some(f.cost), Some(f.currency.clone()))).unwrap_or((None, None));
        let trade = Trade { order_row_id: order.id, symbol: order.symbol.clone(), side: order.side, price, amount: filled, fee, fee_ccy, realized_pnl: None, ts_ms: reply.ts_ms };
        self.trades.insert_if_absent(&trade).await?;
        Ok(())
    }

    /// Fetches the exchange's current view of the order and reconciles it
    /// into the local state machine, deriving a Trade on terminal FILLED.
    pub async fn refresh_order_status(&self, client_order_id: &str) -> anyhow::Result<Option<Order>> {
        let Some(order) = self.orders.find_by_client_order_id(client_order_id).await? else {
            return Ok(None);
        };
        let Some(exchange_id) = order.exchange_order_id.clone() else {
            return Ok(Some(order));
        };
        let reply = match self.exchange.fetch_order(&exchange_id, &order.symbol).await {
            Ok(r) => r,
            Err(e) => {
                warn!(client_order_id, error = %e, "fetch_order failed during refresh");
                return Ok(Some(order));
            }
        };
        let new_status = map_exchange_status(&reply);
        if new_status == order.status {
            return Ok(Some(order));
        }
        let now_s = self.clock.now_s();
        let order = transition_with_fill(
            self.orders.as_ref(),
            order,
            new_status,
            "exchange refresh",
            now_s,
            Some(reply.status.clone()),
            Some(reply.ts_ms),
            reply.filled,
            reply.average,
            reply.fee.as_ref().map(|f| f.cost),
        )
        .await?;
        if new_status == OrderStatus::Filled {
            self.persist_trade_from_reply(&order, &reply).await?;
        }
        Ok(Some(order))
    }

    /// Polls `refresh_order_status` until a terminal state or `timeout_s`
    /// elapses; never errors on timeout, just returns the latest state.
    pub async fn wait_for_fill(&self, client_order_id: &str) -> anyhow::Result<Option<Order>> {
        let deadline = self.clock.now_ms() + self.config.wait_fill_timeout_s as i64 * 1000;
        loop {
            let order = self.refresh_order_status(client_order_id).await?;
            if let Some(ref o) = order {
                if o.status.is_terminal() {
                    return Ok(order);
                }
            }
            if self.clock.now_ms() >= deadline {
                return Ok(order);
            }
            tokio::time::sleep(Duration::from_secs(self.config.wait_fill_interval_s)).await;
        }
    }
}

#[async_trait]
impl OrderExecutor for LiveExecutor {
    async fn create_order(&self, request: CreateOrderRequest) -> anyhow::Result<Order> {
        let now_s = self.clock.now_s();
        let effective_price = match request.price {
            Some(p) => Some(p),
            None => self.estimate_price(&request.symbol).await,
        };
        let mut order = Order::new(request.symbol.clone(), request.side, request.order_type, request.quantity, effective_price, now_s);
        order.leverage = request.leverage;
        let row_id = self.orders.insert(&order).await?;
        order.id = row_id;

        let risk_request = RiskCheckRequest {
            symbol: request.symbol.clone(),
            price: effective_price,
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

        if request.order_type == OrderType::Limit && effective_price.is_none() {
            return transition(self.orders.as_ref(), order, OrderStatus::Rejected, "limit order missing price", now_s).await;
        }

        let params = self.build_params(request.side);
        let reply = match self.submit_with_posside_retry(&request.symbol, request.order_type, request.side, request.quantity, request.price, params).await {
            Ok(r) => r,
            Err(message) => {
                return transition(self.orders.as_ref(), order, OrderStatus::Rejected, format!("exchange error: {message}"), now_s).await;
            }
        };

        order.exchange_order_id = Some(reply.exchange_order_id.clone());
        let order = transition(self.orders.as_ref(), order, OrderStatus::New, "exchange accepted", now_s).await?;

        let mapped = map_exchange_status(&reply);
        if mapped != order.status {
            let order = transition_with_fill(
                self.orders.as_ref(),
                order,
                mapped,
                "exchange status update",
                now_s,
                Some(reply.status.clone()),
                Some(reply.ts_ms),
                reply.filled,
                reply.average,
                reply.fee.as_ref().map(|f| f.cost),
            )
            .await?;
            if mapped == OrderStatus::Filled {
                self.persist_trade_from_reply(&order, &reply).await?;
            }
            return Ok(order);
        }
        Ok(order)
    }

    async fn cancel_order(&self, client_order_id: &str) -> anyhow::Result<bool> {
        let Some(order) = self.orders.find_by_client_order_id(client_order_id).await? else {
            return Ok(false);
        };
        if order.status.is_terminal() {
            return Ok(false);
        }
        if let Some(exchange_id) = &order.exchange_order_id {
            self.exchange.cancel_order(exchange_id, &order.symbol).await?;
        }
        let now_s = self.clock.now_s();
        transition(self.orders.as_ref(), order, OrderStatus::Canceled, "cancel requested", now_s).await?;
        Ok(true)
    }

    async fn get_order(&self, client_order_id: &str) -> anyhow::Result<Option<Order>> {
        self.orders.find_by_client_order_id(client_order_id).await
    }
}
