use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::trading::types::{now_s, Order, OrderSide, OrderType, Position};

/// One strategy's target notional contribution, kept for logging even when
/// it produces no order of its own (allocator emits at most one net order
/// per symbol).
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub strategy_id: String,
    pub weight: f64,
    pub target_notional: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    pub global_leverage: Decimal,
    pub diff_threshold: Decimal,
    pub min_notional: Decimal,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { global_leverage: dec!(1), diff_threshold: dec!(1), min_notional: dec!(10) }
    }
}

/// Translates scheduler weights into at most one net order per symbol.
pub struct PortfolioAllocator {
    pub config: AllocatorConfig,
}

impl Default for PortfolioAllocator {
    fn default() -> Self {
        Self { config: AllocatorConfig::default() }
    }
}

impl PortfolioAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    /// `weights` maps strategy id to its renormalized weight (summing to
    /// ~1). Returns the allocation plan (for logging) and at most one order,
    /// `None` when equity is non-positive, there's no usable price, or the
    /// diff doesn't clear `diff_threshold`/`min_notional`.
    pub fn build_orders(
        &self,
        symbol: &str,
        weights: &[(String, f64)],
        total_equity: Decimal,
        positions: &[Position],
        price: Decimal,
    ) -> (Vec<AllocationPlan>, Option<Order>) {
        if total_equity <= Decimal::ZERO || price <= Decimal::ZERO {
            return (Vec::new(), None);
        }

        let plan = self.build_plan(weights, total_equity);
        let target_notional: Decimal = plan.iter().map(|p| p.target_notional).sum();
        let current_notional: Decimal = positions.iter().filter(|p| p.symbol == symbol).map(|p| p.signed_notional(price)).sum();
        let diff = target_notional - current_notional;

        if diff.abs() < self.config.diff_threshold {
            return (plan, None);
        }
        if self.config.min_notional > Decimal::ZERO && diff.abs() < self.config.min_notional {
            return (plan, None);
        }

        let side = if diff > Decimal::ZERO { OrderSide::Buy } else { OrderSide::Sell };
        let quantity = diff.abs() / price;
        let mut order = Order::new(symbol.to_string(), side, OrderType::Market, quantity, Some(price), now_s());
        order.leverage = Some(self.config.global_leverage);
        (plan, Some(order))
    }

    fn build_plan(&self, weights: &[(String, f64)], total_equity: Decimal) -> Vec<AllocationPlan> {
        weights
            .iter()
            .filter(|(_, weight)| *weight != 0.0)
            .map(|(strategy_id, weight)| {
                let weight_dec = Decimal::try_from(*weight).unwrap_or_default();
                AllocationPlan {
                    strategy_id: strategy_id.clone(),
                    weight: *weight,
                    target_notional: total_equity * weight_dec * self.config.global_leverage,
                }
            })
            .collect()
    }
}
