use rust_decimal::Decimal;

/// Everything a risk rule needs to know about a prospective order.
#[derive(Debug, Clone)]
pub struct RiskCheckRequest {
    pub symbol: String,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub leverage: Option<Decimal>,
    pub signal_ok: bool,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub max_notional: Decimal,
    pub max_leverage: Decimal,
    pub min_confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskVerdict {
    Approve,
    Deny(String),
}

/// One link in the rule chain. Rules are pure and synchronous: they read the
/// request and config and return a verdict, nothing else.
pub trait RiskRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, request: &RiskCheckRequest, config: &RiskConfig) -> RiskVerdict;
}

/// `price * quantity <= max_notional`; denies when price is missing, since a
/// notional bound can't be verified without one.
pub struct MaxNotionalRule;

impl RiskRule for MaxNotionalRule {
    fn name(&self) -> &'static str {
        "max_notional"
    }

    fn check(&self, request: &RiskCheckRequest, config: &RiskConfig) -> RiskVerdict {
        match request.price {
            None => RiskVerdict::Deny("price missing, cannot verify notional".to_string()),
            Some(price) => {
                let notional = price * request.quantity;
                if notional > config.max_notional {
                    RiskVerdict::Deny(format!(
                        "notional {notional} exceeds max_notional {}",
                        config.max_notional
                    ))
                } else {
                    RiskVerdict::Approve
                }
            }
        }
    }
}

/// `leverage <= max_leverage` when leverage is supplied; absent leverage is approved.
pub struct MaxLeverageRule;

impl RiskRule for MaxLeverageRule {
    fn name(&self) -> &'static str {
        "max_leverage"
    }

    fn check(&self, request: &RiskCheckRequest, config: &RiskConfig) -> RiskVerdict {
        match request.leverage {
            Some(leverage) if leverage > config.max_leverage => RiskVerdict::Deny(format!(
                "leverage {leverage} exceeds max_leverage {}",
                config.max_leverage
            )),
            _ => RiskVerdict::Approve,
        }
    }
}

/// Denies when the upstream decision signal is unreliable: not confirmed, or
/// confidence below the configured floor.
pub struct CircuitBreakerRule;

impl RiskRule for CircuitBreakerRule {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn check(&self, request: &RiskCheckRequest, config: &RiskConfig) -> RiskVerdict {
        if !request.signal_ok {
            return RiskVerdict::Deny("signal not confirmed".to_string());
        }
        if let Some(confidence) = request.confidence {
            if confidence < config.min_confidence {
                return RiskVerdict::Deny(format!(
                    "confidence {confidence} below min_confidence {}",
                    config.min_confidence
                ));
            }
        }
        RiskVerdict::Approve
    }
}
