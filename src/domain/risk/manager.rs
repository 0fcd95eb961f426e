use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::risk::rules::{
    CircuitBreakerRule, MaxLeverageRule, MaxNotionalRule, RiskCheckRequest, RiskConfig, RiskRule,
    RiskVerdict,
};

/// Sink the risk manager records a `risk_events` row through on denial. The
/// Store implements this; tests can stub it.
#[async_trait]
pub trait RiskEventSink: Send + Sync {
    async fn record_risk_event(&self, symbol: &str, ts_s: i64, level: &str, rule: &str, details: &str) -> anyhow::Result<()>;
}

/// Outcome of a risk check: `(ok, reason, rule_name)` per the rule chain's contract.
#[derive(Debug, Clone)]
pub struct RiskOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub rule_name: Option<&'static str>,
}

/// Evaluates rules in order; the first denial short-circuits the chain.
pub struct RiskManager {
    rules: Vec<Box<dyn RiskRule>>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self {
            rules: vec![Box::new(MaxNotionalRule), Box::new(MaxLeverageRule), Box::new(CircuitBreakerRule)],
        }
    }
}

impl RiskManager {
    pub fn new(rules: Vec<Box<dyn RiskRule>>) -> Self {
        Self { rules }
    }

    pub fn check(&self, request: &RiskCheckRequest, config: &RiskConfig) -> RiskOutcome {
        for rule in &self.rules {
            if let RiskVerdict::Deny(reason) = rule.check(request, config) {
                return RiskOutcome { ok: false, reason: Some(reason), rule_name: Some(rule.name()) };
            }
        }
        RiskOutcome { ok: true, reason: None, rule_name: None }
    }

    /// Runs the chain and, on denial, persists a `risk_events` row through `sink`.
    pub async fn check_and_record(
        &self,
        request: &RiskCheckRequest,
        config: &RiskConfig,
        sink: &dyn RiskEventSink,
        now_s: i64,
    ) -> anyhow::Result<RiskOutcome> {
        let outcome = self.check(request, config);
        if outcome.ok {
            info!(symbol = %request.symbol, "risk check passed");
        } else {
            let reason = outcome.reason.clone().unwrap_or_default();
            let rule = outcome.rule_name.unwrap_or("unknown");
            warn!(symbol = %request.symbol, rule, %reason, "risk check denied");
            sink.record_risk_event(&request.symbol, now_s, "DENY", rule, &reason).await?;
        }
        Ok(outcome)
    }
}
