//! The trading cycle orchestrator: the outer periodic loop that sequences
//! sync-account -> sync-orders -> decide -> allocate -> risk-check -> submit
//! -> (optionally) await-fill. Everything it touches is a trait object, so
//! the same `run_cycle` drives paper trading and the live exchange.

pub mod cycle;
pub mod decision_source;

pub use cycle::{run_cycle, CycleConfig};
pub use decision_source::{DecisionSource, PortfolioDecisionSource, TradingDecision};
