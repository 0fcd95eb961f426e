//! Concrete OKX v5 REST adapter for `domain::exchange::ExchangeGateway`.

pub mod client;
pub mod signing;

pub use client::OkxGateway;
