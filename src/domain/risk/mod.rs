// Risk management domain
pub mod manager;
pub mod rules;
