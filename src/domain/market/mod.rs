// Market analysis domain
pub mod candle;
pub mod indicators;
pub mod market_data;
pub mod regime;
pub mod timeframe;
