//! Domain types shared by strategies, the optimizer and the engine.

pub mod market_data;
pub mod parameters;
pub mod signal;

pub use market_data::{closes, synthetic_series, MarketDataPoint};
pub use parameters::{
    ParamBound, ParamConstraint, ParameterError, PerformanceSnapshot, StrategyParameters,
};
pub use signal::{clamp_unit, SignalKind, TradingSignal};
