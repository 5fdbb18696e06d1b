//! Sigforge Runner — engine orchestration on top of `sigforge-core`.
//!
//! This crate provides:
//! - Trade-return performance metrics and fitness selection
//! - Grid and random parameter search with parallel evaluation
//! - The signal engine: symbol buffers, strategy registry, callbacks
//! - Background optimization scheduler with bounded shutdown
//! - Versioned JSON snapshots of strategy state
//! - TOML configuration and tracing subscriber setup

pub mod config;
pub mod engine;
pub mod fitness;
pub mod logging;
pub mod metrics;
pub mod optimizer;
pub mod persistence;
pub mod scheduler;

pub use config::{ConfigError, EngineConfig};
pub use engine::{
    AppliedOptimization, EngineError, EngineStatus, SignalCallback, SignalEngine, StrategyStatus,
    SymbolBuffer, SymbolState, SymbolStatus,
};
pub use fitness::FitnessMetric;
pub use logging::{init_logging, LogConfig, LogFormat, LoggingError};
pub use metrics::PerformanceMetrics;
pub use optimizer::{
    backtest, Candidate, OptimizationResult, OptimizerConfig, SearchMethod, StrategyOptimizer,
};
pub use persistence::{PersistenceError, Snapshot, SNAPSHOT_VERSION};
pub use scheduler::Scheduler;
