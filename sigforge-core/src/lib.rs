//! Sigforge Core — market data types, indicators, strategies and the
//! regression backend.
//!
//! This crate is free of threads and I/O:
//! - Domain types (market data points, trading signals, strategy parameters)
//! - Indicator library over plain `f64` series with NaN warm-up
//! - The `Strategy` contract with six implementations, including the
//!   regression-driven and consensus strategies
//! - Factory and persisted record form for strategies
//! - Deterministic RNG hierarchy used by parameter search

pub mod domain;
pub mod factory;
pub mod indicators;
pub mod regression;
pub mod rng;
pub mod strategy;
