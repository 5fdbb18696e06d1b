//! Indicator library — pure functions over numeric series.
//!
//! Every function takes slices and returns a `Vec<f64>` of the same length.
//! Indices still inside the warm-up window are `NaN`, and a `NaN` input
//! taints every output whose window contains it. No function keeps state, so
//! identical inputs always produce bit-identical outputs.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use adx::adx;
pub use atr::{atr, true_range, wilder_smooth};
pub use bollinger::{bollinger_bands, BollingerOutput};
pub use ema::ema;
pub use macd::{macd, MacdOutput};
pub use rsi::rsi;
pub use sma::{rolling_std, sma};
pub use stochastic::{stochastic, StochasticOutput};

/// Last element of `series` if it is a number.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| !v.is_nan())
}

/// Simple one-step returns: `r[i] = s[i] / s[i-1] - 1`, `r[0] = NaN`.
///
/// A zero previous value yields `NaN` rather than an infinity.
pub fn returns(series: &[f64]) -> Vec<f64> {
    let mut result = vec![f64::NAN; series.len()];
    for i in 1..series.len() {
        let prev = series[i - 1];
        if prev != 0.0 && !prev.is_nan() && !series[i].is_nan() {
            result[i] = series[i] / prev - 1.0;
        }
    }
    result
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
