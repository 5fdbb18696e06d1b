//! MACD — Moving Average Convergence/Divergence.
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(line, signal_period),
//! histogram = line - signal.
//! Lookback: slow - 1 for the line, slow + signal - 2 for signal and histogram.

use super::ema::ema;

/// The three MACD series, each the length of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(series: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdOutput {
    let fast_ema = ema(series, fast);
    let slow_ema = ema(series, slow);

    // NaN - x is NaN, so the warm-up prefix carries through.
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdOutput {
        macd: line,
        signal,
        histogram,
    }
}
