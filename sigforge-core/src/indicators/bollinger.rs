//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! middle = SMA(period), upper/lower = middle ± k · stddev(period).
//! Uses population stddev (divide by N). Lookback: period - 1.

use super::sma::{rolling_std, sma};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(series: &[f64], period: usize, k: f64) -> BollingerOutput {
    let middle = sma(series, period);
    let std = rolling_std(series, period);

    let upper = middle.iter().zip(&std).map(|(m, s)| m + k * s).collect();
    let lower = middle.iter().zip(&std).map(|(m, s)| m - k * s).collect();

    BollingerOutput {
        upper,
        middle,
        lower,
    }
}
