//! Stochastic oscillator.
//!
//! %K = 100 · (close - lowest_low) / (highest_high - lowest_low) over `k_period`,
//! %D = SMA(%K, d_period). A flat range reports 50.
//! Lookback: k_period - 1 for %K, k_period + d_period - 2 for %D.

use super::sma::sma;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticOutput {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticOutput {
    let n = close.len().min(high.len()).min(low.len());
    let mut k = vec![f64::NAN; n];

    if k_period > 0 && n >= k_period {
        for i in (k_period - 1)..n {
            let start = i + 1 - k_period;
            let highs = &high[start..=i];
            let lows = &low[start..=i];
            if close[i].is_nan() || highs.iter().chain(lows).any(|v| v.is_nan()) {
                continue;
            }
            let hh = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let ll = lows.iter().copied().fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            k[i] = if range <= 0.0 {
                50.0
            } else {
                (100.0 * (close[i] - ll) / range).clamp(0.0, 100.0)
            };
        }
    }

    let d = sma(&k, d_period);
    StochasticOutput { k, d }
}
