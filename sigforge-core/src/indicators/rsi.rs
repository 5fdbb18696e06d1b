//! Relative Strength Index (RSI).
//!
//! Trailing-window form: over the last `period` price changes,
//! RSI = 100 - 100 / (1 + mean_gain / mean_loss).
//! Lookback: period (needs period + 1 values).
//! Edge cases: no movement at all → 50; loss == 0 → 100; gain == 0 → 0.

pub fn rsi(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    for i in period..n {
        let window = &series[(i - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }

        let mut gain = 0.0;
        let mut loss = 0.0;
        for pair in window.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gain += change;
            } else {
                loss -= change;
            }
        }
        result[i] = rsi_value(gain / period as f64, loss / period as f64);
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_all_gains() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3);
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let result = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_is_neutral() {
        let result = rsi(&[100.0; 6], 3);
        assert_approx(result[5], 50.0, 1e-12);
    }

    #[test]
    fn rsi_mixed_known_value() {
        // Changes over the window: +0.34, -0.25, -0.48
        // gain = 0.34, loss = 0.73 → RSI = 100 - 100 / (1 + 0.34/0.73)
        let result = rsi(&[44.0, 44.34, 44.09, 43.61], 3);
        assert!(result[2].is_nan());
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(result[3], expected, 1e-9);
    }

    #[test]
    fn rsi_one_to_four_ratio_is_twenty() {
        // One +1 gain against four -1 losses.
        let result = rsi(&[10.0, 11.0, 10.0, 9.0, 8.0, 7.0], 5);
        assert_approx(result[5], 20.0, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let result = rsi(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0], 3);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn rsi_nan_only_taints_its_windows() {
        let result = rsi(&[100.0, 101.0, f64::NAN, 103.0, 104.0, 105.0, 106.0], 3);
        assert!(result[3].is_nan());
        assert!(result[5].is_nan());
        assert_approx(result[6], 100.0, 1e-9);
    }
}
