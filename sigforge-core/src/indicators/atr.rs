//! Average True Range (ATR) and the Wilder smoothing it is built on.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the Wilder-smoothed TR (alpha = 1/period). Lookback: period.

/// TR series. TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len().min(high.len()).min(low.len());
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    tr[0] = high[0] - low[0];
    for i in 1..n {
        let (h, l, pc) = (high[i], low[i], close[i - 1]);
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            continue;
        }
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }

    tr
}

/// Wilder smoothing, alpha = 1/period.
///
/// Seeds with the mean of the first run of `period` consecutive valid values;
/// a later NaN taints the rest of the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let seed_start = (0..=(n - period)).find(|&s| values[s..s + period].iter().all(|v| !v.is_nan()));
    let seed_start = match seed_start {
        Some(s) => s,
        None => return result,
    };
    let seed_end = seed_start + period;

    let seed = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let mut tr = true_range(high, low, close);
    // TR[0] is only high-low; seed from TR[1] so the lookback is exactly `period`.
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    wilder_smooth(&tr, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let high = [105.0, 108.0, 107.0];
        let low = [95.0, 100.0, 98.0];
        let close = [102.0, 106.0, 99.0];
        let tr = true_range(&high, &low, &close);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let tr = true_range(&[102.0, 115.0], &[97.0, 108.0], &[100.0, 112.0]);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_2() {
        // TR = [10, 8, 9, 4]; seed at index 2 = mean(8, 9) = 8.5
        // ATR[3] = 0.5 * 4 + 0.5 * 8.5 = 6.25
        let high = [105.0, 108.0, 107.0, 101.0];
        let low = [95.0, 100.0, 98.0, 97.0];
        let close = [102.0, 106.0, 99.0, 100.0];
        let result = atr(&high, &low, &close, 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 8.5, DEFAULT_EPSILON);
        assert_approx(result[3], 6.25, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_skips_leading_nan() {
        let result = wilder_smooth(&[f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
        assert_approx(result[3], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_too_short() {
        assert!(wilder_smooth(&[1.0], 3).iter().all(|v| v.is_nan()));
    }
}
