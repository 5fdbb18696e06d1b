//! Simple Moving Average and rolling (population) standard deviation.
//!
//! Lookback: period - 1 (first valid value at index period-1).

/// Rolling mean over `period` values.
pub fn sma(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_in_window = false;
    for &v in series.iter().take(period) {
        if v.is_nan() {
            nan_in_window = true;
        }
        sum += v;
    }
    if !nan_in_window {
        result[period - 1] = sum / period as f64;
    }

    for i in period..n {
        let leaving = series[i - period];
        let entering = series[i];
        sum = sum - leaving + entering;

        // A NaN poisons the running sum; rescan the window until it leaves.
        if entering.is_nan() || leaving.is_nan() || nan_in_window {
            let window = &series[(i + 1 - period)..=i];
            nan_in_window = window.iter().any(|v| v.is_nan());
            if nan_in_window {
                continue;
            }
            sum = window.iter().sum();
        }

        result[i] = sum / period as f64;
    }

    result
}

/// Rolling population standard deviation (divide by N) over `period` values.
pub fn rolling_std(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &series[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        result[i] = var.sqrt();
    }

    result
}
