//! ADX — Average Directional Index (Wilder).
//!
//! 1. +DM / -DM from consecutive bars
//! 2. Wilder-smooth +DM, -DM and TR
//! 3. +DI, -DI = 100 · smoothed DM / smoothed TR
//! 4. DX = 100 · |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! First value at index 2 · period - 1.

use super::atr::{true_range, wilder_smooth};

pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len().min(high.len()).min(low.len());

    if n < 2 {
        return vec![f64::NAN; n];
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        if high[i].is_nan() || low[i].is_nan() || high[i - 1].is_nan() || low[i - 1].is_nan() {
            continue;
        }
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let mut tr = true_range(high, low, close);
    tr[0] = f64::NAN;
    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan()
            || smooth_plus[i].is_nan()
            || smooth_minus[i].is_nan()
            || smooth_tr[i] == 0.0
        {
            continue;
        }
        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    wilder_smooth(&dx, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(data: &[(f64, f64, f64)]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            data.iter().map(|d| d.0).collect(),
            data.iter().map(|d| d.1).collect(),
            data.iter().map(|d| d.2).collect(),
        )
    }

    #[test]
    fn adx_bounds() {
        let (h, l, c) = columns(&[
            (105.0, 95.0, 102.0),
            (108.0, 100.0, 106.0),
            (107.0, 98.0, 99.0),
            (103.0, 97.0, 101.0),
            (106.0, 100.0, 105.0),
            (110.0, 103.0, 108.0),
            (112.0, 106.0, 110.0),
            (111.0, 104.0, 105.0),
            (109.0, 103.0, 107.0),
            (113.0, 105.0, 112.0),
        ]);
        let result = adx(&h, &l, &c, 3);
        assert!(result.iter().any(|v| !v.is_nan()));
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn adx_strong_trend_is_elevated() {
        let data: Vec<(f64, f64, f64)> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 5.0;
                (base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        let (h, l, c) = columns(&data);
        let result = adx(&h, &l, &c, 5);
        let last = result.iter().rev().find(|v| !v.is_nan()).copied();
        assert!(matches!(last, Some(v) if v > 10.0), "got {last:?}");
    }

    #[test]
    fn adx_lookback_is_two_periods() {
        let data: Vec<(f64, f64, f64)> = (0..12)
            .map(|i| (101.0 + i as f64, 99.0 + i as f64, 100.0 + i as f64))
            .collect();
        let (h, l, c) = columns(&data);
        let result = adx(&h, &l, &c, 3);
        // DM/TR seed at index 3, DX from 3, ADX seed at 3 + 2 = 5
        assert!(result[4].is_nan());
        assert!(!result[5].is_nan());
    }

    #[test]
    fn adx_too_few_values() {
        let result = adx(&[105.0], &[95.0], &[102.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
