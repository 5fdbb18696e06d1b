//! MarketDataPoint — one price/volume observation for a single symbol.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLCV observation for a single symbol at a single instant.
///
/// Points are immutable once created; the engine appends them to a bounded
/// per-symbol history and strategies only ever read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Free-form numeric attributes supplied by the feed (bid/ask, vwap, ...).
    #[serde(default)]
    pub metadata: HashMap<String, f64>,
}

impl MarketDataPoint {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            metadata: HashMap::new(),
        }
    }

    /// Point whose OHLC are all `price`. Used by replayers that only see trades.
    pub fn from_price(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: f64,
        volume: f64,
    ) -> Self {
        Self::new(symbol, timestamp, price, price, price, price, volume)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Basic sanity check: finite positive close, finite non-negative volume,
    /// `high >= low`.
    pub fn is_valid(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite();
        finite && self.close > 0.0 && self.volume >= 0.0 && self.high >= self.low
    }
}

/// Close prices of a window, oldest first.
pub fn closes(points: &[MarketDataPoint]) -> Vec<f64> {
    points.iter().map(|p| p.close).collect()
}

/// Build a synthetic point series from close prices, one minute apart.
///
/// high = close + 0.5, low = close - 0.5, volume = 1000. Intended for tests,
/// benches and the CLI's synthetic mode.
pub fn synthetic_series(symbol: &str, closes: &[f64]) -> Vec<MarketDataPoint> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).single().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            MarketDataPoint::new(
                symbol,
                base + chrono::Duration::minutes(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1000.0,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point() -> MarketDataPoint {
        MarketDataPoint::new(
            "BTCUSD",
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            100.0,
            105.0,
            98.0,
            103.0,
            50_000.0,
        )
    }

    #[test]
    fn point_is_valid() {
        assert!(sample_point().is_valid());
    }

    #[test]
    fn nan_close_is_invalid() {
        let mut p = sample_point();
        p.close = f64::NAN;
        assert!(!p.is_valid());
    }

    #[test]
    fn inverted_range_is_invalid() {
        let mut p = sample_point();
        p.high = 90.0;
        assert!(!p.is_valid());
    }

    #[test]
    fn zero_close_is_invalid() {
        let mut p = sample_point();
        p.close = 0.0;
        assert!(!p.is_valid());
    }

    #[test]
    fn serialization_roundtrip() {
        let p = sample_point().with_metadata("vwap", 101.5);
        let json = serde_json::to_string(&p).unwrap();
        let back: MarketDataPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn synthetic_series_is_chronological() {
        let series = synthetic_series("TEST", &[1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(closes(&series), vec![1.0, 2.0, 3.0]);
        assert!(series.iter().all(MarketDataPoint::is_valid));
    }
}
