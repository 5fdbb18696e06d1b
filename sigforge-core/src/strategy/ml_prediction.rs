//! Regression-driven forward-return prediction.
//!
//! Keeps its own rolling training buffer (≤ 1000 points). Each call ingests
//! the newest point, refits when unfitted or after `retrain_frequency` new
//! points, then predicts the forward return over `prediction_horizon` bars
//! from a 10-feature vector:
//!
//! | # | feature |
//! |---|---------|
//! | 0 | last price |
//! | 1 | 1-bar return |
//! | 2 | 10-bar return volatility |
//! | 3 | position within the 20-bar range |
//! | 4 | deviation from SMA(20) |
//! | 5 | RSI(14) / 100 |
//! | 6 | volume |
//! | 7 | 5-bar mean volume |
//! | 8 | hour of day |
//! | 9 | day of week |
//!
//! Predicted return above `return_threshold` → BUY, below its negative →
//! SELL, confidence = min(0.9, 10 · |predicted|). Builds without a
//! regression backend never signal.

use chrono::{Datelike, Timelike};
use std::collections::VecDeque;
use tracing::debug;

use crate::domain::{closes, MarketDataPoint, ParamBound};
use crate::indicators::{returns, rolling_std, rsi, sma};
use crate::regression::{default_regressor, Regressor, StandardScaler};

use super::{common_parameters, SignalDecision, Strategy, StrategyCore, StrategyError, StrategyKind};

pub const RETRAIN_FREQUENCY: &str = "retrain_frequency";
pub const PREDICTION_HORIZON: &str = "prediction_horizon";
pub const RETURN_THRESHOLD: &str = "return_threshold";
pub const RIDGE_ALPHA: &str = "ridge_alpha";

pub const TRAINING_CAPACITY: usize = 1000;
pub const MIN_TRAINING_PAIRS: usize = 10;
/// Points needed before the first complete feature row.
pub const FEATURE_WARMUP: usize = 20;
pub const FEATURE_COUNT: usize = 10;

const MAX_CONFIDENCE: f64 = 0.9;
const CONFIDENCE_SCALE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct MlPredictionStrategy {
    core: StrategyCore,
    buffer: VecDeque<MarketDataPoint>,
    model: Option<Box<dyn Regressor>>,
    scaler: Option<StandardScaler>,
    points_since_fit: usize,
    backend_reported: bool,
}

impl MlPredictionStrategy {
    /// Defaults: retrain every 20 points in [10, 100], horizon 5 in [1, 10].
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let params = common_parameters(&name)
            .with_bounded(RETRAIN_FREQUENCY, 20.0, ParamBound::integer(10, 100))
            .with_bounded(PREDICTION_HORIZON, 5.0, ParamBound::integer(1, 10))
            .with_limited(RETURN_THRESHOLD, 0.01, ParamBound::float(0.0, 1.0))
            .with_limited(RIDGE_ALPHA, 1.0, ParamBound::float(0.0, 1e6));
        let model = default_regressor(params.get_or(RIDGE_ALPHA, 1.0));
        Self {
            core: StrategyCore::new(params),
            buffer: VecDeque::with_capacity(TRAINING_CAPACITY),
            model,
            scaler: None,
            points_since_fit: 0,
            backend_reported: false,
        }
    }

    /// Replace the regression backend (or remove it with `None`).
    pub fn with_regressor(mut self, model: Option<Box<dyn Regressor>>) -> Self {
        self.model = model;
        self.scaler = None;
        self
    }

    pub fn has_backend(&self) -> bool {
        self.model.is_some()
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn training_len(&self) -> usize {
        self.buffer.len()
    }

    fn horizon(&self) -> usize {
        self.core.params.get_usize(PREDICTION_HORIZON, 5).max(1)
    }

    fn ingest(&mut self, history: &[MarketDataPoint]) {
        if self.buffer.is_empty() {
            let start = history.len().saturating_sub(TRAINING_CAPACITY);
            self.buffer.extend(history[start..].iter().cloned());
            return;
        }
        let Some(latest) = history.last() else {
            return;
        };
        let seen = self
            .buffer
            .back()
            .is_some_and(|b| b.timestamp == latest.timestamp && b.symbol == latest.symbol);
        if seen {
            return;
        }
        if self.buffer.len() == TRAINING_CAPACITY {
            self.buffer.pop_front();
        }
        self.buffer.push_back(latest.clone());
        self.points_since_fit += 1;
    }

    /// Refit on the buffer. Returns false when there are too few pairs.
    fn train(&mut self, rows: &[Option<Vec<f64>>], closes: &[f64]) -> Result<bool, StrategyError> {
        let horizon = self.horizon();
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..closes.len().saturating_sub(horizon) {
            if let Some(row) = &rows[i] {
                x.push(row.clone());
                y.push(closes[i + horizon] / closes[i] - 1.0);
            }
        }
        if x.len() < MIN_TRAINING_PAIRS {
            debug!(
                strategy = %self.core.params.name,
                pairs = x.len(),
                "not enough training pairs, skipping fit"
            );
            return Ok(false);
        }

        let scaler = StandardScaler::fit(&x)?;
        let scaled = x
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(model) = self.model.as_mut() {
            model.fit(&scaled, &y)?;
        }
        self.scaler = Some(scaler);
        self.points_since_fit = 0;
        debug!(strategy = %self.core.params.name, pairs = x.len(), "model refitted");
        Ok(true)
    }
}

/// Feature rows for every point; `None` until all inputs are defined.
pub fn feature_rows(points: &[MarketDataPoint]) -> Vec<Option<Vec<f64>>> {
    let closes = closes(points);
    let volumes: Vec<f64> = points.iter().map(|p| p.volume).collect();
    let one_bar = returns(&closes);
    let volatility = rolling_std(&one_bar, 10);
    let sma20 = sma(&closes, 20);
    let rsi14 = rsi(&closes, 14);
    let volume5 = sma(&volumes, 5);

    (0..points.len())
        .map(|i| {
            if i + 1 < FEATURE_WARMUP {
                return None;
            }
            let window = &closes[(i + 1 - FEATURE_WARMUP)..=i];
            let hi = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lo = window.iter().copied().fold(f64::INFINITY, f64::min);
            let range_position = if hi > lo {
                (closes[i] - lo) / (hi - lo)
            } else {
                0.5
            };
            let row = vec![
                closes[i],
                one_bar[i],
                volatility[i],
                range_position,
                closes[i] / sma20[i] - 1.0,
                rsi14[i] / 100.0,
                volumes[i],
                volume5[i],
                points[i].timestamp.hour() as f64,
                points[i].timestamp.weekday().num_days_from_monday() as f64,
            ];
            row.iter().all(|v| v.is_finite()).then_some(row)
        })
        .collect()
}

impl Strategy for MlPredictionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MlPrediction
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn required_history(&self) -> usize {
        FEATURE_WARMUP
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        _current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        if self.model.is_none() {
            if !self.backend_reported {
                debug!(strategy = %self.core.params.name, "no regression backend compiled in");
                self.backend_reported = true;
            }
            return Ok(None);
        }

        self.ingest(history);
        let points = self.buffer.make_contiguous().to_vec();
        let rows = feature_rows(&points);
        let closes = closes(&points);

        let retrain_every = self.core.params.get_usize(RETRAIN_FREQUENCY, 20).max(1);
        if (!self.is_fitted() || self.points_since_fit >= retrain_every)
            && !self.train(&rows, &closes)?
            && !self.is_fitted()
        {
            return Ok(None);
        }

        let (Some(scaler), Some(model)) = (self.scaler.as_ref(), self.model.as_ref()) else {
            return Ok(None);
        };
        let current = match rows.last() {
            Some(Some(row)) => row,
            _ => return Ok(None),
        };
        let predicted = model.predict(&scaler.transform(current)?)?;
        if !predicted.is_finite() {
            return Err(StrategyError::InvalidInput(format!(
                "model predicted non-finite return {predicted}"
            )));
        }

        let threshold = self.core.params.get_or(RETURN_THRESHOLD, 0.01);
        let confidence = (CONFIDENCE_SCALE * predicted.abs()).min(MAX_CONFIDENCE);
        let decision = if predicted > threshold {
            SignalDecision::buy(confidence)
        } else if predicted < -threshold {
            SignalDecision::sell(confidence)
        } else {
            return Ok(None);
        };
        Ok(Some(decision.with_meta("predicted_return", predicted)))
    }

    fn on_parameters_changed(&mut self) {
        // Labels depend on the horizon; force a refit on the next call.
        self.scaler = None;
        if self.model.as_ref().is_some_and(|m| m.name() == "ridge") {
            let alpha = self.core.params.get_or(RIDGE_ALPHA, 1.0);
            if let Some(model) = default_regressor(alpha) {
                self.model = Some(model);
            }
        }
    }

    fn reset_state(&mut self) {
        self.core.tracker.reset();
        self.buffer.clear();
        self.scaler = None;
        self.points_since_fit = 0;
    }

    fn boxed_clone(&self) -> Box<dyn Strategy> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{synthetic_series, SignalKind};
    use crate::strategy::test_support::replay;

    fn geometric(n: usize, growth: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 * growth.powi(i as i32)).collect()
    }

    #[test]
    fn feature_rows_start_after_warmup() {
        let points = synthetic_series("TEST", &geometric(25, 1.01));
        let rows = feature_rows(&points);
        assert!(rows[18].is_none());
        let row = rows[19].as_ref().unwrap();
        assert_eq!(row.len(), FEATURE_COUNT);
        assert!((row[1] - 0.01).abs() < 1e-9);
        assert!((row[3] - 1.0).abs() < 1e-12);
        assert!((row[5] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn short_training_buffer_is_silent() {
        let mut s = MlPredictionStrategy::new("ml");
        let points = synthetic_series("TEST", &geometric(25, 1.01));
        assert!(s.generate_signal(&points, points[24].close).unwrap().is_none());
        assert!(!s.is_fitted());
    }

    #[test]
    fn repeated_point_is_ingested_once() {
        let mut s = MlPredictionStrategy::new("ml");
        let points = synthetic_series("TEST", &geometric(21, 1.01));
        s.generate_signal(&points[..20], 100.0).unwrap();
        s.generate_signal(&points, 100.0).unwrap();
        s.generate_signal(&points, 100.0).unwrap();
        assert_eq!(s.training_len(), 21);
    }

    #[test]
    fn training_buffer_is_capped() {
        let mut s = MlPredictionStrategy::new("ml").with_regressor(Some(Box::new(NeverFit)));
        let points = synthetic_series("TEST", &geometric(1100, 1.0001));
        for i in 19..points.len() {
            let _ = s.generate_signal(&points[..=i], points[i].close);
        }
        assert_eq!(s.training_len(), TRAINING_CAPACITY);
    }

    #[test]
    fn missing_backend_never_signals() {
        let mut s = MlPredictionStrategy::new("ml").with_regressor(None);
        assert!(replay(&mut s, &geometric(80, 1.01)).is_empty());
        assert_eq!(s.training_len(), 0);
    }

    #[cfg(feature = "ml")]
    #[test]
    fn persistent_uptrend_predicts_buy() {
        let mut s = MlPredictionStrategy::new("ml");
        let signals = replay(&mut s, &geometric(60, 1.01));

        assert!(!signals.is_empty());
        // 20 seeded points + 14 appended → 10 labelled pairs at horizon 5.
        assert_eq!(signals[0].0, 33);
        let expected = 1.01f64.powi(5) - 1.0;
        for (_, sig) in &signals {
            assert_eq!(sig.kind, SignalKind::Buy);
            assert!((sig.metadata["predicted_return"] - expected).abs() < 1e-6);
            assert!((sig.confidence - 10.0 * expected).abs() < 1e-5);
        }
    }

    #[cfg(feature = "ml")]
    #[test]
    fn persistent_downtrend_predicts_sell() {
        let mut s = MlPredictionStrategy::new("ml");
        let signals = replay(&mut s, &geometric(60, 0.99));
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|(_, s)| s.kind == SignalKind::Sell));
    }

    #[cfg(feature = "ml")]
    #[test]
    fn reset_and_parameter_change_drop_the_fit() {
        let mut s = MlPredictionStrategy::new("ml");
        replay(&mut s, &geometric(40, 1.01));
        assert!(s.is_fitted());

        let mut update = std::collections::BTreeMap::new();
        update.insert(PREDICTION_HORIZON.to_string(), 3.0);
        s.update_parameters(&update).unwrap();
        assert!(!s.is_fitted());

        s.reset_state();
        assert_eq!(s.training_len(), 0);
    }

    /// Backend that always fails to fit.
    #[derive(Clone)]
    struct NeverFit;

    impl Regressor for NeverFit {
        fn name(&self) -> &str {
            "never"
        }
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[f64]) -> Result<(), crate::regression::RegressionError> {
            Err(crate::regression::RegressionError::Singular)
        }
        fn predict(&self, _x: &[f64]) -> Result<f64, crate::regression::RegressionError> {
            Err(crate::regression::RegressionError::NotFitted)
        }
        fn boxed_clone(&self) -> Box<dyn Regressor> {
            Box::new(self.clone())
        }
    }
}
