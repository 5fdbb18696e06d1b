//! Strategy contract — the uniform `generate_signal` capability every
//! signal-generation algorithm implements.
//!
//! Implementations supply the raw decision rule (`compute_signal`) and their
//! warm-up length. The provided `generate_signal` wraps it with the shared
//! policy: warm-up guard, confidence clamp, `min_confidence` threshold, HOLD
//! suppression, STRONG upgrade, stop-loss/take-profit levels and the paper
//! trade log.

pub mod bollinger;
pub mod hybrid;
pub mod ma_crossover;
pub mod macd_momentum;
pub mod ml_prediction;
pub mod rsi_reversion;
pub mod tracker;

pub use bollinger::BollingerBandsStrategy;
pub use hybrid::{HybridStrategy, Weighting};
pub use ma_crossover::{MaType, MovingAverageCrossoverStrategy};
pub use macd_momentum::MacdMomentumStrategy;
pub use ml_prediction::MlPredictionStrategy;
pub use rsi_reversion::RsiMeanReversionStrategy;
pub use tracker::{PerformanceSummary, PositionSide, TradeRecord, TradeTracker};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::domain::{
    clamp_unit, MarketDataPoint, ParamBound, ParameterError, PerformanceSnapshot, SignalKind,
    StrategyParameters, TradingSignal,
};
use crate::regression::RegressionError;

// ─── Common parameter keys ───────────────────────────────────────────

pub const MIN_CONFIDENCE: &str = "min_confidence";
pub const STRONG_THRESHOLD: &str = "strong_threshold";
pub const QUANTITY: &str = "quantity";
pub const STOP_LOSS_PCT: &str = "stop_loss_pct";
pub const TAKE_PROFIT_PCT: &str = "take_profit_pct";

/// Parameters every strategy carries in addition to its own.
///
/// None of these are searched; their limits only reject nonsense updates.
pub fn common_parameters(name: &str) -> StrategyParameters {
    StrategyParameters::new(name)
        .with_limited(MIN_CONFIDENCE, 0.05, ParamBound::float(0.0, 1.0))
        .with_limited(STRONG_THRESHOLD, 0.9, ParamBound::float(0.0, 1.0))
        .with_limited(QUANTITY, 1.0, ParamBound::float(0.0, 1e9))
        .with_limited(STOP_LOSS_PCT, 0.02, ParamBound::float(0.0, 1.0))
        .with_limited(TAKE_PROFIT_PCT, 0.04, ParamBound::float(0.0, 10.0))
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("invalid parameters: {0}")]
    Parameter(#[from] ParameterError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("regression model failed: {0}")]
    Model(#[from] RegressionError),
    #[error("duplicate constituent strategy '{0}'")]
    DuplicateConstituent(String),
}

// ─── Strategy kinds ──────────────────────────────────────────────────

/// The closed set of strategy implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    MovingAverageCrossover,
    RsiMeanReversion,
    BollingerBands,
    MacdMomentum,
    MlPrediction,
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        Self::MovingAverageCrossover,
        Self::RsiMeanReversion,
        Self::BollingerBands,
        Self::MacdMomentum,
        Self::MlPrediction,
        Self::Hybrid,
    ];

    /// Stable identifier written to snapshot files.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::MovingAverageCrossover => "MovingAverageCrossoverStrategy",
            Self::RsiMeanReversion => "RSIMeanReversionStrategy",
            Self::BollingerBands => "BollingerBandsStrategy",
            Self::MacdMomentum => "MACDMomentumStrategy",
            Self::MlPrediction => "MLPredictionStrategy",
            Self::Hybrid => "HybridStrategy",
        }
    }

    /// Short identifier used on the command line.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::MovingAverageCrossover => "ma_crossover",
            Self::RsiMeanReversion => "rsi",
            Self::BollingerBands => "bollinger",
            Self::MacdMomentum => "macd",
            Self::MlPrediction => "ml",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_name() == name)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    /// Accepts either the class name or the short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.class_name() == s || k.short_name() == s)
            .ok_or_else(|| format!("unknown strategy: {s}"))
    }
}

// ─── Decision + shared state ─────────────────────────────────────────

/// Raw output of a decision rule before the shared emission policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecision {
    pub kind: SignalKind,
    pub confidence: f64,
    pub metadata: HashMap<String, f64>,
}

impl SignalDecision {
    pub fn buy(confidence: f64) -> Self {
        Self::new(SignalKind::Buy, confidence)
    }

    pub fn sell(confidence: f64) -> Self {
        Self::new(SignalKind::Sell, confidence)
    }

    pub fn new(kind: SignalKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// State shared by every strategy: parameters, enable flag, paper trades.
#[derive(Debug, Clone)]
pub struct StrategyCore {
    pub params: StrategyParameters,
    pub enabled: bool,
    pub tracker: TradeTracker,
}

impl StrategyCore {
    pub fn new(params: StrategyParameters) -> Self {
        Self {
            params,
            enabled: true,
            tracker: TradeTracker::new(),
        }
    }

    /// Turn a raw decision into an emitted signal, or drop it.
    pub fn emit(
        &mut self,
        decision: SignalDecision,
        last: &MarketDataPoint,
        price: f64,
    ) -> Option<TradingSignal> {
        let p = &self.params;
        let confidence = clamp_unit(decision.confidence);
        if decision.kind == SignalKind::Hold || confidence < p.get_or(MIN_CONFIDENCE, 0.0) {
            return None;
        }

        let kind = if confidence >= p.get_or(STRONG_THRESHOLD, f64::INFINITY) {
            decision.kind.strengthened()
        } else {
            decision.kind
        };
        let direction = kind.direction();

        let mut signal = TradingSignal::new(
            last.symbol.clone(),
            kind,
            confidence,
            price,
            last.timestamp,
            p.name.clone(),
        );
        signal.quantity = p.get_or(QUANTITY, 1.0);
        let stop = p.get_or(STOP_LOSS_PCT, 0.0);
        if stop > 0.0 {
            signal.stop_loss = Some(price * (1.0 - direction * stop));
        }
        let target = p.get_or(TAKE_PROFIT_PCT, 0.0);
        if target > 0.0 {
            signal.take_profit = Some(price * (1.0 + direction * target));
        }
        signal.metadata = decision.metadata;

        self.tracker.on_signal(kind, price, last.timestamp);
        Some(signal)
    }
}

// ─── Trait ───────────────────────────────────────────────────────────

/// A signal-generation algorithm.
///
/// Strategies are owned by the engine's registry and are only ever called
/// with the registry lock held, hence `&mut self` on the hot path.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn core(&self) -> &StrategyCore;

    fn core_mut(&mut self) -> &mut StrategyCore;

    /// Minimum window length before `compute_signal` is consulted.
    fn required_history(&self) -> usize;

    /// Decision rule over a window of at least `required_history` points.
    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError>;

    fn boxed_clone(&self) -> Box<dyn Strategy>;

    fn name(&self) -> &str {
        &self.core().params.name
    }

    fn class_name(&self) -> &'static str {
        self.kind().class_name()
    }

    fn parameters(&self) -> &StrategyParameters {
        &self.core().params
    }

    fn parameter_bounds(&self) -> &BTreeMap<String, ParamBound> {
        &self.core().params.bounds
    }

    /// Validate and apply a (possibly partial) parameter update atomically.
    fn update_parameters(&mut self, values: &BTreeMap<String, f64>) -> Result<(), StrategyError> {
        self.core_mut().params.apply(values)?;
        self.on_parameters_changed();
        Ok(())
    }

    /// Hook for strategies holding state derived from parameters.
    fn on_parameters_changed(&mut self) {}

    fn record_performance(&mut self, snapshot: PerformanceSnapshot) {
        self.core_mut().params.performance = Some(snapshot);
    }

    fn is_enabled(&self) -> bool {
        self.core().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.core_mut().enabled = enabled;
    }

    fn performance_summary(&self) -> PerformanceSummary {
        self.core().tracker.summary()
    }

    /// Clear position, trade log and any learned state. Parameters are kept.
    fn reset_state(&mut self) {
        self.core_mut().tracker.reset();
    }

    /// Constituents of a composite strategy with their base weights.
    fn constituents(&self) -> Vec<(&dyn Strategy, f64)> {
        Vec::new()
    }

    /// Weights a composite would apply to each constituent's vote right now.
    fn constituent_weights(&self) -> Vec<(String, f64)> {
        Vec::new()
    }

    /// Evaluate the window ending at the newest point.
    ///
    /// Returns `Ok(None)` when the window is shorter than
    /// `required_history`, when the rule holds, or when confidence falls
    /// below `min_confidence`.
    fn generate_signal(
        &mut self,
        history: &[MarketDataPoint],
        current_price: f64,
    ) -> Result<Option<TradingSignal>, StrategyError> {
        let last = match history.last() {
            Some(last) => last,
            None => return Ok(None),
        };
        if history.len() < self.required_history() {
            return Ok(None);
        }
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(StrategyError::InvalidInput(format!(
                "current price {current_price} is not a positive number"
            )));
        }

        match self.compute_signal(history, current_price)? {
            Some(decision) => Ok(self.core_mut().emit(decision, last, current_price)),
            None => Ok(None),
        }
    }
}

impl Clone for Box<dyn Strategy> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

impl fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name())
            .field("class", &self.class_name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::{synthetic_series, MarketDataPoint};

    /// Feed `closes` one point at a time, as the engine does, collecting signals.
    pub fn replay(
        strategy: &mut dyn super::Strategy,
        closes: &[f64],
    ) -> Vec<(usize, crate::domain::TradingSignal)> {
        let points: Vec<MarketDataPoint> = synthetic_series("TEST", closes);
        let mut out = Vec::new();
        for i in 0..points.len() {
            let window = &points[..=i];
            if let Some(signal) = strategy
                .generate_signal(window, points[i].close)
                .expect("strategy failed")
            {
                out.push((i, signal));
            }
        }
        out
    }
}
