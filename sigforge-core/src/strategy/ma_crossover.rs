//! Moving average crossover — golden cross and death cross detection.
//!
//! BUY when the fast MA moves from not-above to above the slow MA between the
//! last two points; SELL on the opposite move. An undefined previous average
//! (still warming up) counts as "not above" / "not below", so the first bar
//! on which both averages exist can already be a crossover.
//!
//! Confidence = min(0.8, |fast - slow| / slow).

use crate::domain::{closes, MarketDataPoint, ParamBound, ParamConstraint};
use crate::indicators::{ema, sma};

use super::{common_parameters, SignalDecision, Strategy, StrategyCore, StrategyError, StrategyKind};

pub const FAST_PERIOD: &str = "fast_period";
pub const SLOW_PERIOD: &str = "slow_period";
pub const MA_TYPE: &str = "ma_type";

const MAX_CONFIDENCE: f64 = 0.8;

/// Moving average type selector, stored as parameter `ma_type` (0 = SMA, 1 = EMA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaType {
    Sma,
    Ema,
}

impl MaType {
    fn from_param(value: f64) -> Self {
        if value >= 0.5 {
            Self::Ema
        } else {
            Self::Sma
        }
    }

    fn as_param(&self) -> f64 {
        match self {
            Self::Sma => 0.0,
            Self::Ema => 1.0,
        }
    }

    fn compute(&self, series: &[f64], period: usize) -> Vec<f64> {
        match self {
            Self::Sma => sma(series, period),
            Self::Ema => ema(series, period),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MovingAverageCrossoverStrategy {
    core: StrategyCore,
}

impl MovingAverageCrossoverStrategy {
    /// Defaults: fast 10 in [3, 30], slow 30 in [10, 100], SMA.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), 10, 30, MaType::Sma)
    }

    /// Explicit periods, checked against the search bounds and `fast < slow`.
    pub fn with_periods(
        name: impl Into<String>,
        fast: usize,
        slow: usize,
        ma_type: MaType,
    ) -> Result<Self, StrategyError> {
        let strategy = Self::build(name.into(), fast, slow, ma_type);
        strategy.core.params.check()?;
        Ok(strategy)
    }

    fn build(name: String, fast: usize, slow: usize, ma_type: MaType) -> Self {
        let params = common_parameters(&name)
            .with_bounded(FAST_PERIOD, fast as f64, ParamBound::integer(3, 30))
            .with_bounded(SLOW_PERIOD, slow as f64, ParamBound::integer(10, 100))
            .with_limited(MA_TYPE, ma_type.as_param(), ParamBound::integer(0, 1))
            .with_constraint(ParamConstraint::less_than(FAST_PERIOD, SLOW_PERIOD));
        Self {
            core: StrategyCore::new(params),
        }
    }

    fn periods(&self) -> (usize, usize) {
        let p = &self.core.params;
        (p.get_usize(FAST_PERIOD, 10).max(1), p.get_usize(SLOW_PERIOD, 30).max(1))
    }

    pub fn ma_type(&self) -> MaType {
        MaType::from_param(self.core.params.get_or(MA_TYPE, 0.0))
    }
}

impl Strategy for MovingAverageCrossoverStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MovingAverageCrossover
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn required_history(&self) -> usize {
        let (fast, slow) = self.periods();
        fast.max(slow).max(2)
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        _current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        let (fast_period, slow_period) = self.periods();
        let ma_type = self.ma_type();
        let series = closes(history);
        let fast = ma_type.compute(&series, fast_period);
        let slow = ma_type.compute(&series, slow_period);

        let n = series.len();
        let (fast_cur, slow_cur) = (fast[n - 1], slow[n - 1]);
        let (fast_prev, slow_prev) = (fast[n - 2], slow[n - 2]);
        if fast_cur.is_nan() || slow_cur.is_nan() || slow_cur == 0.0 {
            return Ok(None);
        }

        // NaN comparisons are false, so an undefined previous bar is neither above nor below.
        let was_above = fast_prev > slow_prev;
        let was_below = fast_prev < slow_prev;

        let confidence = ((fast_cur - slow_cur).abs() / slow_cur.abs()).min(MAX_CONFIDENCE);
        let decision = if fast_cur > slow_cur && !was_above {
            SignalDecision::buy(confidence)
        } else if fast_cur < slow_cur && !was_below {
            SignalDecision::sell(confidence)
        } else {
            return Ok(None);
        };

        Ok(Some(
            decision
                .with_meta("fast_ma", fast_cur)
                .with_meta("slow_ma", slow_cur),
        ))
    }

    fn boxed_clone(&self) -> Box<dyn Strategy> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterError, SignalKind};
    use crate::strategy::test_support::replay;
    use crate::strategy::MIN_CONFIDENCE;
    use std::collections::BTreeMap;

    #[test]
    fn increasing_series_emits_exactly_one_buy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let mut s = MovingAverageCrossoverStrategy::with_periods("ma", 5, 20, MaType::Sma).unwrap();
        let signals = replay(&mut s, &closes);

        assert_eq!(signals.len(), 1, "signals: {signals:?}");
        let (index, signal) = &signals[0];
        assert_eq!(*index, 19);
        assert_eq!(signal.kind, SignalKind::Buy);
        assert!(signal.confidence > 0.0 && signal.confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn reversal_emits_sell() {
        // Up leg to establish fast > slow, then a sharp down leg.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..20).map(|i| 128.0 - 4.0 * i as f64));
        let mut s = MovingAverageCrossoverStrategy::with_periods("ma", 3, 10, MaType::Sma).unwrap();
        let mut update = BTreeMap::new();
        update.insert(MIN_CONFIDENCE.to_string(), 0.0);
        s.update_parameters(&update).unwrap();
        let signals = replay(&mut s, &closes);

        let kinds: Vec<SignalKind> = signals.iter().map(|(_, s)| s.kind).collect();
        assert_eq!(kinds.first(), Some(&SignalKind::Buy));
        assert!(kinds.contains(&SignalKind::Sell));
    }

    #[test]
    fn confidence_is_capped() {
        // Huge jump right as the slow average becomes defined.
        let mut closes = vec![1.0; 9];
        closes.push(1000.0);
        let mut s = MovingAverageCrossoverStrategy::with_periods("ma", 3, 10, MaType::Sma).unwrap();
        let signals = replay(&mut s, &closes);
        assert_eq!(signals.len(), 1);
        assert!((signals[0].1.confidence - MAX_CONFIDENCE).abs() < 1e-12);
    }

    #[test]
    fn ema_variant_also_detects_cross() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let mut s = MovingAverageCrossoverStrategy::with_periods("ma", 5, 20, MaType::Ema).unwrap();
        let signals = replay(&mut s, &closes);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].1.kind, SignalKind::Buy);
    }

    #[test]
    fn flat_series_is_silent() {
        let mut s = MovingAverageCrossoverStrategy::new("ma");
        assert!(replay(&mut s, &[100.0; 80]).is_empty());
    }

    #[test]
    fn required_history_is_slow_period() {
        let s = MovingAverageCrossoverStrategy::with_periods("ma", 5, 20, MaType::Sma).unwrap();
        assert_eq!(s.required_history(), 20);
    }

    #[test]
    fn defaults_are_within_bounds() {
        assert!(MovingAverageCrossoverStrategy::new("ma").parameters().is_consistent());
    }

    #[test]
    fn explicit_periods_are_checked() {
        assert!(matches!(
            MovingAverageCrossoverStrategy::with_periods("ma", 2, 200, MaType::Sma),
            Err(StrategyError::Parameter(ParameterError::OutOfBounds { .. }))
        ));
        assert!(matches!(
            MovingAverageCrossoverStrategy::with_periods("ma", 20, 15, MaType::Sma),
            Err(StrategyError::Parameter(ParameterError::ConstraintViolated(_)))
        ));
        let s = MovingAverageCrossoverStrategy::with_periods("ma", 4, 40, MaType::Ema).unwrap();
        assert_eq!(s.ma_type(), MaType::Ema);
        assert!(s.parameters().is_consistent());
    }
}
