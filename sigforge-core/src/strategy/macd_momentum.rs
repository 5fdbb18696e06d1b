//! MACD momentum — MACD line / signal line crossover.
//!
//! BUY when the MACD line moves from not-above to above its signal line,
//! SELL on the opposite move. Confidence = min(0.8, |macd - signal| / |signal|).

use crate::domain::{closes, MarketDataPoint, ParamBound, ParamConstraint};
use crate::indicators::macd;

use super::{common_parameters, SignalDecision, Strategy, StrategyCore, StrategyError, StrategyKind};

pub const FAST_PERIOD: &str = "fast_period";
pub const SLOW_PERIOD: &str = "slow_period";
pub const SIGNAL_PERIOD: &str = "signal_period";

const MAX_CONFIDENCE: f64 = 0.8;
/// Separations below this are EMA rounding noise, not a crossover.
const FLAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct MacdMomentumStrategy {
    core: StrategyCore,
}

impl MacdMomentumStrategy {
    /// Defaults: 12 in [6, 20], 26 in [20, 40], signal 9 in [5, 15].
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), 12, 26, 9)
    }

    /// Explicit periods, checked against the search bounds and `fast < slow`.
    pub fn with_periods(
        name: impl Into<String>,
        fast: usize,
        slow: usize,
        signal: usize,
    ) -> Result<Self, StrategyError> {
        let strategy = Self::build(name.into(), fast, slow, signal);
        strategy.core.params.check()?;
        Ok(strategy)
    }

    fn build(name: String, fast: usize, slow: usize, signal: usize) -> Self {
        let params = common_parameters(&name)
            .with_bounded(FAST_PERIOD, fast as f64, ParamBound::integer(6, 20))
            .with_bounded(SLOW_PERIOD, slow as f64, ParamBound::integer(20, 40))
            .with_bounded(SIGNAL_PERIOD, signal as f64, ParamBound::integer(5, 15))
            .with_constraint(ParamConstraint::less_than(FAST_PERIOD, SLOW_PERIOD));
        Self {
            core: StrategyCore::new(params),
        }
    }

    fn periods(&self) -> (usize, usize, usize) {
        let p = &self.core.params;
        (
            p.get_usize(FAST_PERIOD, 12).max(1),
            p.get_usize(SLOW_PERIOD, 26).max(1),
            p.get_usize(SIGNAL_PERIOD, 9).max(1),
        )
    }
}

impl Strategy for MacdMomentumStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MacdMomentum
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    /// First index with a signal line value is `max(fast, slow) + signal - 2`.
    fn required_history(&self) -> usize {
        let (fast, slow, signal) = self.periods();
        (fast.max(slow) + signal - 1).max(2)
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        _current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        let (fast, slow, signal_period) = self.periods();
        let out = macd(&closes(history), fast, slow, signal_period);

        let n = out.macd.len();
        let (line, signal) = (out.macd[n - 1], out.signal[n - 1]);
        if line.is_nan() || signal.is_nan() {
            return Ok(None);
        }
        // NaN comparisons are false, so an undefined previous bar is neither above nor below.
        let previous = out.macd[n - 2] - out.signal[n - 2];
        let was_above = previous > FLAT_TOLERANCE;
        let was_below = previous < -FLAT_TOLERANCE;

        let separation = (line - signal).abs();
        if separation <= FLAT_TOLERANCE {
            return Ok(None);
        }
        let confidence = if signal.abs() > f64::EPSILON {
            (separation / signal.abs()).min(MAX_CONFIDENCE)
        } else {
            MAX_CONFIDENCE
        };

        let decision = if line > signal && !was_above {
            SignalDecision::buy(confidence)
        } else if line < signal && !was_below {
            SignalDecision::sell(confidence)
        } else {
            return Ok(None);
        };
        Ok(Some(
            decision
                .with_meta("macd", line)
                .with_meta("macd_signal", signal)
                .with_meta("macd_histogram", line - signal),
        ))
    }

    fn boxed_clone(&self) -> Box<dyn Strategy> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalKind;
    use crate::strategy::test_support::replay;
    use crate::strategy::MIN_CONFIDENCE;
    use std::collections::BTreeMap;

    #[test]
    fn required_history_covers_signal_warmup() {
        assert_eq!(MacdMomentumStrategy::new("macd").required_history(), 34);
    }

    #[test]
    fn v_shaped_series_buys_after_trough() {
        let mut closes: Vec<f64> = (0..50).map(|i| 200.0 - 2.0 * i as f64).collect();
        closes.extend((1..40).map(|i| 102.0 + 3.0 * i as f64));
        let mut s = MacdMomentumStrategy::new("macd");
        let mut update = BTreeMap::new();
        update.insert(MIN_CONFIDENCE.to_string(), 0.0);
        s.update_parameters(&update).unwrap();
        let signals = replay(&mut s, &closes);

        let buys: Vec<usize> = signals
            .iter()
            .filter(|(_, s)| s.kind.is_buy_side())
            .map(|(i, _)| *i)
            .collect();
        // The down leg is linear, so MACD sits flat on its signal line until the turn.
        assert_eq!(buys, vec![50]);
        for (_, s) in &signals {
            assert!(s.confidence <= MAX_CONFIDENCE + 1e-12);
            assert!(s.kind != SignalKind::StrongBuy && s.kind != SignalKind::StrongSell);
        }
    }

    #[test]
    fn flat_series_is_silent() {
        let mut s = MacdMomentumStrategy::new("macd");
        assert!(replay(&mut s, &[100.0; 80]).is_empty());
    }

    #[test]
    fn explicit_periods_are_checked() {
        assert!(MacdMomentumStrategy::with_periods("macd", 12, 50, 9).is_err());
        assert!(MacdMomentumStrategy::with_periods("macd", 20, 20, 9).is_err());
        let s = MacdMomentumStrategy::with_periods("macd", 8, 21, 5).unwrap();
        assert_eq!(s.required_history(), 25);
    }
}
