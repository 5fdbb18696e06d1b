//! RSI mean reversion.
//!
//! BUY when RSI <= oversold, confidence rising linearly from 0 at the
//! threshold to 1 at RSI = 0. SELL when RSI >= overbought, confidence rising
//! from 0 at the threshold to 1 at RSI = 100.

use crate::domain::{closes, MarketDataPoint, ParamBound, ParamConstraint};
use crate::indicators::{last_valid, rsi};

use super::{common_parameters, SignalDecision, Strategy, StrategyCore, StrategyError, StrategyKind};

pub const PERIOD: &str = "period";
pub const OVERSOLD: &str = "oversold";
pub const OVERBOUGHT: &str = "overbought";

#[derive(Debug, Clone)]
pub struct RsiMeanReversionStrategy {
    core: StrategyCore,
}

impl RsiMeanReversionStrategy {
    /// Defaults: period 14 in [5, 30], oversold 30 in [15, 40], overbought 70 in [60, 85].
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), 14, 30.0, 70.0)
    }

    /// Explicit period and thresholds, checked against the search bounds.
    pub fn with_thresholds(
        name: impl Into<String>,
        period: usize,
        oversold: f64,
        overbought: f64,
    ) -> Result<Self, StrategyError> {
        let strategy = Self::build(name.into(), period, oversold, overbought);
        strategy.core.params.check()?;
        Ok(strategy)
    }

    fn build(name: String, period: usize, oversold: f64, overbought: f64) -> Self {
        let params = common_parameters(&name)
            .with_bounded(PERIOD, period as f64, ParamBound::integer(5, 30))
            .with_bounded(OVERSOLD, oversold, ParamBound::float(15.0, 40.0))
            .with_bounded(OVERBOUGHT, overbought, ParamBound::float(60.0, 85.0))
            .with_constraint(ParamConstraint::less_than(OVERSOLD, OVERBOUGHT));
        Self {
            core: StrategyCore::new(params),
        }
    }

    fn period(&self) -> usize {
        self.core.params.get_usize(PERIOD, 14).max(1)
    }
}

impl Strategy for RsiMeanReversionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RsiMeanReversion
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn required_history(&self) -> usize {
        self.period() + 1
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        _current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        let value = match last_valid(&rsi(&closes(history), self.period())) {
            Some(v) => v,
            None => return Ok(None),
        };
        let oversold = self.core.params.get_or(OVERSOLD, 30.0);
        let overbought = self.core.params.get_or(OVERBOUGHT, 70.0);

        let decision = if value <= oversold && oversold > 0.0 {
            SignalDecision::buy((oversold - value) / oversold)
        } else if value >= overbought && overbought < 100.0 {
            SignalDecision::sell((value - overbought) / (100.0 - overbought))
        } else {
            return Ok(None);
        };
        Ok(Some(decision.with_meta("rsi", value)))
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

    /// 14 changes: two +1 gains, eight -1 losses, four flat → RSI exactly 20.
    fn dip_to_twenty() -> Vec<f64> {
        let mut closes = vec![100.0, 101.0, 102.0];
        for _ in 0..8 {
            closes.push(closes[closes.len() - 1] - 1.0);
        }
        for _ in 0..4 {
            closes.push(closes[closes.len() - 1]);
        }
        closes
    }

    #[test]
    fn rsi_twenty_buys_with_one_third_confidence() {
        let closes = dip_to_twenty();
        assert_eq!(closes.len(), 15);
        let mut s = RsiMeanReversionStrategy::new("rsi");
        let signals = replay(&mut s, &closes);

        assert_eq!(signals.len(), 1);
        let (index, signal) = &signals[0];
        assert_eq!(*index, 14);
        assert_eq!(signal.kind, SignalKind::Buy);
        assert!((signal.confidence - (30.0 - 20.0) / 30.0).abs() < 1e-9);
        assert!((signal.metadata["rsi"] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn overbought_sells() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let mut s = RsiMeanReversionStrategy::new("rsi");
        let signals = replay(&mut s, &closes);
        // RSI pinned at 100 → full-confidence STRONG_SELL on every evaluation.
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|(_, s)| s.kind == SignalKind::StrongSell));
        assert!(signals.iter().all(|(_, s)| (s.confidence - 1.0).abs() < 1e-12));
    }

    #[test]
    fn neutral_rsi_is_silent() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let mut s = RsiMeanReversionStrategy::new("rsi");
        assert!(replay(&mut s, &closes).is_empty());
    }

    #[test]
    fn short_window_is_silent() {
        let mut s = RsiMeanReversionStrategy::new("rsi");
        let closes = dip_to_twenty();
        assert!(replay(&mut s, &closes[..14]).is_empty());
    }

    #[test]
    fn explicit_thresholds_are_checked() {
        assert!(RsiMeanReversionStrategy::with_thresholds("rsi", 14, 10.0, 70.0).is_err());
        assert!(RsiMeanReversionStrategy::with_thresholds("rsi", 3, 30.0, 70.0).is_err());
        let s = RsiMeanReversionStrategy::with_thresholds("rsi", 7, 25.0, 75.0).unwrap();
        assert_eq!(s.required_history(), 8);
        assert!(s.parameters().is_consistent());
    }
}
