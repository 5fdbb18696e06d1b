//! Bollinger Bands mean reversion.
//!
//! BUY when price <= lower band, SELL when price >= upper band. Confidence is
//! the penetration depth divided by the band half-width (upper - middle).
//! Zero-width bands never signal.

use crate::domain::{closes, MarketDataPoint, ParamBound};
use crate::indicators::{bollinger_bands, last_valid};

use super::{common_parameters, SignalDecision, Strategy, StrategyCore, StrategyError, StrategyKind};

pub const PERIOD: &str = "period";
pub const STD_DEV: &str = "std_dev";

#[derive(Debug, Clone)]
pub struct BollingerBandsStrategy {
    core: StrategyCore,
}

impl BollingerBandsStrategy {
    /// Defaults: period 20 in [10, 50], std_dev 2.0 in [1.0, 3.0].
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), 20, 2.0)
    }

    /// Explicit band shape, checked against the search bounds.
    pub fn with_bands(
        name: impl Into<String>,
        period: usize,
        std_dev: f64,
    ) -> Result<Self, StrategyError> {
        let strategy = Self::build(name.into(), period, std_dev);
        strategy.core.params.check()?;
        Ok(strategy)
    }

    fn build(name: String, period: usize, std_dev: f64) -> Self {
        let params = common_parameters(&name)
            .with_bounded(PERIOD, period as f64, ParamBound::integer(10, 50))
            .with_bounded(STD_DEV, std_dev, ParamBound::float(1.0, 3.0));
        Self {
            core: StrategyCore::new(params),
        }
    }

    fn period(&self) -> usize {
        self.core.params.get_usize(PERIOD, 20).max(1)
    }
}

impl Strategy for BollingerBandsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BollingerBands
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn required_history(&self) -> usize {
        self.period()
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        let k = self.core.params.get_or(STD_DEV, 2.0);
        let bands = bollinger_bands(&closes(history), self.period(), k);
        let (upper, middle, lower) = match (
            last_valid(&bands.upper),
            last_valid(&bands.middle),
            last_valid(&bands.lower),
        ) {
            (Some(u), Some(m), Some(l)) => (u, m, l),
            _ => return Ok(None),
        };

        let half_width = upper - middle;
        if half_width <= 0.0 {
            return Ok(None);
        }

        let decision = if current_price <= lower {
            SignalDecision::buy((lower - current_price) / half_width)
        } else if current_price >= upper {
            SignalDecision::sell((current_price - upper) / half_width)
        } else {
            return Ok(None);
        };
        Ok(Some(
            decision
                .with_meta("upper_band", upper)
                .with_meta("middle_band", middle)
                .with_meta("lower_band", lower),
        ))
    }

    fn boxed_clone(&self) -> Box<dyn Strategy> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{synthetic_series, SignalKind};

    fn oscillating(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn price_below_lower_band_buys() {
        // Bands over ±1 oscillation: middle ~100, std ~1, lower ~98.
        let points = synthetic_series("TEST", &oscillating(20));
        let mut s = BollingerBandsStrategy::new("bb");
        let sig = s.generate_signal(&points, 97.0).unwrap().unwrap();
        assert_eq!(sig.kind, SignalKind::Buy);
        let lower = sig.metadata["lower_band"];
        let half = sig.metadata["upper_band"] - sig.metadata["middle_band"];
        assert!((sig.confidence - (lower - 97.0) / half).abs() < 1e-9);
    }

    #[test]
    fn price_above_upper_band_sells() {
        let points = synthetic_series("TEST", &oscillating(20));
        let mut s = BollingerBandsStrategy::new("bb");
        let sig = s.generate_signal(&points, 103.0).unwrap().unwrap();
        assert_eq!(sig.kind, SignalKind::Sell);
    }

    #[test]
    fn inside_bands_is_silent() {
        let points = synthetic_series("TEST", &oscillating(20));
        let mut s = BollingerBandsStrategy::new("bb");
        assert!(s.generate_signal(&points, 100.0).unwrap().is_none());
    }

    #[test]
    fn zero_width_bands_are_silent() {
        let points = synthetic_series("TEST", &[100.0; 25]);
        let mut s = BollingerBandsStrategy::new("bb");
        assert!(s.generate_signal(&points, 50.0).unwrap().is_none());
    }

    #[test]
    fn short_window_is_silent() {
        let points = synthetic_series("TEST", &oscillating(19));
        let mut s = BollingerBandsStrategy::new("bb");
        assert!(s.generate_signal(&points, 50.0).unwrap().is_none());
    }

    #[test]
    fn explicit_bands_are_checked() {
        assert!(BollingerBandsStrategy::with_bands("bb", 20, 4.0).is_err());
        assert!(BollingerBandsStrategy::with_bands("bb", 5, 2.0).is_err());
        let s = BollingerBandsStrategy::with_bands("bb", 30, 2.5).unwrap();
        assert_eq!(s.required_history(), 30);
    }
}
