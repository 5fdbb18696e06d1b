//! Fitness function — configurable metric selector for parameter search.

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which metric the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    Sortino,
    TotalReturn,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 6] = [
        Self::Sharpe,
        Self::Sortino,
        Self::TotalReturn,
        Self::WinRate,
        Self::ProfitFactor,
        Self::MaxDrawdown,
    ];

    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::TotalReturn => metrics.total_return,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
            Self::MaxDrawdown => metrics.max_drawdown,
        }
    }

    /// Compare two metric values. Returns true if `a` is strictly better than `b`.
    ///
    /// `a > b` holds for every metric: drawdowns are negative, so -0.05 > -0.20
    /// already prefers the shallower one.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown fitness metric: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            total_return: 0.15,
            sharpe: 1.5,
            sortino: 2.0,
            max_drawdown: -0.10,
            win_rate: 0.55,
            profit_factor: 1.8,
            trade_count: 20,
            volatility: 0.02,
            avg_trade_return: 0.0075,
            max_consecutive_losses: 3,
        }
    }

    #[test]
    fn extract_each_metric() {
        let m = sample_metrics();
        assert!((FitnessMetric::Sharpe.extract(&m) - 1.5).abs() < 1e-10);
        assert!((FitnessMetric::Sortino.extract(&m) - 2.0).abs() < 1e-10);
        assert!((FitnessMetric::TotalReturn.extract(&m) - 0.15).abs() < 1e-10);
        assert!((FitnessMetric::MaxDrawdown.extract(&m) - (-0.10)).abs() < 1e-10);
    }

    #[test]
    fn default_is_sharpe() {
        assert_eq!(FitnessMetric::default(), FitnessMetric::Sharpe);
    }

    #[test]
    fn is_better_is_strict() {
        assert!(FitnessMetric::Sharpe.is_better(2.0, 1.5));
        assert!(!FitnessMetric::Sharpe.is_better(1.5, 1.5));
        assert!(FitnessMetric::MaxDrawdown.is_better(-0.05, -0.20));
    }

    #[test]
    fn names_roundtrip() {
        for m in FitnessMetric::ALL {
            assert_eq!(m.to_string().parse::<FitnessMetric>(), Ok(m));
        }
        assert!("calmar".parse::<FitnessMetric>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&FitnessMetric::TotalReturn).unwrap();
        assert_eq!(json, "\"total_return\"");
    }
}
