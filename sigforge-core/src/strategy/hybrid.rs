//! Weighted-consensus composite of other strategies.
//!
//! Every enabled constituent is polled with the same window. A vote adds
//! `weight × confidence` to its side; both sides are normalized by the total
//! weight of the polled constituents. The larger side wins and is emitted
//! only when its consensus reaches `min_consensus`. Constituent failures are
//! logged and count as abstentions.
//!
//! Under performance weighting a constituent's weight is recomputed before
//! every poll as `base × max(weight_floor, 1 + total_return)`, where
//! `total_return` comes from the trades its own signals have closed so far.

use tracing::warn;

use crate::domain::{MarketDataPoint, ParamBound};

use super::{
    common_parameters, BollingerBandsStrategy, MacdMomentumStrategy,
    MovingAverageCrossoverStrategy, RsiMeanReversionStrategy, SignalDecision, Strategy,
    StrategyCore, StrategyError, StrategyKind,
};

pub const MIN_CONSENSUS: &str = "min_consensus";
pub const WEIGHTING: &str = "weighting";
pub const WEIGHT_FLOOR: &str = "weight_floor";

/// How constituent votes are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    #[default]
    Equal,
    /// Scale by the constituent's running trade return, floored.
    Performance,
}

impl Weighting {
    pub fn from_param(value: f64) -> Self {
        if value >= 0.5 {
            Self::Performance
        } else {
            Self::Equal
        }
    }

    pub fn as_param(self) -> f64 {
        match self {
            Self::Equal => 0.0,
            Self::Performance => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    strategy: Box<dyn Strategy>,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct HybridStrategy {
    core: StrategyCore,
    members: Vec<Member>,
}

impl HybridStrategy {
    /// Empty composite. Defaults: min_consensus 0.6 in [0.4, 0.9], equal weighting.
    ///
    /// The weighting mode is an operator choice and is never searched.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let params = common_parameters(&name)
            .with_bounded(MIN_CONSENSUS, 0.6, ParamBound::float(0.4, 0.9))
            .with_limited(WEIGHTING, Weighting::Equal.as_param(), ParamBound::integer(0, 1))
            .with_limited(WEIGHT_FLOOR, 0.1, ParamBound::float(0.0, 1.0));
        Self {
            core: StrategyCore::new(params),
            members: Vec::new(),
        }
    }

    /// Composite of MA crossover, RSI, Bollinger and MACD, equally weighted.
    pub fn with_default_members(name: impl Into<String>) -> Self {
        let mut hybrid = Self::new(name);
        let defaults: [Box<dyn Strategy>; 4] = [
            Box::new(MovingAverageCrossoverStrategy::new("ma_crossover")),
            Box::new(RsiMeanReversionStrategy::new("rsi")),
            Box::new(BollingerBandsStrategy::new("bollinger")),
            Box::new(MacdMomentumStrategy::new("macd")),
        ];
        for strategy in defaults {
            hybrid.members.push(Member {
                strategy,
                weight: 1.0,
            });
        }
        hybrid
    }

    /// Add a constituent. Names must be unique and weights positive.
    pub fn add_member(&mut self, strategy: Box<dyn Strategy>, weight: f64) -> Result<(), StrategyError> {
        if self.member(strategy.name()).is_some() {
            return Err(StrategyError::DuplicateConstituent(strategy.name().to_string()));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(StrategyError::InvalidInput(format!(
                "constituent weight {weight} must be positive"
            )));
        }
        self.members.push(Member { strategy, weight });
        Ok(())
    }

    pub fn remove_member(&mut self, name: &str) -> Option<Box<dyn Strategy>> {
        let idx = self.members.iter().position(|m| m.strategy.name() == name)?;
        Some(self.members.remove(idx).strategy)
    }

    pub fn member(&self, name: &str) -> Option<&dyn Strategy> {
        self.members
            .iter()
            .find(|m| m.strategy.name() == name)
            .map(|m| m.strategy.as_ref())
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Box<dyn Strategy>> {
        self.members
            .iter_mut()
            .find(|m| m.strategy.name() == name)
            .map(|m| &mut m.strategy)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn weighting(&self) -> Weighting {
        Weighting::from_param(self.core.params.get_or(WEIGHTING, 0.0))
    }

    fn effective_weight(&self, member: &Member) -> f64 {
        match self.weighting() {
            Weighting::Equal => member.weight,
            Weighting::Performance => {
                let floor = self.core.params.get_or(WEIGHT_FLOOR, 0.1);
                let total_return = member.strategy.performance_summary().total_return;
                member.weight * (1.0 + total_return).max(floor)
            }
        }
    }
}

impl Strategy for HybridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn required_history(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.strategy.is_enabled())
            .map(|m| m.strategy.required_history())
            .max()
            .unwrap_or(1)
    }

    fn compute_signal(
        &mut self,
        history: &[MarketDataPoint],
        current_price: f64,
    ) -> Result<Option<SignalDecision>, StrategyError> {
        let weights: Vec<f64> = self.members.iter().map(|m| self.effective_weight(m)).collect();
        let mut buy = 0.0;
        let mut sell = 0.0;
        let mut total = 0.0;
        let mut votes = Vec::with_capacity(self.members.len());

        for (member, weight) in self.members.iter_mut().zip(weights) {
            if !member.strategy.is_enabled() {
                continue;
            }
            total += weight;
            let vote = match member.strategy.generate_signal(history, current_price) {
                Ok(Some(signal)) => signal.kind.direction() * signal.confidence,
                Ok(None) => 0.0,
                Err(e) => {
                    warn!(
                        hybrid = %self.core.params.name,
                        constituent = %member.strategy.name(),
                        error = %e,
                        "constituent failed, counting as abstention"
                    );
                    0.0
                }
            };
            if vote > 0.0 {
                buy += weight * vote;
            } else {
                sell += weight * -vote;
            }
            votes.push((format!("vote.{}", member.strategy.name()), vote));
        }

        if total <= 0.0 {
            return Ok(None);
        }
        let buy = buy / total;
        let sell = sell / total;
        let min_consensus = self.core.params.get_or(MIN_CONSENSUS, 0.6);

        let decision = if buy > sell && buy >= min_consensus {
            SignalDecision::buy(buy)
        } else if sell > buy && sell >= min_consensus {
            SignalDecision::sell(sell)
        } else {
            return Ok(None);
        };
        let decision = votes
            .into_iter()
            .fold(decision, |d, (key, vote)| d.with_meta(key, vote))
            .with_meta("consensus.buy", buy)
            .with_meta("consensus.sell", sell);
        Ok(Some(decision))
    }

    fn constituents(&self) -> Vec<(&dyn Strategy, f64)> {
        self.members
            .iter()
            .map(|m| (m.strategy.as_ref(), m.weight))
            .collect()
    }

    fn constituent_weights(&self) -> Vec<(String, f64)> {
        self.members
            .iter()
            .map(|m| (m.strategy.name().to_string(), self.effective_weight(m)))
            .collect()
    }

    fn reset_state(&mut self) {
        self.core.tracker.reset();
        for member in &mut self.members {
            member.strategy.reset_state();
        }
    }

    fn boxed_clone(&self) -> Box<dyn Strategy> {
        Box::new(self.clone())
    }
}
