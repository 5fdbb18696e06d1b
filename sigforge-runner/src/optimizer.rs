//! Strategy optimizer — grid and random parameter search scored by replaying
//! a strategy over history with a single-unit paper position.
//!
//! Candidates are evaluated on fresh clones; the live strategy is never
//! touched. Evaluation may run on rayon's pool. Random draws are seeded from
//! the RNG hierarchy so results do not depend on thread count.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use sigforge_core::domain::{MarketDataPoint, ParamBound, StrategyParameters};
use sigforge_core::rng::RngHierarchy;
use sigforge_core::strategy::{Strategy, TradeTracker};

use crate::fitness::FitnessMetric;
use crate::metrics::PerformanceMetrics;

pub type Candidate = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    #[default]
    Grid,
    Random,
}

impl std::str::FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(Self::Grid),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown search method: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub method: SearchMethod,
    pub metric: FitnessMetric,
    /// Random search draws.
    pub n_iterations: usize,
    /// Grid points per bounded parameter.
    pub grid_points: usize,
    /// First replay offset; shorter histories score zero.
    pub warmup: usize,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: SearchMethod::Grid,
            metric: FitnessMetric::Sharpe,
            n_iterations: 50,
            grid_points: 5,
            warmup: 50,
            seed: 42,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub strategy: String,
    pub best_parameters: Candidate,
    pub best_score: f64,
    pub metrics: PerformanceMetrics,
    /// Candidates actually replayed.
    pub evaluated: usize,
    pub method: SearchMethod,
    pub metric: FitnessMetric,
}

// ─── Candidate generation ────────────────────────────────────────────

/// Evenly spaced values across `bound`.
///
/// Integer bounds with at most `points` integers enumerate all of them;
/// otherwise the spaced values are rounded and deduplicated.
pub fn grid_values(bound: &ParamBound, points: usize) -> Vec<f64> {
    let points = points.max(1);
    if bound.integer {
        let lo = bound.min.ceil() as i64;
        let hi = bound.max.floor() as i64;
        if hi < lo {
            return Vec::new();
        }
        if (hi - lo + 1) as usize <= points {
            return (lo..=hi).map(|v| v as f64).collect();
        }
    }
    if points == 1 || bound.max <= bound.min {
        return vec![bound.min];
    }

    let step = (bound.max - bound.min) / (points - 1) as f64;
    let mut values: Vec<f64> = (0..points)
        .map(|k| {
            let v = (bound.min + step * k as f64).min(bound.max);
            if bound.integer {
                v.round()
            } else {
                v
            }
        })
        .collect();
    values.dedup();
    values
}

/// Cartesian product of per-parameter grids in key order, keeping only
/// candidates that satisfy bounds and constraints.
pub fn grid_candidates(params: &StrategyParameters, points: usize) -> Vec<Candidate> {
    let mut candidates = vec![Candidate::new()];
    for (key, bound) in &params.bounds {
        let values = grid_values(bound, points);
        candidates = candidates
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |&v| {
                    let mut c = base.clone();
                    c.insert(key.clone(), v);
                    c
                })
            })
            .collect();
    }
    candidates.retain(|c| params.validate(c).is_ok());
    candidates
}

/// `draws` uniform samples, each from its own derived RNG stream.
pub fn random_candidates(
    params: &StrategyParameters,
    draws: usize,
    rngs: &RngHierarchy,
    round: u64,
) -> Vec<Candidate> {
    (0..draws as u64)
        .filter_map(|draw| {
            let mut rng = rngs.rng_for(&params.name, round, draw);
            let candidate: Candidate = params
                .bounds
                .iter()
                .map(|(k, b)| (k.clone(), sample(b, &mut rng)))
                .collect();
            params.validate(&candidate).is_ok().then_some(candidate)
        })
        .collect()
}

fn sample(bound: &ParamBound, rng: &mut impl Rng) -> f64 {
    if bound.integer {
        let lo = bound.min.ceil() as i64;
        let hi = (bound.max.floor() as i64).max(lo);
        rng.gen_range(lo..=hi) as f64
    } else if bound.max > bound.min {
        rng.gen_range(bound.min..=bound.max)
    } else {
        bound.min
    }
}

// ─── Simulation ──────────────────────────────────────────────────────

/// Replay `strategy` over `history[..=i]` for every `i ≥ warmup`, trading a
/// single unit on each emitted signal. Fewer than `warmup` points or no
/// closed trades → all-zero metrics.
pub fn backtest(strategy: &mut dyn Strategy, history: &[MarketDataPoint], warmup: usize) -> PerformanceMetrics {
    if history.len() < warmup {
        return PerformanceMetrics::default();
    }
    let mut tracker = TradeTracker::new();
    let mut returns = Vec::new();
    for i in warmup..history.len() {
        let point = &history[i];
        match strategy.generate_signal(&history[..=i], point.close) {
            Ok(Some(signal)) => {
                if let Some(trade) = tracker.on_signal(signal.kind, signal.price, signal.timestamp) {
                    returns.push(trade.return_pct);
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(strategy = %strategy.name(), index = i, error = %e, "replay step failed");
            }
        }
    }
    PerformanceMetrics::from_returns(&returns)
}

// ─── Optimizer ───────────────────────────────────────────────────────

pub struct StrategyOptimizer {
    config: OptimizerConfig,
    rngs: RngHierarchy,
}

impl StrategyOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let rngs = RngHierarchy::new(config.seed);
        Self { config, rngs }
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn candidates(&self, params: &StrategyParameters, round: u64) -> Vec<Candidate> {
        match self.config.method {
            SearchMethod::Grid => grid_candidates(params, self.config.grid_points),
            SearchMethod::Random => random_candidates(params, self.config.n_iterations, &self.rngs, round),
        }
    }

    /// Score one candidate on a fresh clone. `None` if the candidate is rejected.
    pub fn evaluate(
        &self,
        strategy: &dyn Strategy,
        candidate: &Candidate,
        history: &[MarketDataPoint],
    ) -> Option<PerformanceMetrics> {
        let mut trial = strategy.boxed_clone();
        trial.reset_state();
        trial.update_parameters(candidate).ok()?;
        Some(backtest(trial.as_mut(), history, self.config.warmup))
    }

    pub fn optimize(&self, strategy: &dyn Strategy, history: &[MarketDataPoint]) -> Option<OptimizationResult> {
        self.optimize_round(strategy, history, 0)
    }

    /// Search for the best parameters. `round` selects the random stream.
    ///
    /// Returns `None` when the strategy has no bounded parameters or no
    /// candidate passes validation.
    pub fn optimize_round(
        &self,
        strategy: &dyn Strategy,
        history: &[MarketDataPoint],
        round: u64,
    ) -> Option<OptimizationResult> {
        let params = strategy.parameters();
        if params.bounds.is_empty() {
            debug!(strategy = %params.name, "no bounded parameters, nothing to optimize");
            return None;
        }
        let candidates = self.candidates(params, round);
        if candidates.is_empty() {
            debug!(strategy = %params.name, "no valid candidates");
            return None;
        }

        let scored: Vec<(usize, PerformanceMetrics)> = if self.config.parallel {
            candidates
                .par_iter()
                .enumerate()
                .filter_map(|(idx, c)| self.evaluate(strategy, c, history).map(|m| (idx, m)))
                .collect()
        } else {
            candidates
                .iter()
                .enumerate()
                .filter_map(|(idx, c)| self.evaluate(strategy, c, history).map(|m| (idx, m)))
                .collect()
        };

        let metric = self.config.metric;
        let mut best: Option<(usize, f64, PerformanceMetrics)> = None;
        for &(idx, metrics) in &scored {
            if metrics.trade_count == 0 {
                continue;
            }
            let score = metric.extract(&metrics);
            match best {
                Some((_, best_score, _)) if !metric.is_better(score, best_score) => {}
                _ => best = Some((idx, score, metrics)),
            }
        }
        let (idx, best_score, metrics) = match best {
            Some(found) => found,
            None => (scored.first()?.0, 0.0, PerformanceMetrics::default()),
        };

        info!(
            strategy = %params.name,
            method = ?self.config.method,
            metric = %metric,
            evaluated = scored.len(),
            best_score,
            trades = metrics.trade_count,
            "optimization finished"
        );
        Some(OptimizationResult {
            strategy: params.name.clone(),
            best_parameters: candidates[idx].clone(),
            best_score,
            metrics,
            evaluated: scored.len(),
            method: self.config.method,
            metric,
        })
    }
}
