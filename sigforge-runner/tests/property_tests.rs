//! Property tests for search and metric invariants.
//!
//! Uses proptest to verify:
//! 1. Grid search — every candidate respects bounds and constraints
//! 2. Random search — draws respect bounds and repeat under the same seed
//! 3. Metrics — ratios stay inside their documented ranges
//! 4. Flat history — nothing trades, every strategy scores zero

use proptest::prelude::*;

use sigforge_core::domain::synthetic_series;
use sigforge_core::factory::create_kind;
use sigforge_core::rng::RngHierarchy;
use sigforge_core::strategy::{Strategy as SignalStrategy, StrategyKind};
use sigforge_runner::metrics;
use sigforge_runner::optimizer::{grid_candidates, random_candidates};
use sigforge_runner::{OptimizerConfig, PerformanceMetrics, SearchMethod, StrategyOptimizer};

fn arb_kind() -> impl Strategy<Value = StrategyKind> {
    prop::sample::select(StrategyKind::ALL.to_vec())
}

// ── 1. Grid search ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn grid_candidates_respect_bounds(kind in arb_kind(), points in 1usize..7) {
        let strategy: Box<dyn SignalStrategy> = create_kind(kind, "p");
        let params = strategy.parameters();
        let candidates = grid_candidates(params, points);
        prop_assert!(!candidates.is_empty());
        for candidate in &candidates {
            prop_assert!(params.validate(candidate).is_ok());
            for (name, value) in candidate {
                let bound = &params.bounds[name];
                prop_assert!(bound.contains(*value));
                if bound.integer {
                    prop_assert_eq!(value.fract(), 0.0);
                }
            }
        }
    }
}

// ── 2. Random search ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn random_candidates_respect_bounds_and_seed(
        kind in arb_kind(),
        seed in any::<u64>(),
        round in 0u64..8,
    ) {
        let strategy: Box<dyn SignalStrategy> = create_kind(kind, "p");
        let params = strategy.parameters();
        let rngs = RngHierarchy::new(seed);
        let first = random_candidates(params, 12, &rngs, round);
        let again = random_candidates(params, 12, &rngs, round);
        prop_assert_eq!(&first, &again);
        for candidate in &first {
            prop_assert!(params.validate(candidate).is_ok());
            prop_assert_eq!(candidate.len(), params.bounds.len());
        }
    }
}

// ── 3. Metrics ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn metric_ranges_hold(returns in prop::collection::vec(-0.2..0.2_f64, 0..60)) {
        let m = PerformanceMetrics::from_returns(&returns);
        prop_assert_eq!(m.trade_count, returns.len());
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!(m.max_drawdown <= 0.0);
        prop_assert!((0.0..=100.0).contains(&m.profit_factor));
        prop_assert!(m.max_consecutive_losses <= returns.len());
        prop_assert!((m.total_return - returns.iter().sum::<f64>()).abs() < 1e-9);
        prop_assert!(m.sharpe.is_finite());
        prop_assert!(m.sortino.is_finite());
    }

    #[test]
    fn drawdown_never_exceeds_gross_losses(returns in prop::collection::vec(-0.2..0.2_f64, 1..60)) {
        let losses: f64 = returns.iter().filter(|r| **r < 0.0).sum();
        prop_assert!(metrics::max_drawdown(&returns) >= losses - 1e-12);
    }
}

// ── 4. Flat history ──────────────────────────────────────────────────

#[test]
fn flat_history_scores_zero_for_every_kind() {
    let history = synthetic_series("FLAT", &vec![100.0; 200]);
    for method in [SearchMethod::Grid, SearchMethod::Random] {
        let optimizer = StrategyOptimizer::new(OptimizerConfig {
            method,
            grid_points: 3,
            n_iterations: 8,
            parallel: false,
            ..Default::default()
        });
        for kind in StrategyKind::ALL {
            let strategy: Box<dyn SignalStrategy> = create_kind(kind, "flat");
            let result = optimizer
                .optimize(strategy.as_ref(), &history)
                .expect("every kind has bounded parameters");
            assert_eq!(result.best_score, 0.0, "{kind:?} via {method:?}");
            assert_eq!(result.metrics.trade_count, 0, "{kind:?} via {method:?}");
        }
    }
}
