//! Criterion benchmarks for the signal hot path.
//!
//! Benchmarks:
//! 1. Indicator batch (SMA, EMA, RSI, MACD, Bollinger) over growing series
//! 2. One `generate_signal` call per strategy on a full-history window

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sigforge_core::domain::synthetic_series;
use sigforge_core::factory::create_kind;
use sigforge_core::indicators::{bollinger_bands, ema, macd, rsi, sma};
use sigforge_core::strategy::{Strategy, StrategyKind};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.01)
        .collect()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    for n in [250usize, 1_000, 5_000] {
        let closes = make_closes(n);
        group.bench_with_input(BenchmarkId::new("batch", n), &closes, |b, closes| {
            b.iter(|| {
                black_box(sma(closes, 20));
                black_box(ema(closes, 20));
                black_box(rsi(closes, 14));
                black_box(macd(closes, 12, 26, 9));
                black_box(bollinger_bands(closes, 20, 2.0));
            })
        });
    }
    group.finish();
}

// ── 2. Strategies ────────────────────────────────────────────────────

fn bench_strategies(c: &mut Criterion) {
    let points = synthetic_series("BENCH", &make_closes(1_000));
    let price = points[points.len() - 1].close;
    let mut group = c.benchmark_group("generate_signal");
    for kind in StrategyKind::ALL {
        group.bench_function(kind.short_name(), |b| {
            let mut strategy = create_kind(kind, "bench");
            b.iter(|| black_box(strategy.generate_signal(black_box(&points), price)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_indicators, bench_strategies);
criterion_main!(benches);
