//! Engine orchestrator — symbol buffers, strategy registry, signal dispatch,
//! scheduled optimization and snapshot persistence.
//!
//! Locking: the registry is one `Mutex`; each symbol has its own buffer
//! `Mutex` plus a dispatch `Mutex`. Lock order is symbol buffer → registry.
//! The dispatch lock is taken before the buffer lock is released, so signals
//! for one symbol reach callbacks in arrival order while status queries stay
//! free to read buffers. Poisoned locks are recovered.
//!
//! Callbacks must not feed the same symbol back into the engine.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use sigforge_core::domain::{MarketDataPoint, PerformanceSnapshot, TradingSignal};
use sigforge_core::factory::{restore_strategy, snapshot_strategy};
use sigforge_core::strategy::{PerformanceSummary, Strategy, StrategyError};

use crate::config::EngineConfig;
use crate::metrics::PerformanceMetrics;
use crate::optimizer::{Candidate, StrategyOptimizer};
use crate::persistence::{self, PersistenceError, Snapshot};
use crate::scheduler::Scheduler;

pub type SignalCallback = Arc<dyn Fn(&TradingSignal) + Send + Sync>;

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("point for '{point}' submitted under symbol '{expected}'")]
    SymbolMismatch { expected: String, point: String },
    #[error("invalid market data point for '{symbol}'")]
    InvalidPoint { symbol: String },
    #[error("strategy '{0}' is already registered")]
    StrategyExists(String),
    #[error("strategy '{0}' not found")]
    StrategyNotFound(String),
    #[error("invalid parameters for strategy '{name}': {source}")]
    Parameters {
        name: String,
        #[source]
        source: StrategyError,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("failed to spawn scheduler thread: {0}")]
    Scheduler(#[source] std::io::Error),
}

// ─── Symbol buffer ───────────────────────────────────────────────────

/// Bounded per-symbol history. Oldest points are evicted first.
#[derive(Debug, Clone)]
pub struct SymbolBuffer {
    points: VecDeque<MarketDataPoint>,
    capacity: usize,
}

impl SymbolBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: MarketDataPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Chronological window, oldest first.
    pub fn window(&mut self) -> &[MarketDataPoint] {
        self.points.make_contiguous()
    }

    pub fn points_since(&self, cutoff: chrono::DateTime<Utc>) -> Vec<MarketDataPoint> {
        self.points
            .iter()
            .filter(|p| p.timestamp > cutoff)
            .cloned()
            .collect()
    }
}

struct SymbolSlot {
    buffer: Mutex<SymbolBuffer>,
    dispatch: Mutex<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolState {
    NoData,
    /// Some points, fewer than the largest enabled warm-up.
    Buffering,
    Active,
}

// ─── Reports ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOptimization {
    pub strategy: String,
    pub parameters: Candidate,
    pub score: f64,
    pub metrics: PerformanceMetrics,
    /// History points the search replayed.
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStatus {
    pub points: usize,
    pub state: SymbolState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatus {
    pub class_name: String,
    pub enabled: bool,
    pub parameters: BTreeMap<String, f64>,
    pub performance: Option<PerformanceSnapshot>,
    pub summary: PerformanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub strategy_count: usize,
    pub enabled_count: usize,
    pub symbol_count: usize,
    pub symbols: BTreeMap<String, SymbolStatus>,
    pub strategies: BTreeMap<String, StrategyStatus>,
}

// ─── Lock helpers ────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ─── Engine ──────────────────────────────────────────────────────────

struct Inner {
    config: EngineConfig,
    optimizer: StrategyOptimizer,
    strategies: Mutex<BTreeMap<String, Box<dyn Strategy>>>,
    symbols: RwLock<HashMap<String, Arc<SymbolSlot>>>,
    callbacks: RwLock<Vec<SignalCallback>>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    rounds: AtomicU64,
    scheduler: Mutex<Option<Scheduler>>,
}

/// Cheaply cloneable handle; clones share one engine.
#[derive(Clone)]
pub struct SignalEngine {
    inner: Arc<Inner>,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        let optimizer = StrategyOptimizer::new(config.optimizer.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                optimizer,
                strategies: Mutex::new(BTreeMap::new()),
                symbols: RwLock::new(HashMap::new()),
                callbacks: RwLock::new(Vec::new()),
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                rounds: AtomicU64::new(0),
                scheduler: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // ── Registry ──

    pub fn add_strategy(&self, strategy: Box<dyn Strategy>) -> Result<(), EngineError> {
        let name = strategy.name().to_string();
        let mut strategies = lock(&self.inner.strategies);
        if strategies.contains_key(&name) {
            return Err(EngineError::StrategyExists(name));
        }
        info!(strategy = %name, class = strategy.class_name(), "strategy registered");
        strategies.insert(name, strategy);
        Ok(())
    }

    pub fn remove_strategy(&self, name: &str) -> Result<Box<dyn Strategy>, EngineError> {
        let removed = lock(&self.inner.strategies)
            .remove(name)
            .ok_or_else(|| EngineError::StrategyNotFound(name.to_string()))?;
        info!(strategy = %name, "strategy removed");
        Ok(removed)
    }

    pub fn set_strategy_enabled(&self, name: &str, enabled: bool) -> Result<(), EngineError> {
        let mut strategies = lock(&self.inner.strategies);
        let strategy = strategies
            .get_mut(name)
            .ok_or_else(|| EngineError::StrategyNotFound(name.to_string()))?;
        strategy.set_enabled(enabled);
        debug!(strategy = %name, enabled, "strategy toggled");
        Ok(())
    }

    /// Validated, all-or-nothing parameter update on a live strategy.
    pub fn update_strategy_parameters(
        &self,
        name: &str,
        values: &BTreeMap<String, f64>,
    ) -> Result<(), EngineError> {
        let mut strategies = lock(&self.inner.strategies);
        let strategy = strategies
            .get_mut(name)
            .ok_or_else(|| EngineError::StrategyNotFound(name.to_string()))?;
        strategy
            .update_parameters(values)
            .map_err(|source| EngineError::Parameters {
                name: name.to_string(),
                source,
            })
    }

    pub fn strategy_names(&self) -> Vec<String> {
        lock(&self.inner.strategies).keys().cloned().collect()
    }

    /// Run `f` against a registered strategy under the registry lock.
    pub fn with_strategy<R>(&self, name: &str, f: impl FnOnce(&dyn Strategy) -> R) -> Option<R> {
        lock(&self.inner.strategies).get(name).map(|s| f(s.as_ref()))
    }

    pub fn add_signal_callback<F>(&self, callback: F)
    where
        F: Fn(&TradingSignal) + Send + Sync + 'static,
    {
        write(&self.inner.callbacks).push(Arc::new(callback));
    }

    // ── Market data ──

    fn slot(&self, symbol: &str) -> Arc<SymbolSlot> {
        if let Some(slot) = read(&self.inner.symbols).get(symbol) {
            return Arc::clone(slot);
        }
        let mut symbols = write(&self.inner.symbols);
        Arc::clone(symbols.entry(symbol.to_string()).or_insert_with(|| {
            debug!(symbol = %symbol, "tracking new symbol");
            Arc::new(SymbolSlot {
                buffer: Mutex::new(SymbolBuffer::new(self.inner.config.history_capacity)),
                dispatch: Mutex::new(()),
            })
        }))
    }

    /// Buffer a point and, while running, poll every enabled strategy and
    /// dispatch the resulting signals to all callbacks.
    pub fn update_market_data(
        &self,
        symbol: &str,
        point: MarketDataPoint,
    ) -> Result<Vec<TradingSignal>, EngineError> {
        if point.symbol != symbol {
            return Err(EngineError::SymbolMismatch {
                expected: symbol.to_string(),
                point: point.symbol,
            });
        }
        if !point.is_valid() {
            return Err(EngineError::InvalidPoint {
                symbol: symbol.to_string(),
            });
        }

        let slot = self.slot(symbol);
        let mut buffer = lock(&slot.buffer);
        buffer.push(point);
        if !self.is_running() {
            return Ok(Vec::new());
        }

        let signals = {
            let window = buffer.window();
            let price = window.last().map_or(0.0, |p| p.close);
            let mut strategies = lock(&self.inner.strategies);
            strategies
                .values_mut()
                .filter(|s| s.is_enabled())
                .filter_map(|s| evaluate(s.as_mut(), window, price))
                .collect::<Vec<_>>()
        };
        let _dispatch = lock(&slot.dispatch);
        drop(buffer);

        if !signals.is_empty() {
            let callbacks = read(&self.inner.callbacks).clone();
            for signal in &signals {
                debug!(
                    symbol = %signal.symbol,
                    strategy = %signal.strategy,
                    kind = %signal.kind,
                    confidence = signal.confidence,
                    "signal"
                );
                for callback in &callbacks {
                    if catch_unwind(AssertUnwindSafe(|| callback(signal))).is_err() {
                        warn!(strategy = %signal.strategy, "signal callback panicked");
                    }
                }
            }
        }
        Ok(signals)
    }

    pub fn symbol_state(&self, symbol: &str) -> SymbolState {
        let len = match read(&self.inner.symbols).get(symbol) {
            Some(slot) => lock(&slot.buffer).len(),
            None => 0,
        };
        classify(len, self.required_history())
    }

    fn required_history(&self) -> usize {
        lock(&self.inner.strategies)
            .values()
            .filter(|s| s.is_enabled())
            .map(|s| s.required_history())
            .max()
            .unwrap_or(0)
    }

    // ── Optimization ──

    /// Re-tune every registered strategy on the union of the requested
    /// symbols' recent points (all symbols when `None`).
    ///
    /// Searches run on clones outside the registry lock; each winner is
    /// applied with one validated update. Aborts between strategies once
    /// `stop()` has been requested.
    pub fn optimize_strategies(
        &self,
        symbols: Option<&[String]>,
        lookback_days: i64,
    ) -> Vec<AppliedOptimization> {
        let cutoff = lookback_cutoff(Utc::now(), lookback_days);
        let mut slots: Vec<(String, Arc<SymbolSlot>)> = read(&self.inner.symbols)
            .iter()
            .filter(|(name, _)| symbols.map_or(true, |wanted| wanted.contains(*name)))
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let history: Vec<MarketDataPoint> = slots
            .iter()
            .flat_map(|(_, slot)| lock(&slot.buffer).points_since(cutoff))
            .collect();
        if history.len() < self.inner.config.min_optimization_points {
            debug!(
                points = history.len(),
                required = self.inner.config.min_optimization_points,
                "not enough history, skipping optimization"
            );
            return Vec::new();
        }

        let round = self.inner.rounds.fetch_add(1, Ordering::SeqCst);
        let mut applied = Vec::new();
        for name in self.strategy_names() {
            if self.inner.stop_requested.load(Ordering::SeqCst) {
                info!("stop requested, aborting optimization pass");
                break;
            }
            let Some(candidate) = self.with_strategy(&name, |s| s.boxed_clone()) else {
                continue;
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.inner
                    .optimizer
                    .optimize_round(candidate.as_ref(), &history, round)
            }));
            let result = match outcome {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(_) => {
                    warn!(strategy = %name, "optimizer panicked");
                    continue;
                }
            };

            let mut strategies = lock(&self.inner.strategies);
            let Some(live) = strategies.get_mut(&name) else {
                continue;
            };
            match live.update_parameters(&result.best_parameters) {
                Ok(()) => {
                    live.record_performance(result.metrics.snapshot());
                    info!(
                        strategy = %name,
                        score = result.best_score,
                        trades = result.metrics.trade_count,
                        "optimized parameters applied"
                    );
                    applied.push(AppliedOptimization {
                        strategy: name,
                        parameters: result.best_parameters,
                        score: result.best_score,
                        metrics: result.metrics,
                        points: history.len(),
                    });
                }
                Err(e) => warn!(strategy = %name, error = %e, "optimized parameters rejected"),
            }
        }
        applied
    }

    // ── Lifecycle ──

    /// Start dispatching and spawn the optimization scheduler. Idempotent.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.stop_requested.store(false, Ordering::SeqCst);

        let weak = Arc::downgrade(&self.inner);
        let lookback_days = self.inner.config.lookback_days;
        let spawned = Scheduler::spawn(
            "sigforge-optimizer",
            self.inner.config.optimization_interval(),
            move || {
                if let Some(inner) = weak.upgrade() {
                    let engine = SignalEngine { inner };
                    if engine.is_running() {
                        let applied = engine.optimize_strategies(None, lookback_days);
                        debug!(applied = applied.len(), "scheduled optimization finished");
                    }
                }
            },
        );
        match spawned {
            Ok(scheduler) => {
                *lock(&self.inner.scheduler) = Some(scheduler);
                info!(
                    interval_secs = self.inner.config.optimization_interval_secs,
                    "engine started"
                );
                Ok(())
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                Err(EngineError::Scheduler(e))
            }
        }
    }

    /// Stop dispatching and wait (bounded) for the scheduler. Idempotent.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        let scheduler = lock(&self.inner.scheduler).take();
        if let Some(scheduler) = scheduler {
            scheduler.stop(self.inner.config.shutdown_timeout());
        }
        info!("engine stopped");
    }

    // ── Persistence ──

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let records = lock(&self.inner.strategies)
            .iter()
            .map(|(name, s)| (name.clone(), snapshot_strategy(s.as_ref())))
            .collect();
        persistence::save(path, &Snapshot::new(records))?;
        info!(path = %path.display(), "strategies saved");
        Ok(())
    }

    /// Restore strategies from a snapshot. Returns how many were installed.
    ///
    /// Unreadable, malformed or wrong-version files leave the registry as it
    /// was. Entries with an unknown class or invalid parameters are skipped.
    pub fn load(&self, path: &Path) -> Result<usize, EngineError> {
        let snapshot = persistence::load(path)?;
        let mut restored = Vec::with_capacity(snapshot.strategies.len());
        for (name, record) in &snapshot.strategies {
            match restore_strategy(name, record) {
                Ok(strategy) => restored.push((name.clone(), strategy)),
                Err(e) => warn!(strategy = %name, error = %e, "skipping snapshot entry"),
            }
        }

        let count = restored.len();
        lock(&self.inner.strategies).extend(restored);
        info!(path = %path.display(), loaded = count, "strategies loaded");
        Ok(count)
    }

    // ── Status ──

    pub fn get_engine_status(&self) -> EngineStatus {
        let (strategies, required) = {
            let registry = lock(&self.inner.strategies);
            let statuses: BTreeMap<String, StrategyStatus> = registry
                .iter()
                .map(|(name, s)| {
                    let params = s.parameters();
                    let status = StrategyStatus {
                        class_name: s.class_name().to_string(),
                        enabled: s.is_enabled(),
                        parameters: params.values.clone(),
                        performance: params.performance,
                        summary: s.performance_summary(),
                    };
                    (name.clone(), status)
                })
                .collect();
            let required = registry
                .values()
                .filter(|s| s.is_enabled())
                .map(|s| s.required_history())
                .max()
                .unwrap_or(0);
            (statuses, required)
        };

        let slots: Vec<(String, Arc<SymbolSlot>)> = read(&self.inner.symbols)
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        let symbols: BTreeMap<String, SymbolStatus> = slots
            .into_iter()
            .map(|(name, slot)| {
                let points = lock(&slot.buffer).len();
                let state = classify(points, required);
                (name, SymbolStatus { points, state })
            })
            .collect();

        EngineStatus {
            running: self.is_running(),
            strategy_count: strategies.len(),
            enabled_count: strategies.values().filter(|s| s.enabled).count(),
            symbol_count: symbols.len(),
            symbols,
            strategies,
        }
    }
}

fn classify(points: usize, required: usize) -> SymbolState {
    if points == 0 {
        SymbolState::NoData
    } else if points < required {
        SymbolState::Buffering
    } else {
        SymbolState::Active
    }
}

/// Oldest timestamp inside the look-back. Unrepresentable spans mean all history.
fn lookback_cutoff(now: DateTime<Utc>, lookback_days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(lookback_days)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Poll one strategy; failures and panics are logged and yield no signal.
fn evaluate(strategy: &mut dyn Strategy, window: &[MarketDataPoint], price: f64) -> Option<TradingSignal> {
    match catch_unwind(AssertUnwindSafe(|| strategy.generate_signal(window, price))) {
        Ok(Ok(signal)) => signal,
        Ok(Err(e)) => {
            warn!(strategy = %strategy.name(), error = %e, "strategy failed");
            None
        }
        Err(_) => {
            warn!(strategy = %strategy.name(), "strategy panicked");
            None
        }
    }
}
