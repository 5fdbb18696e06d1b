//! Sigforge CLI — replay, optimize and status commands.
//!
//! Commands:
//! - `replay` — feed a CSV of bars through the engine and print signals as JSON lines
//! - `optimize` — search one strategy's parameters over a CSV history
//! - `status` — load a strategy snapshot and print the engine status

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use sigforge_core::domain::MarketDataPoint;
use sigforge_core::factory::{create_kind, create_strategy};
use sigforge_core::strategy::StrategyKind;
use sigforge_runner::{
    init_logging, EngineConfig, FitnessMetric, LogFormat, SearchMethod, SignalEngine,
    StrategyOptimizer,
};

#[derive(Parser)]
#[command(
    name = "sigforge",
    about = "Sigforge CLI — multi-strategy trading signal engine"
)]
struct Cli {
    /// Engine config (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log format: pretty, compact, json.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed bars from a CSV through the engine, printing each signal as JSON.
    Replay {
        /// CSV with columns timestamp,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        /// Symbol the bars belong to.
        #[arg(long)]
        symbol: String,

        /// Strategies to register (class or short names). Defaults to all six.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,

        /// Restore strategies from a snapshot instead of registering fresh ones.
        #[arg(long)]
        load: Option<PathBuf>,

        /// Save strategy state here after the replay.
        #[arg(long)]
        save: Option<PathBuf>,

        /// Run an optimization pass over the replayed bars before saving.
        #[arg(long, default_value_t = false)]
        optimize: bool,
    },
    /// Search the best parameters for one strategy over a CSV history.
    Optimize {
        /// CSV with columns timestamp,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        #[arg(long)]
        symbol: String,

        /// Strategy class or short name (ma_crossover, rsi, bollinger, macd, ml, hybrid).
        #[arg(long)]
        strategy: String,

        /// grid or random. Defaults to the configured method.
        #[arg(long)]
        method: Option<SearchMethod>,

        /// Fitness metric. Defaults to the configured metric.
        #[arg(long)]
        metric: Option<FitnessMetric>,

        /// Seed for random search.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Load a snapshot and print the engine status as JSON.
    Status {
        /// Snapshot written by `replay --save`.
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Replay {
            data,
            symbol,
            strategies,
            load,
            save,
            optimize,
        } => run_replay(config, &data, &symbol, &strategies, load, save, optimize),
        Commands::Optimize {
            data,
            symbol,
            strategy,
            method,
            metric,
            seed,
        } => {
            if let Some(method) = method {
                config.optimizer.method = method;
            }
            if let Some(metric) = metric {
                config.optimizer.metric = metric;
            }
            if let Some(seed) = seed {
                config.optimizer.seed = seed;
            }
            run_optimize(config, &data, &symbol, &strategy)
        }
        Commands::Status { snapshot } => run_status(config, &snapshot),
    }
}

fn run_replay(
    config: EngineConfig,
    data: &Path,
    symbol: &str,
    strategies: &[String],
    load: Option<PathBuf>,
    save: Option<PathBuf>,
    optimize: bool,
) -> Result<()> {
    let bars = load_bars(data, symbol)?;
    let oldest = bars.first().map(|b| b.timestamp);
    let engine = SignalEngine::new(config);

    if let Some(path) = load {
        let count = engine
            .load(&path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;
        info!(count, "restored strategies");
    } else if strategies.is_empty() {
        for kind in StrategyKind::ALL {
            engine.add_strategy(create_kind(kind, kind.short_name()))?;
        }
    } else {
        for name in strategies {
            engine.add_strategy(create_strategy(name, name)?)?;
        }
    }
    if engine.strategy_names().is_empty() {
        bail!("no strategies registered");
    }

    engine.add_signal_callback(|signal| {
        if let Ok(line) = serde_json::to_string(signal) {
            println!("{line}");
        }
    });
    engine.start()?;
    let mut emitted = 0usize;
    for bar in bars {
        emitted += engine.update_market_data(symbol, bar)?.len();
    }

    if optimize {
        let lookback = lookback_covering(oldest);
        let applied = engine.optimize_strategies(Some(&[symbol.to_string()]), lookback);
        info!(applied = applied.len(), "optimization pass finished");
    }
    engine.stop();
    info!(emitted, "replay finished");

    if let Some(path) = save {
        engine
            .save(&path)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
        eprintln!("Strategies saved to: {}", path.display());
    }
    Ok(())
}

/// Whole days from the oldest bar to now, so the look-back covers the file.
fn lookback_covering(oldest: Option<DateTime<Utc>>) -> i64 {
    oldest.map_or(1, |ts| (Utc::now() - ts).num_days() + 1).max(1)
}

fn run_optimize(config: EngineConfig, data: &Path, symbol: &str, strategy: &str) -> Result<()> {
    let bars = load_bars(data, symbol)?;
    let strategy = create_strategy(strategy, strategy)?;
    let optimizer = StrategyOptimizer::new(config.optimizer.clone());

    let Some(result) = optimizer.optimize(strategy.as_ref(), &bars) else {
        bail!("'{}' has no valid candidates to search", strategy.name());
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_status(config: EngineConfig, snapshot: &Path) -> Result<()> {
    let engine = SignalEngine::new(config);
    engine
        .load(snapshot)
        .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;
    println!("{}", serde_json::to_string_pretty(&engine.get_engine_status())?);
    Ok(())
}

// ─── CSV input ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date (midnight UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unrecognized timestamp '{raw}'"))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(naive) => Ok(naive.and_utc()),
        None => bail!("unrecognized timestamp '{raw}'"),
    }
}

fn load_bars(path: &Path, symbol: &str) -> Result<Vec<MarketDataPoint>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut bars = Vec::new();
    for (line, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.with_context(|| format!("bad row {} in {}", line + 2, path.display()))?;
        let timestamp = parse_timestamp(&row.timestamp)?;
        bars.push(MarketDataPoint::new(
            symbol, timestamp, row.open, row.high, row.low, row.close, row.volume,
        ));
    }
    bars.sort_by_key(|b| b.timestamp);
    info!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}
