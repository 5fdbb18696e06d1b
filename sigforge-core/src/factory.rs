//! Factory: converts class names and persisted records into strategy
//! trait objects, and strategies back into records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::PerformanceSnapshot;
use crate::strategy::{
    BollingerBandsStrategy, HybridStrategy, MacdMomentumStrategy, MlPredictionStrategy,
    MovingAverageCrossoverStrategy, RsiMeanReversionStrategy, Strategy, StrategyError,
    StrategyKind,
};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown strategy class: {0}")]
    UnknownClass(String),
    #[error("Invalid parameters for strategy '{name}': {source}")]
    Parameters {
        name: String,
        #[source]
        source: StrategyError,
    },
}

// ─── Persisted form ──────────────────────────────────────────────────

/// Serializable description of one strategy, enough to rebuild it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub class_name: String,
    pub parameters: BTreeMap<String, f64>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSnapshot>,
    /// Hybrid constituents keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constituents: BTreeMap<String, StrategyRecord>,
    /// Base weight inside a hybrid; absent at the top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

fn enabled_by_default() -> bool {
    true
}

// ─── Construction ────────────────────────────────────────────────────

/// Default-parameter instance of `kind`. Hybrids get the default constituents.
pub fn create_kind(kind: StrategyKind, name: &str) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::MovingAverageCrossover => Box::new(MovingAverageCrossoverStrategy::new(name)),
        StrategyKind::RsiMeanReversion => Box::new(RsiMeanReversionStrategy::new(name)),
        StrategyKind::BollingerBands => Box::new(BollingerBandsStrategy::new(name)),
        StrategyKind::MacdMomentum => Box::new(MacdMomentumStrategy::new(name)),
        StrategyKind::MlPrediction => Box::new(MlPredictionStrategy::new(name)),
        StrategyKind::Hybrid => Box::new(HybridStrategy::with_default_members(name)),
    }
}

/// Create a strategy from its class name (or short name).
pub fn create_strategy(class_name: &str, name: &str) -> Result<Box<dyn Strategy>, FactoryError> {
    let kind = class_name
        .parse::<StrategyKind>()
        .map_err(|_| FactoryError::UnknownClass(class_name.to_string()))?;
    Ok(create_kind(kind, name))
}

pub fn snapshot_strategy(strategy: &dyn Strategy) -> StrategyRecord {
    let params = strategy.parameters();
    StrategyRecord {
        class_name: strategy.class_name().to_string(),
        parameters: params.values.clone(),
        enabled: strategy.is_enabled(),
        performance: params.performance,
        constituents: strategy
            .constituents()
            .into_iter()
            .map(|(member, weight)| {
                let mut record = snapshot_strategy(member);
                record.weight = Some(weight);
                (member.name().to_string(), record)
            })
            .collect(),
        weight: None,
    }
}

/// Rebuild a strategy from a record. Parameters go through the same
/// validation as a live update; hybrids get exactly the recorded constituents.
pub fn restore_strategy(name: &str, record: &StrategyRecord) -> Result<Box<dyn Strategy>, FactoryError> {
    let kind = StrategyKind::from_class_name(&record.class_name)
        .ok_or_else(|| FactoryError::UnknownClass(record.class_name.clone()))?;
    let parameters_error = |source| FactoryError::Parameters {
        name: name.to_string(),
        source,
    };

    let mut strategy = if kind == StrategyKind::Hybrid {
        let mut hybrid = HybridStrategy::new(name);
        for (member_name, member) in &record.constituents {
            let restored = restore_strategy(member_name, member)?;
            hybrid
                .add_member(restored, member.weight.unwrap_or(1.0))
                .map_err(parameters_error)?;
        }
        Box::new(hybrid) as Box<dyn Strategy>
    } else {
        create_kind(kind, name)
    };

    strategy
        .update_parameters(&record.parameters)
        .map_err(parameters_error)?;
    strategy.set_enabled(record.enabled);
    if let Some(snapshot) = record.performance {
        strategy.record_performance(snapshot);
    }
    Ok(strategy)
}
