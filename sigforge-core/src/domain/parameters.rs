//! Strategy parameter sets with declared bounds and cross-parameter constraints.
//!
//! A `StrategyParameters` is owned by exactly one strategy. The optimizer
//! reads `bounds`/`constraints`, searches on a copy, and hands back a
//! candidate map that is applied in one validated swap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for treating a float as an integer value.
const INTEGER_TOLERANCE: f64 = 1e-9;

/// Inclusive search range for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBound {
    pub min: f64,
    pub max: f64,
    /// Integer bounds only admit whole numbers (periods, window lengths).
    #[serde(default)]
    pub integer: bool,
}

impl ParamBound {
    pub fn float(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            integer: false,
        }
    }

    pub fn integer(min: usize, max: usize) -> Self {
        Self {
            min: min as f64,
            max: max as f64,
            integer: true,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Relationship that must hold between two parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamConstraint {
    /// `values[lesser] < values[greater]`.
    LessThan { lesser: String, greater: String },
}

impl ParamConstraint {
    pub fn less_than(lesser: impl Into<String>, greater: impl Into<String>) -> Self {
        Self::LessThan {
            lesser: lesser.into(),
            greater: greater.into(),
        }
    }

    /// Whether `values` satisfies this constraint. Missing keys never satisfy it.
    pub fn is_satisfied(&self, values: &BTreeMap<String, f64>) -> bool {
        match self {
            Self::LessThan { lesser, greater } => match (values.get(lesser), values.get(greater)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for ParamConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LessThan { lesser, greater } => write!(f, "{lesser} < {greater}"),
        }
    }
}

/// Compact record of the metrics that won the last optimization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub sharpe: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: usize,
}

/// Rejected parameter update. The live parameter set is untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("parameter '{name}' is not finite")]
    NotFinite { name: String },
    #[error("parameter '{name}' = {value} outside [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("parameter '{name}' = {value} must be an integer")]
    NotInteger { name: String, value: f64 },
    #[error("constraint violated: {0}")]
    ConstraintViolated(ParamConstraint),
}

/// Named parameter values plus the bounds the optimizer may search.
///
/// `limits` are sanity ranges for fixed parameters: checked on every
/// update like `bounds`, but never searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub name: String,
    pub values: BTreeMap<String, f64>,
    #[serde(default)]
    pub bounds: BTreeMap<String, ParamBound>,
    #[serde(default)]
    pub limits: BTreeMap<String, ParamBound>,
    #[serde(default)]
    pub constraints: Vec<ParamConstraint>,
    #[serde(default)]
    pub performance: Option<PerformanceSnapshot>,
    pub last_updated: DateTime<Utc>,
}

impl StrategyParameters {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            bounds: BTreeMap::new(),
            limits: BTreeMap::new(),
            constraints: Vec::new(),
            performance: None,
            last_updated: Utc::now(),
        }
    }

    /// Add a fixed (non-optimized) parameter.
    pub fn with_value(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Add an optimizable parameter with its default and search bound.
    pub fn with_bounded(mut self, key: &str, value: f64, bound: ParamBound) -> Self {
        self.values.insert(key.to_string(), value);
        self.bounds.insert(key.to_string(), bound);
        self
    }

    /// Add a fixed parameter whose value must stay inside `limit`.
    pub fn with_limited(mut self, key: &str, value: f64, limit: ParamBound) -> Self {
        self.values.insert(key.to_string(), value);
        self.limits.insert(key.to_string(), limit);
        self
    }

    pub fn with_constraint(mut self, constraint: ParamConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Integer-valued parameter, rounded. Negative values clamp to 0.
    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .map(|v| v.round().max(0.0) as usize)
            .unwrap_or(default)
    }

    /// Check `candidate` against bounds and constraints without applying it.
    ///
    /// `candidate` may be a partial update; constraints are checked on the
    /// merged result.
    pub fn validate(&self, candidate: &BTreeMap<String, f64>) -> Result<(), ParameterError> {
        for (name, &value) in candidate {
            if !self.values.contains_key(name) {
                return Err(ParameterError::Unknown(name.clone()));
            }
            if !value.is_finite() {
                return Err(ParameterError::NotFinite { name: name.clone() });
            }
            if let Some(bound) = self.bounds.get(name).or_else(|| self.limits.get(name)) {
                if !bound.contains(value) {
                    return Err(ParameterError::OutOfBounds {
                        name: name.clone(),
                        value,
                        min: bound.min,
                        max: bound.max,
                    });
                }
                if bound.integer && (value - value.round()).abs() > INTEGER_TOLERANCE {
                    return Err(ParameterError::NotInteger {
                        name: name.clone(),
                        value,
                    });
                }
            }
        }

        let merged = self.merged(candidate);
        if let Some(violated) = self.constraints.iter().find(|c| !c.is_satisfied(&merged)) {
            return Err(ParameterError::ConstraintViolated(violated.clone()));
        }
        Ok(())
    }

    /// Validate then apply `candidate` in one step. On error nothing changes.
    pub fn apply(&mut self, candidate: &BTreeMap<String, f64>) -> Result<(), ParameterError> {
        self.validate(candidate)?;
        for (name, &value) in candidate {
            self.values.insert(name.clone(), value);
        }
        self.last_updated = Utc::now();
        Ok(())
    }

    /// Check the current values against bounds, limits and constraints.
    pub fn check(&self) -> Result<(), ParameterError> {
        let ranged: BTreeMap<String, f64> = self
            .bounds
            .keys()
            .chain(self.limits.keys())
            .filter_map(|k| self.values.get(k).map(|&v| (k.clone(), v)))
            .collect();
        self.validate(&ranged)
    }

    /// Whether every ranged value and every constraint currently holds.
    pub fn is_consistent(&self) -> bool {
        self.check().is_ok()
    }

    fn merged(&self, candidate: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut merged = self.values.clone();
        for (k, &v) in candidate {
            merged.insert(k.clone(), v);
        }
        merged
    }
}
