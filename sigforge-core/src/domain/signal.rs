//! Trading signals — directional recommendations emitted by strategies.
//!
//! Signals are value objects: a strategy creates one, callbacks consume it,
//! nothing mutates it afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction and strength class of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
    StrongBuy,
    StrongSell,
}

impl SignalKind {
    pub fn is_buy_side(&self) -> bool {
        matches!(self, Self::Buy | Self::StrongBuy)
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, Self::Sell | Self::StrongSell)
    }

    /// +1 for buy-side, -1 for sell-side, 0 for hold.
    pub fn direction(&self) -> f64 {
        if self.is_buy_side() {
            1.0
        } else if self.is_sell_side() {
            -1.0
        } else {
            0.0
        }
    }

    /// Upgrade a plain BUY/SELL to its STRONG variant.
    pub fn strengthened(self) -> Self {
        match self {
            Self::Buy => Self::StrongBuy,
            Self::Sell => Self::StrongSell,
            other => other,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::StrongBuy => "STRONG_BUY",
            Self::StrongSell => "STRONG_SELL",
        };
        f.write_str(s)
    }
}

/// A directional recommendation with a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub kind: SignalKind,
    /// Strength score, always clamped to `[0, 1]`.
    pub confidence: f64,
    /// Reference price at emission.
    pub price: f64,
    /// Suggested quantity (units of the instrument).
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
    /// Name of the originating strategy.
    pub strategy: String,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Indicator values and votes that justified the signal.
    pub metadata: HashMap<String, f64>,
}

impl TradingSignal {
    /// Create a signal; `confidence` is clamped to `[0, 1]` (NaN becomes 0).
    pub fn new(
        symbol: impl Into<String>,
        kind: SignalKind,
        confidence: f64,
        price: f64,
        timestamp: DateTime<Utc>,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            confidence: clamp_unit(confidence),
            price,
            quantity: 1.0,
            timestamp,
            strategy: strategy.into(),
            stop_loss: None,
            take_profit: None,
            metadata: HashMap::new(),
        }
    }
}

/// Clamp a probability-like quantity into `[0, 1]`; NaN maps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
