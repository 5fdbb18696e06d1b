//! Performance metrics — pure functions over per-trade returns.
//!
//! The optimizer's simulator produces one fractional return per closed trade.
//! Cumulative return is additive (single-unit position, no compounding);
//! ratios are per trade and not annualized.

use serde::{Deserialize, Serialize};
use sigforge_core::domain::PerformanceSnapshot;

/// Aggregate performance of one simulated replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub volatility: f64,
    pub avg_trade_return: f64,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from per-trade returns. No trades → all zeros.
    pub fn from_returns(returns: &[f64]) -> Self {
        if returns.is_empty() {
            return Self::default();
        }
        Self {
            total_return: total_return(returns),
            sharpe: sharpe_ratio(returns),
            sortino: sortino_ratio(returns),
            max_drawdown: max_drawdown(returns),
            win_rate: win_rate(returns),
            profit_factor: profit_factor(returns),
            trade_count: returns.len(),
            volatility: std_dev(returns),
            avg_trade_return: mean_f64(returns),
            max_consecutive_losses: max_consecutive_losses(returns),
        }
    }

    /// Compact form recorded on the winning parameter set.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            sharpe: self.sharpe,
            total_return: self.total_return,
            max_drawdown: self.max_drawdown,
            win_rate: self.win_rate,
            trade_count: self.trade_count,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Sum of per-trade returns.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().sum()
}

/// mean / std of per-trade returns. Returns 0.0 if variance is zero.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std
}

/// mean / downside deviation. Returns 0.0 when no trade lost.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / downside_std
}

/// Minimum of cumulative return minus its running maximum (≤ 0).
///
/// The running maximum starts at 0, so a losing first trade counts.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for r in returns {
        cumulative += r;
        peak = peak.max(cumulative);
        max_dd = max_dd.min(cumulative - peak);
    }
    max_dd
}

/// Fraction of trades with a positive return.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// Gross gains / gross losses, capped at 100.0 (all winners).
pub fn profit_factor(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Longest run of trades that did not make money.
pub fn max_consecutive_losses(returns: &[f64]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for &r in returns {
        if r <= 0.0 {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
