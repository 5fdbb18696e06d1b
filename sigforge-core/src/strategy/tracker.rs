//! Single-unit paper position and trade log kept by every strategy.
//!
//! A buy-side signal while flat opens a long; while short it closes the short
//! (realizing its return) and opens a long. Sell-side signals mirror this.
//! Signals in the direction of the open position are no-ops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::SignalKind;

/// Most recent closed trades retained for inspection; aggregates cover all.
const TRADE_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

/// A closed single-unit trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Price difference per unit, signed by side.
    pub pnl: f64,
    /// `pnl / entry_price`.
    pub return_pct: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Running performance of a strategy's paper position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub position: PositionSide,
    pub entry_price: Option<f64>,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub total_pnl: f64,
    pub total_return: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TradeTracker {
    position: PositionSide,
    entry: Option<(f64, DateTime<Utc>)>,
    recent: VecDeque<TradeRecord>,
    trade_count: usize,
    winning_trades: usize,
    total_pnl: f64,
    total_return: f64,
}

impl TradeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> PositionSide {
        self.position
    }

    /// Apply a signal at `price`. Returns the trade it closed, if any.
    pub fn on_signal(
        &mut self,
        kind: SignalKind,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<TradeRecord> {
        let target = if kind.is_buy_side() {
            PositionSide::Long
        } else if kind.is_sell_side() {
            PositionSide::Short
        } else {
            return None;
        };
        if self.position == target {
            return None;
        }

        let closed = self.close(price, timestamp);
        self.position = target;
        self.entry = Some((price, timestamp));
        closed
    }

    fn close(&mut self, exit_price: f64, exit_time: DateTime<Utc>) -> Option<TradeRecord> {
        let (entry_price, entry_time) = self.entry.take()?;
        let pnl = match self.position {
            PositionSide::Long => exit_price - entry_price,
            PositionSide::Short => entry_price - exit_price,
            PositionSide::Flat => return None,
        };
        let return_pct = if entry_price != 0.0 {
            pnl / entry_price
        } else {
            0.0
        };
        let record = TradeRecord {
            side: self.position,
            entry_price,
            exit_price,
            entry_time,
            exit_time,
            pnl,
            return_pct,
        };

        self.trade_count += 1;
        if record.is_winner() {
            self.winning_trades += 1;
        }
        self.total_pnl += pnl;
        self.total_return += return_pct;
        if self.recent.len() == TRADE_LOG_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(record.clone());
        self.position = PositionSide::Flat;
        Some(record)
    }

    /// Most recent closed trades, oldest first.
    pub fn recent_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.recent.iter()
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            position: self.position,
            entry_price: self.entry.map(|(p, _)| p),
            trade_count: self.trade_count,
            winning_trades: self.winning_trades,
            total_pnl: self.total_pnl,
            total_return: self.total_return,
            win_rate: if self.trade_count == 0 {
                0.0
            } else {
                self.winning_trades as f64 / self.trade_count as f64
            },
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(minute: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::minutes(minute)
    }

    #[test]
    fn buy_then_sell_closes_long_and_opens_short() {
        let mut tracker = TradeTracker::new();
        assert!(tracker.on_signal(SignalKind::Buy, 100.0, t(0)).is_none());
        assert_eq!(tracker.position(), PositionSide::Long);

        let closed = tracker.on_signal(SignalKind::Sell, 110.0, t(1)).unwrap();
        assert_eq!(closed.side, PositionSide::Long);
        assert!((closed.return_pct - 0.1).abs() < 1e-12);
        assert_eq!(tracker.position(), PositionSide::Short);

        let closed = tracker.on_signal(SignalKind::StrongBuy, 121.0, t(2)).unwrap();
        assert_eq!(closed.side, PositionSide::Short);
        assert!((closed.return_pct - (110.0 - 121.0) / 110.0).abs() < 1e-12);
    }

    #[test]
    fn same_direction_is_noop() {
        let mut tracker = TradeTracker::new();
        tracker.on_signal(SignalKind::Buy, 100.0, t(0));
        assert!(tracker.on_signal(SignalKind::StrongBuy, 90.0, t(1)).is_none());
        assert_eq!(tracker.summary().entry_price, Some(100.0));
        assert_eq!(tracker.summary().trade_count, 0);
    }

    #[test]
    fn hold_is_noop() {
        let mut tracker = TradeTracker::new();
        assert!(tracker.on_signal(SignalKind::Hold, 100.0, t(0)).is_none());
        assert_eq!(tracker.position(), PositionSide::Flat);
    }

    #[test]
    fn summary_aggregates() {
        let mut tracker = TradeTracker::new();
        tracker.on_signal(SignalKind::Buy, 100.0, t(0));
        tracker.on_signal(SignalKind::Sell, 105.0, t(1)); // long +5
        tracker.on_signal(SignalKind::Buy, 110.0, t(2)); // short -5
        let s = tracker.summary();
        assert_eq!(s.trade_count, 2);
        assert_eq!(s.winning_trades, 1);
        assert!((s.total_pnl - 0.0).abs() < 1e-12);
        assert!((s.win_rate - 0.5).abs() < 1e-12);
        assert_eq!(s.position, PositionSide::Long);
        assert_eq!(tracker.recent_trades().count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = TradeTracker::new();
        tracker.on_signal(SignalKind::Buy, 100.0, t(0));
        tracker.on_signal(SignalKind::Sell, 105.0, t(1));
        tracker.reset();
        assert_eq!(tracker.summary(), PerformanceSummary::default());
    }
}
