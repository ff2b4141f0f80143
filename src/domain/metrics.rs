//! Session statistics over recorded trades.

use std::collections::BTreeMap;

use crate::domain::position::{Position, PositionStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub starting_equity: f64,
    pub ending_equity: f64,
    pub closed_trades: usize,
    pub failed_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Largest peak-to-trough fall of equity, as a fraction of the peak.
    pub max_drawdown: f64,
    pub avg_hold_secs: f64,
    /// Closed trades per close reason, keyed by the reason code.
    pub by_reason: BTreeMap<&'static str, usize>,
}

impl SessionSummary {
    /// Summarise `trades` in the order they were recorded. FAILED trades are
    /// counted but contribute no PnL.
    pub fn compute(trades: &[Position], starting_equity: f64) -> Self {
        let mut closed_trades = 0usize;
        let mut failed_trades = 0usize;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_hold_secs = 0i64;
        let mut by_reason = BTreeMap::new();

        let mut equity = starting_equity;
        let mut peak = starting_equity;
        let mut max_drawdown = 0.0_f64;

        for trade in trades {
            match trade.status {
                PositionStatus::Failed => {
                    failed_trades += 1;
                    continue;
                }
                PositionStatus::Closed => closed_trades += 1,
                _ => continue,
            }

            if let Some(reason) = trade.close_reason {
                *by_reason.entry(reason.as_str()).or_insert(0) += 1;
            }
            if let Some(closed_at) = trade.closed_at {
                total_hold_secs += (closed_at - trade.opened_at).num_seconds();
            }

            let pnl = trade.realized_pnl.unwrap_or(0.0);
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }

            equity += pnl;
            if equity > peak {
                peak = equity;
            } else if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - equity) / peak);
            }
        }

        let win_rate = if closed_trades > 0 {
            trades_won as f64 / closed_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_hold_secs = if closed_trades > 0 {
            total_hold_secs as f64 / closed_trades as f64
        } else {
            0.0
        };

        SessionSummary {
            starting_equity,
            ending_equity: equity,
            closed_trades,
            failed_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            total_pnl: equity - starting_equity,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            max_drawdown,
            avg_hold_secs,
            by_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::CloseReason;
    use crate::domain::signal::Direction;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn closed(pnl: f64, reason: CloseReason, hold_secs: i64) -> Position {
        let opened = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut p = Position::open("BTCUSDT", Direction::Long, 100.0, 1_000.0, opened);
        p.begin_close(reason).unwrap();
        // exit price chosen so unrealized PnL equals `pnl`
        let exit = 100.0 + pnl / 10.0;
        p.confirm_close(exit, 0.0, opened + TimeDelta::seconds(hold_secs))
            .unwrap();
        p
    }

    fn failed() -> Position {
        let mut p = Position::open("BTCUSDT", Direction::Long, 100.0, 1_000.0, Utc::now());
        p.fail("rejected", Utc::now()).unwrap();
        p
    }

    #[test]
    fn empty_summary() {
        let s = SessionSummary::compute(&[], 10_000.0);
        assert_eq!(s.closed_trades, 0);
        assert!((s.win_rate - 0.0).abs() < f64::EPSILON);
        assert!((s.ending_equity - 10_000.0).abs() < f64::EPSILON);
        assert!(s.by_reason.is_empty());
    }

    #[test]
    fn wins_losses_and_failures() {
        let trades = vec![
            closed(20.0, CloseReason::TakeProfit, 60),
            closed(-10.0, CloseReason::StopLoss, 120),
            failed(),
            closed(0.0, CloseReason::Manual, 30),
        ];
        let s = SessionSummary::compute(&trades, 1_000.0);
        assert_eq!(s.closed_trades, 3);
        assert_eq!(s.failed_trades, 1);
        assert_eq!(s.trades_won, 1);
        assert_eq!(s.trades_lost, 1);
        assert_eq!(s.trades_breakeven, 1);
        assert!((s.total_pnl - 10.0).abs() < 1e-9);
        assert!((s.profit_factor - 2.0).abs() < 1e-9);
        assert!((s.largest_win - 20.0).abs() < 1e-9);
        assert!((s.largest_loss - 10.0).abs() < 1e-9);
        assert!((s.avg_hold_secs - 70.0).abs() < 1e-9);
        assert_eq!(s.by_reason.get("take_profit"), Some(&1));
        assert_eq!(s.by_reason.get("stop_loss"), Some(&1));
    }

    #[test]
    fn drawdown_from_peak() {
        let trades = vec![
            closed(100.0, CloseReason::TakeProfit, 1),
            closed(-55.0, CloseReason::StopLoss, 1),
            closed(-55.0, CloseReason::StopLoss, 1),
        ];
        let s = SessionSummary::compute(&trades, 1_000.0);
        // peak 1100, trough 990
        assert!((s.max_drawdown - 0.1).abs() < 1e-9);
    }

    #[test]
    fn only_wins_gives_infinite_profit_factor() {
        let trades = vec![closed(5.0, CloseReason::TakeProfit, 1)];
        let s = SessionSummary::compute(&trades, 1_000.0);
        assert!(s.profit_factor.is_infinite());
        assert!((s.win_rate - 1.0).abs() < f64::EPSILON);
    }
}
