//! Position record and its guarded state transitions.
//!
//! ```text
//! OPEN -> CLOSING -> CLOSED
//!   \        \
//!    +--------+----> FAILED   (settlement error)
//! ```
//!
//! Positions are never destroyed; terminal ones are kept as history.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::domain::error::EngineError;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closing,
    Closed,
    Failed,
}

impl PositionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closing => "CLOSING",
            PositionStatus::Closed => "CLOSED",
            PositionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<PositionStatus> {
        match s {
            "OPEN" => Some(PositionStatus::Open),
            "CLOSING" => Some(PositionStatus::Closing),
            "CLOSED" => Some(PositionStatus::Closed),
            "FAILED" => Some(PositionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PositionStatus::Closed | PositionStatus::Failed)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    SignalFlip,
    Manual,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::TakeProfit => "take_profit",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::SignalFlip => "signal_flip",
            CloseReason::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<CloseReason> {
        match s {
            "take_profit" => Some(CloseReason::TakeProfit),
            "stop_loss" => Some(CloseReason::StopLoss),
            "signal_flip" => Some(CloseReason::SignalFlip),
            "manual" => Some(CloseReason::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// Notional in quote currency.
    pub size: f64,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
    pub take_profit_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub trailing_stop_activated: bool,
    /// Best favourable move seen while open, in percent.
    pub peak_change_pct: f64,
    pub entry_commission: f64,
    pub exit_price: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub close_reason: Option<CloseReason>,
    pub closed_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl Position {
    pub fn open(
        instrument: &str,
        direction: Direction,
        entry_price: f64,
        size: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Position {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            direction,
            entry_price,
            size,
            opened_at,
            status: PositionStatus::Open,
            take_profit_price: None,
            stop_loss_price: None,
            trailing_stop_activated: false,
            peak_change_pct: 0.0,
            entry_commission: 0.0,
            exit_price: None,
            realized_pnl: None,
            close_reason: None,
            closed_at: None,
            failure: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Percent move from entry, positive when the move favours the position.
    pub fn price_change_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (price - self.entry_price) / self.entry_price * 100.0;
        match self.direction {
            Direction::Long => raw,
            Direction::Short => -raw,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * self.price_change_pct(price) / 100.0
    }

    pub fn held_for(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.opened_at
    }

    /// Track the best favourable move while the position is open.
    pub fn observe_price(&mut self, price: f64) {
        if self.is_open() {
            let pct = self.price_change_pct(price);
            if pct > self.peak_change_pct {
                self.peak_change_pct = pct;
            }
        }
    }

    pub fn activate_trailing_stop(&mut self) {
        if self.is_open() {
            self.trailing_stop_activated = true;
        }
    }

    pub fn begin_close(&mut self, reason: CloseReason) -> Result<(), EngineError> {
        self.transition(PositionStatus::Open, PositionStatus::Closing)?;
        self.close_reason = Some(reason);
        Ok(())
    }

    pub fn confirm_close(
        &mut self,
        exit_price: f64,
        exit_commission: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.transition(PositionStatus::Closing, PositionStatus::Closed)?;
        self.exit_price = Some(exit_price);
        self.realized_pnl =
            Some(self.unrealized_pnl(exit_price) - self.entry_commission - exit_commission);
        self.closed_at = Some(closed_at);
        Ok(())
    }

    /// Settlement failed. Reachable from OPEN and CLOSING only.
    pub fn fail(&mut self, reason: &str, at: DateTime<Utc>) -> Result<(), EngineError> {
        match self.status {
            PositionStatus::Open | PositionStatus::Closing => {
                self.status = PositionStatus::Failed;
                self.failure = Some(reason.to_string());
                self.closed_at = Some(at);
                Ok(())
            }
            other => Err(EngineError::InvalidTransition {
                from: other.to_string(),
                to: PositionStatus::Failed.to_string(),
            }),
        }
    }

    fn transition(&mut self, from: PositionStatus, to: PositionStatus) -> Result<(), EngineError> {
        if self.status != from {
            return Err(EngineError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
