//! Position lifecycle policy.
//!
//! One priority-ordered decision per tick. Turbo mode:
//!
//! 1. win lock-in at `take_profit_percent`
//! 2. profit protection on a signal flip or adverse short-term momentum
//! 3. emergency stop at `-stop_loss_percent` (ignores the minimum hold)
//! 4. otherwise hold, including while underwater
//!
//! Normal mode waits out the minimum hold, then checks take-profit,
//! stop-loss, the optional signal-flip close and the optional trailing stop.

use chrono::{DateTime, Utc};

use crate::domain::config::TradingConfiguration;
use crate::domain::position::{CloseReason, Position};
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    WinLockIn,
    ProfitProtection,
    EmergencyStop,
    TakeProfit,
    StopLoss,
    SignalFlip,
    TrailingStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    NotOpen,
    MinHoldPending,
    Underwater,
    NoTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseDecision {
    pub reason: CloseReason,
    pub rule: ExitRule,
    pub price_change_pct: f64,
    pub request_reopen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyDecision {
    Hold(HoldReason),
    ActivateTrailingStop,
    Close(CloseDecision),
}

impl PolicyDecision {
    pub fn is_close(&self) -> bool {
        matches!(self, PolicyDecision::Close(_))
    }
}

pub fn evaluate_position(
    position: &Position,
    price: f64,
    now: DateTime<Utc>,
    signal: Option<&Signal>,
    config: &TradingConfiguration,
) -> PolicyDecision {
    if !position.is_open() {
        return PolicyDecision::Hold(HoldReason::NotOpen);
    }

    let pct = position.price_change_pct(price);
    let held = position.held_for(now) >= config.min_hold();
    let close = |reason, rule| {
        PolicyDecision::Close(CloseDecision {
            reason,
            rule,
            price_change_pct: pct,
            request_reopen: wants_reopen(pct, config),
        })
    };

    if config.turbo_mode {
        if held && pct >= config.take_profit_percent {
            return close(CloseReason::TakeProfit, ExitRule::WinLockIn);
        }
        if held && pct > config.profit_protect_percent && turning_against(position, signal) {
            return close(CloseReason::TakeProfit, ExitRule::ProfitProtection);
        }
        if pct <= -config.stop_loss_percent {
            return close(CloseReason::StopLoss, ExitRule::EmergencyStop);
        }
        return if pct <= 0.0 {
            PolicyDecision::Hold(HoldReason::Underwater)
        } else {
            PolicyDecision::Hold(HoldReason::NoTrigger)
        };
    }

    if !held {
        return PolicyDecision::Hold(HoldReason::MinHoldPending);
    }
    if config.take_profit_enabled && pct >= config.take_profit_percent {
        return close(CloseReason::TakeProfit, ExitRule::TakeProfit);
    }
    if config.stop_loss_enabled && pct <= -config.stop_loss_percent {
        return close(CloseReason::StopLoss, ExitRule::StopLoss);
    }
    if config.close_on_signal_flip {
        if let Some(s) = signal {
            if s.direction != position.direction
                && s.actionable
                && s.confidence >= config.min_confidence
            {
                return close(CloseReason::SignalFlip, ExitRule::SignalFlip);
            }
        }
    }
    if config.trailing_stop_enabled {
        let peak = position.peak_change_pct.max(pct);
        if !position.trailing_stop_activated {
            if peak >= config.trailing_activation_percent {
                return PolicyDecision::ActivateTrailingStop;
            }
        } else if peak - pct >= config.trailing_distance_percent {
            let reason = if pct > 0.0 {
                CloseReason::TakeProfit
            } else {
                CloseReason::StopLoss
            };
            return close(reason, ExitRule::TrailingStop);
        }
    }

    PolicyDecision::Hold(HoldReason::NoTrigger)
}

fn turning_against(position: &Position, signal: Option<&Signal>) -> bool {
    signal.is_some_and(|s| {
        s.direction != position.direction
            || s.short_term_bias == position.direction.opposite().favourable_bias()
    })
}

fn wants_reopen(pct: f64, config: &TradingConfiguration) -> bool {
    config.auto_reopen_enabled && (pct >= 0.0 || config.auto_reopen_on_loss)
}
