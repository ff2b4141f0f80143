//! Paper execution: fills at the quoted price adjusted for slippage, with a
//! percentage commission on notional.
//!
//! Failures can be injected to exercise the settlement-failure path.

use std::cell::Cell;

use tracing::debug;

use crate::domain::config::AccountSettings;
use crate::domain::error::EngineError;
use crate::domain::position::Position;
use crate::domain::signal::Direction;
use crate::ports::execution_port::{ExecutionPort, Fill};

/// Commission on a notional: value * pct / 100.
pub fn calculate_commission(notional: f64, commission_pct: f64) -> f64 {
    notional * commission_pct / 100.0
}

/// Buying (long entry, short exit) pays up; selling gives up.
pub fn apply_slippage(market_price: f64, slippage_pct: f64, buying: bool) -> f64 {
    if buying {
        market_price * (1.0 + slippage_pct / 100.0)
    } else {
        market_price * (1.0 - slippage_pct / 100.0)
    }
}

#[derive(Debug, Default)]
pub struct PaperExecution {
    slippage_pct: f64,
    commission_pct: f64,
    fail_remaining: Cell<u32>,
    fills: Cell<u32>,
}

impl PaperExecution {
    pub fn new(slippage_pct: f64, commission_pct: f64) -> Self {
        PaperExecution {
            slippage_pct,
            commission_pct,
            ..Default::default()
        }
    }

    pub fn from_settings(account: &AccountSettings) -> Self {
        Self::new(account.slippage_pct, account.commission_pct)
    }

    /// Reject the next `n` submissions.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.set(n);
    }

    pub fn fill_count(&self) -> u32 {
        self.fills.get()
    }

    fn settle(&self, buying: bool, size: f64, price: f64) -> Result<Fill, EngineError> {
        let pending = self.fail_remaining.get();
        if pending > 0 {
            self.fail_remaining.set(pending - 1);
            return Err(EngineError::Settlement {
                reason: "paper execution rejected the order".to_string(),
            });
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(EngineError::Settlement {
                reason: format!("cannot fill at price {price}"),
            });
        }
        let fill_price = apply_slippage(price, self.slippage_pct, buying);
        let commission = calculate_commission(size, self.commission_pct);
        self.fills.set(self.fills.get() + 1);
        debug!(fill_price, commission, buying, "paper fill");
        Ok(Fill {
            price: fill_price,
            commission,
        })
    }
}

impl ExecutionPort for PaperExecution {
    fn submit_open(
        &self,
        _instrument: &str,
        direction: Direction,
        size: f64,
        price: f64,
    ) -> Result<Fill, EngineError> {
        self.settle(direction == Direction::Long, size, price)
    }

    fn submit_close(&self, position: &Position, price: f64) -> Result<Fill, EngineError> {
        self.settle(position.direction == Direction::Short, position.size, price)
    }
}
