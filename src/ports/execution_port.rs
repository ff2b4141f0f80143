//! Execution port: the layer that actually settles trades.
//!
//! Any error returned here is a settlement failure. The session marks the
//! affected position FAILED and never retries on its own.

use crate::domain::error::EngineError;
use crate::domain::position::Position;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: f64,
    /// Fee in quote currency.
    pub commission: f64,
}

pub trait ExecutionPort {
    fn submit_open(
        &self,
        instrument: &str,
        direction: Direction,
        size: f64,
        price: f64,
    ) -> Result<Fill, EngineError>;

    fn submit_close(&self, position: &Position, price: f64) -> Result<Fill, EngineError>;
}
