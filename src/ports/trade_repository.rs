//! Trade history port.

use crate::domain::error::EngineError;
use crate::domain::position::Position;

/// Append-only store of terminal positions (CLOSED or FAILED).
pub trait TradeRepository {
    fn append_trade(&self, position: &Position) -> Result<(), EngineError>;

    /// Stored trades in the order they were appended, optionally for one instrument.
    fn list_trades(&self, instrument: Option<&str>) -> Result<Vec<Position>, EngineError>;
}
