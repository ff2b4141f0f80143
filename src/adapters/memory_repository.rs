//! In-memory trade history.

use std::cell::RefCell;

use crate::domain::error::EngineError;
use crate::domain::position::Position;
use crate::ports::trade_repository::TradeRepository;

#[derive(Debug, Default)]
pub struct MemoryTradeRepository {
    trades: RefCell<Vec<Position>>,
}

impl MemoryTradeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trades.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.borrow().is_empty()
    }
}

impl TradeRepository for MemoryTradeRepository {
    fn append_trade(&self, position: &Position) -> Result<(), EngineError> {
        let mut trades = self.trades.borrow_mut();
        if trades.iter().any(|t| t.id == position.id) {
            return Err(EngineError::DatabaseQuery {
                reason: format!("trade {} already recorded", position.id),
            });
        }
        trades.push(position.clone());
        Ok(())
    }

    fn list_trades(&self, instrument: Option<&str>) -> Result<Vec<Position>, EngineError> {
        Ok(self
            .trades
            .borrow()
            .iter()
            .filter(|t| instrument.is_none_or(|i| t.instrument == i))
            .cloned()
            .collect())
    }
}
