//! Market data port.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

pub trait MarketDataPort {
    /// Most recent `limit` closed bars for `instrument`, oldest first.
    fn fetch_candles(
        &self,
        instrument: &str,
        interval_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError>;

    /// Default implementation: close of the newest bar.
    fn latest_price(&self, instrument: &str, interval_ms: i64) -> Result<f64, EngineError> {
        self.fetch_candles(instrument, interval_ms, 1)?
            .last()
            .map(|c| c.close)
            .ok_or_else(|| EngineError::MarketData {
                reason: format!("no candles available for {instrument}"),
            })
    }
}
