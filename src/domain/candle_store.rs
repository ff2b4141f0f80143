//! Bounded candle window for one (instrument, interval) pair.
//!
//! Bars are append-only and must arrive strictly one interval apart.
//! Duplicates, out-of-order bars, gaps and malformed bars are rejected here so
//! the indicator library only ever sees a contiguous, chronological window.

use tracing::warn;

use crate::domain::candle::Candle;
use crate::domain::error::{DiscontinuityKind, EngineError};
use crate::domain::indicator::MIN_CANDLES;

pub const DEFAULT_WINDOW: usize = 200;

#[derive(Debug, Clone)]
pub struct CandleStore {
    instrument: String,
    interval_ms: i64,
    capacity: usize,
    candles: Vec<Candle>,
}

/// Outcome of a batch ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub appended: usize,
    pub already_stored: usize,
}

impl CandleStore {
    /// Capacity is raised to [`MIN_CANDLES`] if smaller, so a full store can
    /// always be evaluated.
    pub fn new(instrument: impl Into<String>, interval_ms: i64, capacity: usize) -> Self {
        Self {
            instrument: instrument.into(),
            interval_ms,
            capacity: capacity.max(MIN_CANDLES),
            candles: Vec::new(),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// True once the window holds enough bars for signal evaluation.
    pub fn is_ready(&self) -> bool {
        self.candles.len() >= MIN_CANDLES
    }

    pub fn window(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Append one bar, enforcing ordering and contiguity.
    pub fn append(&mut self, candle: Candle) -> Result<(), EngineError> {
        if !candle.is_well_formed() {
            return Err(self.discontinuity(DiscontinuityKind::InvalidBar, candle.open_time));
        }

        if let Some(last) = self.candles.last() {
            let kind = if candle.open_time == last.open_time {
                Some(DiscontinuityKind::Duplicate)
            } else if candle.open_time < last.open_time {
                Some(DiscontinuityKind::OutOfOrder)
            } else if candle.open_time - last.open_time != self.interval_ms {
                Some(DiscontinuityKind::Gap)
            } else {
                None
            };
            if let Some(kind) = kind {
                return Err(self.discontinuity(kind, candle.open_time));
            }
        }

        self.candles.push(candle);
        if self.candles.len() > self.capacity {
            let excess = self.candles.len() - self.capacity;
            self.candles.drain(..excess);
        }
        Ok(())
    }

    /// Merge a feed batch (typically an overlapping "last N bars" poll).
    ///
    /// Bars at or before the newest stored bar are skipped and counted; the
    /// remainder must continue the window without gaps. The batch is checked
    /// before anything is appended, so a rejected batch leaves the store as it was.
    pub fn ingest(&mut self, batch: &[Candle]) -> Result<IngestReport, EngineError> {
        let newest = self.candles.last().map(|c| c.open_time);
        let mut report = IngestReport::default();
        let mut fresh: Vec<Candle> = Vec::with_capacity(batch.len());

        for candle in batch {
            match newest {
                Some(t) if candle.open_time <= t => report.already_stored += 1,
                _ => fresh.push(*candle),
            }
        }

        let mut staged = self.clone();
        for candle in fresh {
            staged.append(candle)?;
            report.appended += 1;
        }
        *self = staged;
        Ok(report)
    }

    /// Drop every stored bar, e.g. before a resync after a rejected gap.
    pub fn reset(&mut self) {
        self.candles.clear();
    }

    fn discontinuity(&self, kind: DiscontinuityKind, open_time: i64) -> EngineError {
        warn!(
            instrument = %self.instrument,
            open_time,
            "rejected {}",
            kind
        );
        EngineError::DataDiscontinuity {
            instrument: self.instrument.clone(),
            kind,
            open_time,
        }
    }
}
