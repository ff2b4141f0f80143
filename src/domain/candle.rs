//! Fixed-interval OHLCV candle.

use chrono::{DateTime, Utc};

/// Colour of a candle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleBias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Bar open time in milliseconds since the Unix epoch.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// |close - open|
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn bias(&self) -> CandleBias {
        if self.close > self.open {
            CandleBias::Bullish
        } else if self.close < self.open {
            CandleBias::Bearish
        } else {
            CandleBias::Neutral
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.bias() == CandleBias::Bullish
    }

    pub fn is_bearish(&self) -> bool {
        self.bias() == CandleBias::Bearish
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    /// Finite prices, high >= every other price, low <= every other price,
    /// non-negative volume.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}
