//! Swing structure over the trailing bars.
//!
//! Counts strict higher lows and strict lower highs between consecutive bars
//! of the trailing window (10 bars give 9 comparisons). A strong uptrend needs
//! at least 6 higher lows and stacked averages SMA7 > SMA20 > SMA50; a strong
//! downtrend is the mirror image.

use crate::domain::candle::Candle;

pub const DEFAULT_PERIOD: usize = 10;
pub const STRONG_TREND_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrendStructure {
    pub higher_lows: usize,
    pub lower_highs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendState {
    StrongUptrend,
    StrongDowntrend,
    Mixed,
}

impl TrendStructure {
    pub fn rising(&self) -> bool {
        self.higher_lows >= STRONG_TREND_COUNT
    }

    pub fn falling(&self) -> bool {
        self.lower_highs >= STRONG_TREND_COUNT
    }
}

pub fn structure(candles: &[Candle], period: usize) -> TrendStructure {
    let start = candles.len().saturating_sub(period);
    let window = &candles[start..];
    let mut out = TrendStructure::default();
    for pair in window.windows(2) {
        if pair[1].low > pair[0].low {
            out.higher_lows += 1;
        }
        if pair[1].high < pair[0].high {
            out.lower_highs += 1;
        }
    }
    out
}

pub fn classify(structure: &TrendStructure, sma7: f64, sma20: f64, sma50: f64) -> TrendState {
    if structure.rising() && sma7 > sma20 && sma20 > sma50 {
        TrendState::StrongUptrend
    } else if structure.falling() && sma7 < sma20 && sma20 < sma50 {
        TrendState::StrongDowntrend
    } else {
        TrendState::Mixed
    }
}
