//! MACD (Moving Average Convergence Divergence) on closes.
//!
//! MACD Line = EMA(fast) - EMA(slow), both trailing-window EMAs.
//! Crossover/crossunder compares the sign of the current line against the line
//! computed one candle earlier.
//!
//! Default parameters: fast=12, slow=26

use crate::domain::indicator::ema::ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCross {
    /// Line moved from <= 0 to > 0.
    Bullish,
    /// Line moved from >= 0 to < 0.
    Bearish,
    None,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize) -> Option<f64> {
    Some(ema(closes, fast)? - ema(closes, slow)?)
}

pub fn macd_default(closes: &[f64]) -> Option<f64> {
    macd(closes, DEFAULT_FAST, DEFAULT_SLOW)
}

/// MACD line over the window shifted back by one candle.
pub fn previous_macd_default(closes: &[f64]) -> Option<f64> {
    if closes.is_empty() {
        return None;
    }
    macd_default(&closes[..closes.len() - 1])
}

pub fn classify_cross(current: f64, previous: f64) -> MacdCross {
    if previous <= 0.0 && current > 0.0 {
        MacdCross::Bullish
    } else if previous >= 0.0 && current < 0.0 {
        MacdCross::Bearish
    } else {
        MacdCross::None
    }
}
