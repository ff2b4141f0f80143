//! RSI (Relative Strength Index) over the trailing window.
//!
//! Uses the Wilder seed average: mean gain and mean loss over the last n
//! close-to-close changes (n+1 closes).
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, unless avg_gain is also 0 (flat window): RSI = 50.
//!
//! "Previous RSI" is the same calculation with the newest close dropped, and
//! the pair classifies momentum: rising if current > previous + 2, falling if
//! current < previous - 2.

pub const DEFAULT_PERIOD: usize = 14;
const MOMENTUM_BAND: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiMomentum {
    Rising,
    Falling,
    Flat,
}

pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - (period + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    Some(value)
}

/// RSI over the window shifted back by one candle.
pub fn previous_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() {
        return None;
    }
    rsi(&closes[..closes.len() - 1], period)
}

pub fn classify_momentum(current: f64, previous: f64) -> RsiMomentum {
    if current > previous + MOMENTUM_BAND {
        RsiMomentum::Rising
    } else if current < previous - MOMENTUM_BAND {
        RsiMomentum::Falling
    } else {
        RsiMomentum::Flat
    }
}
