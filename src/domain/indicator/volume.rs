//! Volume ratio: current bar volume / mean volume of the trailing n bars
//! (current bar included).

use crate::domain::candle::Candle;

pub const DEFAULT_PERIOD: usize = 20;
pub const HIGH_RATIO: f64 = 1.5;
pub const ADEQUATE_RATIO: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    High,
    Adequate,
    Low,
}

/// Returns 0.0 when the trailing window carries no volume at all.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let avg = window.iter().map(|c| c.volume).sum::<f64>() / period as f64;
    let current = window[window.len() - 1].volume;
    if avg <= 0.0 {
        return Some(0.0);
    }
    Some(current / avg)
}

pub fn classify(ratio: f64) -> VolumeLevel {
    if ratio > HIGH_RATIO {
        VolumeLevel::High
    } else if ratio > ADEQUATE_RATIO {
        VolumeLevel::Adequate
    } else {
        VolumeLevel::Low
    }
}
