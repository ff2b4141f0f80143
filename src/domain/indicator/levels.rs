//! Support and resistance from the trailing n bars.
//!
//! Support is the lowest low, resistance the highest high. Price is "near"
//! support when it sits within 2% above it, "near" resistance when within 2%
//! below it.

use crate::domain::candle::Candle;

pub const DEFAULT_PERIOD: usize = 20;
pub const PROXIMITY_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevels {
    pub support: f64,
    pub resistance: f64,
}

impl PriceLevels {
    pub fn near_support(&self, price: f64) -> bool {
        price >= self.support && price <= self.support * (1.0 + PROXIMITY_PCT / 100.0)
    }

    pub fn near_resistance(&self, price: f64) -> bool {
        price <= self.resistance && price >= self.resistance * (1.0 - PROXIMITY_PCT / 100.0)
    }
}

pub fn price_levels(candles: &[Candle], period: usize) -> Option<PriceLevels> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let support = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = window
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    Some(PriceLevels {
        support,
        resistance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64, high: f64, low: f64) -> Candle {
        Candle {
            open_time: i * 60_000,
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1.0,
        }
    }

    #[test]
    fn levels_from_trailing_window() {
        let mut candles = vec![bar(0, 500.0, 1.0)];
        candles.extend((1..=20).map(|i| bar(i, 100.0 + i as f64, 90.0 + i as f64)));
        let levels = price_levels(&candles, 20).unwrap();
        assert!((levels.support - 91.0).abs() < f64::EPSILON);
        assert!((levels.resistance - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn near_support_band() {
        let levels = PriceLevels {
            support: 100.0,
            resistance: 120.0,
        };
        assert!(levels.near_support(100.0));
        assert!(levels.near_support(101.9));
        assert!(!levels.near_support(102.5));
        assert!(!levels.near_support(99.0));
    }

    #[test]
    fn near_resistance_band() {
        let levels = PriceLevels {
            support: 80.0,
            resistance: 100.0,
        };
        assert!(levels.near_resistance(100.0));
        assert!(levels.near_resistance(98.5));
        assert!(!levels.near_resistance(97.0));
        assert!(!levels.near_resistance(101.0));
    }

    #[test]
    fn levels_insufficient() {
        let candles = vec![bar(0, 10.0, 9.0)];
        assert!(price_levels(&candles, 20).is_none());
    }
}
