//! Immediate (last few bars) momentum.
//!
//! Body sizes are judged against the mean body of the trailing 10 bars: above
//! 1.5x is large, above 2.5x very large. Strong short-term momentum needs at
//! least 2 of the last 3 bars in one colour plus a 3-bar close-to-close move of
//! at least 0.5% in the same direction.

use crate::domain::candle::{Candle, CandleBias};

pub const BODY_PERIOD: usize = 10;
pub const LARGE_BODY_MULT: f64 = 1.5;
pub const VERY_LARGE_BODY_MULT: f64 = 2.5;
pub const STRONG_MOVE_PCT: f64 = 0.5;
const RUN_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySize {
    Normal,
    Large,
    VeryLarge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImmediateMomentum {
    pub average_body: f64,
    pub last_body: f64,
    pub last_bias: CandleBias,
    /// Bullish bars among the last three.
    pub bullish_count: usize,
    /// Bearish bars among the last three.
    pub bearish_count: usize,
    /// Close-to-close change over the last three bars, in percent.
    pub change_pct: f64,
}

impl ImmediateMomentum {
    pub fn body_size(&self) -> BodySize {
        if self.average_body <= 0.0 {
            return BodySize::Normal;
        }
        let ratio = self.last_body / self.average_body;
        if ratio > VERY_LARGE_BODY_MULT {
            BodySize::VeryLarge
        } else if ratio > LARGE_BODY_MULT {
            BodySize::Large
        } else {
            BodySize::Normal
        }
    }

    /// Direction of strong short-term momentum, `Neutral` when there is none.
    pub fn bias(&self) -> CandleBias {
        if self.bullish_count >= 2 && self.change_pct >= STRONG_MOVE_PCT {
            CandleBias::Bullish
        } else if self.bearish_count >= 2 && self.change_pct <= -STRONG_MOVE_PCT {
            CandleBias::Bearish
        } else {
            CandleBias::Neutral
        }
    }
}

pub fn immediate_momentum(candles: &[Candle]) -> Option<ImmediateMomentum> {
    if candles.len() < RUN_LENGTH + 1 {
        return None;
    }

    let body_window = &candles[candles.len().saturating_sub(BODY_PERIOD)..];
    let average_body =
        body_window.iter().map(Candle::body).sum::<f64>() / body_window.len() as f64;

    let last = candles[candles.len() - 1];
    let run = &candles[candles.len() - RUN_LENGTH..];
    let bullish_count = run.iter().filter(|c| c.is_bullish()).count();
    let bearish_count = run.iter().filter(|c| c.is_bearish()).count();

    let base = candles[candles.len() - RUN_LENGTH - 1].close;
    let change_pct = if base > 0.0 {
        (last.close - base) / base * 100.0
    } else {
        0.0
    };

    Some(ImmediateMomentum {
        average_body,
        last_body: last.body(),
        last_bias: last.bias(),
        bullish_count,
        bearish_count,
        change_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high: open.max(close) + 0.1,
            low: open.min(close) - 0.1,
            close,
            volume: 1.0,
        }
    }

    fn quiet_run(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    candle(100.0, 100.2)
                } else {
                    candle(100.2, 100.0)
                }
            })
            .collect()
    }

    #[test]
    fn strong_bullish_momentum() {
        let mut candles = quiet_run(8);
        candles.push(candle(100.0, 100.3));
        candles.push(candle(100.3, 100.2));
        candles.push(candle(100.2, 100.8));
        let m = immediate_momentum(&candles).unwrap();
        assert_eq!(m.bullish_count, 2);
        assert_eq!(m.bearish_count, 1);
        assert!((m.change_pct - 0.8).abs() < 1e-9);
        assert_eq!(m.bias(), CandleBias::Bullish);
    }

    #[test]
    fn strong_bearish_momentum() {
        let mut candles = quiet_run(8);
        candles.push(candle(100.0, 99.7));
        candles.push(candle(99.7, 99.5));
        candles.push(candle(99.5, 99.2));
        let m = immediate_momentum(&candles).unwrap();
        assert_eq!(m.bearish_count, 3);
        assert_eq!(m.bias(), CandleBias::Bearish);
    }

    #[test]
    fn small_move_is_neutral() {
        let mut candles = quiet_run(8);
        candles.push(candle(100.0, 100.1));
        candles.push(candle(100.1, 100.2));
        candles.push(candle(100.2, 100.3));
        let m = immediate_momentum(&candles).unwrap();
        assert_eq!(m.bullish_count, 3);
        assert_eq!(m.bias(), CandleBias::Neutral);
    }

    #[test]
    fn very_large_body() {
        let mut candles = quiet_run(9);
        candles.push(candle(100.0, 98.0));
        let m = immediate_momentum(&candles).unwrap();
        // avg body = (9 * 0.2 + 2.0) / 10 = 0.38; 2.0 / 0.38 > 2.5
        assert_eq!(m.body_size(), BodySize::VeryLarge);
        assert_eq!(m.last_bias, CandleBias::Bearish);
    }

    #[test]
    fn large_body() {
        let mut candles = quiet_run(9);
        candles.push(candle(100.0, 100.4));
        let m = immediate_momentum(&candles).unwrap();
        // avg body = (9 * 0.2 + 0.4) / 10 = 0.22; 0.4 / 0.22 ~ 1.8
        assert_eq!(m.body_size(), BodySize::Large);
    }

    #[test]
    fn flat_bodies_are_normal() {
        let candles = vec![candle(100.0, 100.0); 10];
        let m = immediate_momentum(&candles).unwrap();
        assert_eq!(m.body_size(), BodySize::Normal);
    }

    #[test]
    fn insufficient() {
        assert!(immediate_momentum(&quiet_run(3)).is_none());
    }
}
