//! Candle pattern flags from the last two bars.
//!
//! - Engulfing: colour reversal where the newest body contains the previous body.
//! - Doji: body under 10% of the range.
//! - Wick rejection: wick longer than 2x the body and over 30% of the range.

use crate::domain::candle::Candle;

const DOJI_BODY_RATIO: f64 = 0.1;
const WICK_BODY_MULT: f64 = 2.0;
const WICK_RANGE_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandlePatterns {
    pub bullish_engulfing: bool,
    pub bearish_engulfing: bool,
    pub doji: bool,
    pub upper_wick_rejection: bool,
    pub lower_wick_rejection: bool,
}

impl CandlePatterns {
    /// Any pattern that reads as a rejection of higher prices.
    pub fn bearish_reversal(&self) -> bool {
        self.bearish_engulfing || self.upper_wick_rejection || self.doji
    }

    /// Any pattern that reads as a rejection of lower prices.
    pub fn bullish_reversal(&self) -> bool {
        self.bullish_engulfing || self.lower_wick_rejection || self.doji
    }
}

pub fn detect(candles: &[Candle]) -> CandlePatterns {
    let Some(current) = candles.last() else {
        return CandlePatterns::default();
    };

    let mut patterns = CandlePatterns::default();
    let body = current.body();
    let range = current.range();

    if range > 0.0 {
        patterns.doji = body < DOJI_BODY_RATIO * range;

        let upper = current.upper_wick();
        let lower = current.lower_wick();
        patterns.upper_wick_rejection =
            upper > WICK_BODY_MULT * body && upper > WICK_RANGE_RATIO * range;
        patterns.lower_wick_rejection =
            lower > WICK_BODY_MULT * body && lower > WICK_RANGE_RATIO * range;
    }

    if candles.len() >= 2 {
        let previous = &candles[candles.len() - 2];
        patterns.bullish_engulfing = previous.is_bearish()
            && current.is_bullish()
            && current.open <= previous.close
            && current.close >= previous.open;
        patterns.bearish_engulfing = previous.is_bullish()
            && current.is_bearish()
            && current.open >= previous.close
            && current.close <= previous.open;
    }

    patterns
}
