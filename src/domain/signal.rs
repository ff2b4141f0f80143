//! Scored trade signal.

use std::fmt;

use crate::domain::candle::CandleBias;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Parse the stored form written by [`Direction::as_str`].
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Some(Direction::Long),
            "SHORT" => Some(Direction::Short),
            _ => None,
        }
    }

    /// Candle colour that moves price in this direction's favour.
    pub fn favourable_bias(self) -> CandleBias {
        match self {
            Direction::Long => CandleBias::Bullish,
            Direction::Short => CandleBias::Bearish,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the last-candle momentum check did to the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumOverride {
    /// A very large opposite candle flipped the direction.
    Flipped { from: Direction },
    /// A very large opposite candle without enough support to flip.
    Penalized,
    /// A large opposite candle.
    LargeCandlePenalty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityFlags {
    pub meets_min_confidence: bool,
    pub meets_min_risk_reward: bool,
    pub passes_volume_filter: bool,
    pub passes_trend_filter: bool,
}

impl QualityFlags {
    pub fn is_quality(&self) -> bool {
        self.meets_min_confidence
            && self.meets_min_risk_reward
            && self.passes_volume_filter
            && self.passes_trend_filter
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    /// Always within 20..=95.
    pub confidence: u8,
    /// Conditions satisfied on the chosen side.
    pub conditions_met: u8,
    pub long_conditions: u8,
    pub short_conditions: u8,
    pub risk_reward: f64,
    pub quality: QualityFlags,
    /// Cleared when a momentum penalty leaves the signal unfit for entry.
    pub actionable: bool,
    /// Set when neither side reached two conditions.
    pub forced: bool,
    pub indicator_tags: Vec<String>,
    pub reference_price: f64,
    pub suggested_take_profit: Option<f64>,
    pub suggested_stop_loss: Option<f64>,
    pub short_term_bias: CandleBias,
    pub momentum_override: Option<MomentumOverride>,
}

impl Signal {
    pub fn is_quality(&self) -> bool {
        self.quality.is_quality()
    }

    /// Suitable for opening a new position.
    pub fn is_tradeable(&self) -> bool {
        self.actionable && self.is_quality()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_str() {
        assert_eq!(Direction::parse("LONG"), Some(Direction::Long));
        assert_eq!(Direction::parse(" short "), Some(Direction::Short));
        assert_eq!(Direction::parse("flat"), None);
        assert_eq!(Direction::Long.to_string(), "LONG");
    }

    #[test]
    fn opposite() {
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.opposite(), Direction::Long);
    }

    #[test]
    fn quality_requires_every_flag() {
        let mut q = QualityFlags {
            meets_min_confidence: true,
            meets_min_risk_reward: true,
            passes_volume_filter: true,
            passes_trend_filter: true,
        };
        assert!(q.is_quality());
        q.passes_trend_filter = false;
        assert!(!q.is_quality());
    }
}
