//! Indicator library.
//!
//! Every function here is pure over a trailing candle window. [`compute_snapshot`]
//! bundles them into one [`IndicatorSnapshot`] and refuses windows shorter than
//! [`MIN_CANDLES`].

pub mod bollinger;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod momentum;
pub mod pattern;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod trend;
pub mod volume;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

pub use bollinger::BollingerBands;
pub use levels::PriceLevels;
pub use macd::MacdCross;
pub use momentum::{BodySize, ImmediateMomentum};
pub use pattern::CandlePatterns;
pub use rsi::RsiMomentum;
pub use trend::{TrendState, TrendStructure};
pub use volume::VolumeLevel;

/// Shortest window the snapshot will be computed from.
pub const MIN_CANDLES: usize = 50;

/// Point-in-time indicator values derived from one candle window.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub last_close: f64,
    pub sma7: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub ema12: f64,
    pub ema26: f64,
    pub rsi: f64,
    pub rsi_previous: f64,
    pub macd: f64,
    pub macd_previous: f64,
    pub bollinger: BollingerBands,
    pub volume_ratio: f64,
    pub levels: PriceLevels,
    pub patterns: CandlePatterns,
    pub structure: TrendStructure,
    pub momentum: ImmediateMomentum,
}

impl IndicatorSnapshot {
    pub fn rsi_momentum(&self) -> RsiMomentum {
        rsi::classify_momentum(self.rsi, self.rsi_previous)
    }

    pub fn macd_cross(&self) -> MacdCross {
        macd::classify_cross(self.macd, self.macd_previous)
    }

    /// MACD line as a percentage of the last close.
    pub fn macd_pct(&self) -> f64 {
        if self.last_close > 0.0 {
            self.macd / self.last_close * 100.0
        } else {
            0.0
        }
    }

    pub fn bb_position(&self) -> f64 {
        self.bollinger.position(self.last_close)
    }

    pub fn volume_level(&self) -> VolumeLevel {
        volume::classify(self.volume_ratio)
    }

    pub fn near_support(&self) -> bool {
        self.levels.near_support(self.last_close)
    }

    pub fn near_resistance(&self) -> bool {
        self.levels.near_resistance(self.last_close)
    }

    pub fn trend(&self) -> TrendState {
        trend::classify(&self.structure, self.sma7, self.sma20, self.sma50)
    }
}

/// Compute a snapshot from a chronological window of at least [`MIN_CANDLES`] bars.
pub fn compute_snapshot(
    instrument: &str,
    candles: &[Candle],
) -> Result<IndicatorSnapshot, EngineError> {
    let insufficient = || EngineError::InsufficientData {
        instrument: instrument.to_string(),
        have: candles.len(),
        need: MIN_CANDLES,
    };

    if candles.len() < MIN_CANDLES {
        return Err(insufficient());
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let snapshot = (|| {
        Some(IndicatorSnapshot {
            last_close: *closes.last()?,
            sma7: sma::sma(&closes, 7)?,
            sma20: sma::sma(&closes, 20)?,
            sma50: sma::sma(&closes, 50)?,
            ema12: ema::ema(&closes, macd::DEFAULT_FAST)?,
            ema26: ema::ema(&closes, macd::DEFAULT_SLOW)?,
            rsi: rsi::rsi(&closes, rsi::DEFAULT_PERIOD)?,
            rsi_previous: rsi::previous_rsi(&closes, rsi::DEFAULT_PERIOD)?,
            macd: macd::macd_default(&closes)?,
            macd_previous: macd::previous_macd_default(&closes)?,
            bollinger: bollinger::bollinger_default(&closes)?,
            volume_ratio: volume::volume_ratio(candles, volume::DEFAULT_PERIOD)?,
            levels: levels::price_levels(candles, levels::DEFAULT_PERIOD)?,
            patterns: pattern::detect(candles),
            structure: trend::structure(candles, trend::DEFAULT_PERIOD),
            momentum: momentum::immediate_momentum(candles)?,
        })
    })();

    snapshot.ok_or_else(insufficient)
}
