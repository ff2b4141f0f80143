//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation. Default parameters: n=20,
//! multiplier=2.0. Band position is diagnostic only.

use crate::domain::indicator::sma::sma;
use crate::domain::indicator::stddev::stddev;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// (price - lower) / (upper - lower); 0.5 when the bands have collapsed.
    pub fn position(&self, price: f64) -> f64 {
        let width = self.width();
        if width <= 0.0 {
            return 0.5;
        }
        (price - self.lower) / width
    }
}

pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    let middle = sma(closes, period)?;
    let sd = stddev(closes, period)?;
    Some(BollingerBands {
        upper: middle + multiplier * sd,
        middle,
        lower: middle - multiplier * sd,
    })
}

pub fn bollinger_default(closes: &[f64]) -> Option<BollingerBands> {
    bollinger(closes, DEFAULT_PERIOD, DEFAULT_MULTIPLIER)
}
