//! Population standard deviation over the trailing n values.
//!
//! STDDEV(n) = sqrt(sum((V[i] - SMA(n))^2) / n)

use crate::domain::indicator::sma::sma;

pub fn stddev(values: &[f64], period: usize) -> Option<f64> {
    let mean = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    Some(variance.sqrt())
}
