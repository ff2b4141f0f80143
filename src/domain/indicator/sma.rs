//! Simple Moving Average over the trailing n values.
//!
//! SMA(n) = sum(V[len-n..len]) / n

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}
