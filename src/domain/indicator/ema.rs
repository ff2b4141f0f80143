//! Exponential Moving Average over a bounded trailing window.
//!
//! k = 2/(n+1). The EMA is seeded from the oldest of the trailing n closes and
//! rolled forward: EMA = C[i]*k + EMA*(1-k).
//!
//! Only a window is available, so this is an approximation of a full-history
//! EMA; the drift is bounded by the window length.

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = window[0];
    for &v in &window[1..] {
        ema = v * k + ema * (1.0 - k);
    }
    Some(ema)
}
