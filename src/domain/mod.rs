//! Core domain types and logic.

pub mod candle;
pub mod candle_store;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod policy;
pub mod position;
pub mod scorer;
pub mod session;
pub mod signal;
