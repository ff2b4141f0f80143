//! trendscout: signal engine and position lifecycle for spot crypto trading.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and a thin command-line driver in
//! [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
