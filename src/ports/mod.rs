//! Port traits the domain depends on.

pub mod config_port;
pub mod execution_port;
pub mod market_data_port;
pub mod trade_repository;
