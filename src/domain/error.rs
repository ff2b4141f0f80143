//! Engine error taxonomy.

use std::fmt;

/// Why a bar was refused at the candle store boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityKind {
    Duplicate,
    OutOfOrder,
    Gap,
    InvalidBar,
}

impl fmt::Display for DiscontinuityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscontinuityKind::Duplicate => write!(f, "duplicate bar"),
            DiscontinuityKind::OutOfOrder => write!(f, "out-of-order bar"),
            DiscontinuityKind::Gap => write!(f, "gap before bar"),
            DiscontinuityKind::InvalidBar => write!(f, "invalid bar"),
        }
    }
}

/// Top-level error type for trendscout.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient data for {instrument}: have {have} candles, need {need}")]
    InsufficientData {
        instrument: String,
        have: usize,
        need: usize,
    },

    #[error("{kind} for {instrument} at {open_time}")]
    DataDiscontinuity {
        instrument: String,
        kind: DiscontinuityKind,
        open_time: i64,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("a position is already open for {instrument}")]
    PositionAlreadyOpen { instrument: String },

    #[error("no open position for {instrument}")]
    NoOpenPosition { instrument: String },

    #[error("invalid position transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("settlement failed: {reason}")]
    Settlement { reason: String },

    #[error("daily loss limit reached: lost {lost:.2} of allowed {limit:.2}")]
    DailyLossLimit { lost: f64, limit: f64 },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Database { .. }
            | EngineError::DatabaseQuery { .. }
            | EngineError::MarketData { .. } => 3,
            EngineError::PositionAlreadyOpen { .. }
            | EngineError::NoOpenPosition { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::Settlement { .. }
            | EngineError::DailyLossLimit { .. } => 4,
            EngineError::InsufficientData { .. } | EngineError::DataDiscontinuity { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = EngineError::InsufficientData {
            instrument: "ETHUSDT".into(),
            have: 12,
            need: 50,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for ETHUSDT: have 12 candles, need 50"
        );
    }

    #[test]
    fn discontinuity_message_names_kind() {
        let err = EngineError::DataDiscontinuity {
            instrument: "BTCUSDT".into(),
            kind: DiscontinuityKind::OutOfOrder,
            open_time: 60_000,
        };
        assert_eq!(err.to_string(), "out-of-order bar for BTCUSDT at 60000");
    }

    #[test]
    fn config_invalid_message() {
        let err = EngineError::ConfigInvalid {
            section: "trading".into(),
            key: "stop_loss_pct".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [trading] stop_loss_pct: must be positive"
        );
    }
}
