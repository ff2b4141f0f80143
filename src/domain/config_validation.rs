//! Configuration validation.
//!
//! Runs over the raw config before any session is built so a bad file fails
//! with the offending section and key.

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_percent_range(config, "min_confidence", 70.0)?;
    validate_percent_range(config, "reopen_min_confidence", 60.0)?;
    validate_positive(config, "trading", "min_risk_reward", 1.5)?;
    validate_positive(config, "trading", "take_profit_pct", 2.0)?;
    validate_positive(config, "trading", "stop_loss_pct", 1.0)?;
    validate_position_size(config)?;
    validate_positive(config, "trading", "max_daily_loss_pct", 5.0)?;
    validate_positive(config, "trading", "trading_interval_ms", 60_000.0)?;
    validate_positive(config, "trading", "max_session_trades", 20.0)?;
    validate_trailing(config)?;
    Ok(())
}

pub fn validate_market_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    match config.get_string("market", "instrument") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(EngineError::ConfigMissing {
                section: "market".to_string(),
                key: "instrument".to_string(),
            })
        }
    }
    validate_positive(config, "market", "interval_ms", 60_000.0)?;
    let window = config.get_int("market", "window", 200);
    if window < crate::domain::indicator::MIN_CANDLES as i64 {
        return Err(EngineError::ConfigInvalid {
            section: "market".to_string(),
            key: "window".to_string(),
            reason: format!(
                "window must hold at least {} candles",
                crate::domain::indicator::MIN_CANDLES
            ),
        });
    }
    Ok(())
}

pub fn validate_account_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_positive(config, "account", "equity", 10_000.0)?;
    validate_non_negative(config, "account", "slippage_pct")?;
    validate_non_negative(config, "account", "commission_pct")?;
    Ok(())
}

fn validate_percent_range(
    config: &dyn ConfigPort,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    let value = config.get_double("trading", key, default);
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::ConfigInvalid {
            section: "trading".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be between 0 and 100"),
        });
    }
    Ok(())
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    let value = config.get_double(section, key, default);
    if value <= 0.0 {
        return Err(EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be positive"),
        });
    }
    Ok(())
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), EngineError> {
    let value = config.get_double(section, key, 0.0);
    if value < 0.0 {
        return Err(EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be non-negative"),
        });
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("trading", "max_position_pct", 10.0);
    if value <= 0.0 || value > 100.0 {
        return Err(EngineError::ConfigInvalid {
            section: "trading".to_string(),
            key: "max_position_pct".to_string(),
            reason: "max_position_pct must be in (0, 100]".to_string(),
        });
    }
    Ok(())
}

fn validate_trailing(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if !config.get_bool("trading", "trailing_stop", false) {
        return Ok(());
    }
    validate_positive(config, "trading", "trailing_activation_pct", 1.0)?;
    validate_positive(config, "trading", "trailing_distance_pct", 0.5)?;
    let activation = config.get_double("trading", "trailing_activation_pct", 1.0);
    let distance = config.get_double("trading", "trailing_distance_pct", 0.5);
    if distance >= activation {
        return Err(EngineError::ConfigInvalid {
            section: "trading".to_string(),
            key: "trailing_distance_pct".to_string(),
            reason: "trailing_distance_pct must be below trailing_activation_pct".to_string(),
        });
    }
    Ok(())
}
