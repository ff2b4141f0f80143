//! Trading configuration and the settings read alongside it.
//!
//! All values are supplied by the caller and are read-only to the engine.

use std::time::Duration as StdDuration;

use chrono::TimeDelta;

use crate::domain::candle_store::DEFAULT_WINDOW;
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

/// Refresh cadence while a turbo-mode position is open.
pub const TURBO_REFRESH_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfiguration {
    pub min_confidence: u8,
    pub min_risk_reward: f64,
    pub volume_filter_enabled: bool,
    pub trend_filter_enabled: bool,
    pub take_profit_percent: f64,
    pub take_profit_enabled: bool,
    pub stop_loss_percent: f64,
    pub stop_loss_enabled: bool,
    pub max_position_percent: f64,
    pub max_daily_loss_percent: f64,
    pub auto_reopen_enabled: bool,
    pub auto_reopen_on_loss: bool,
    pub trading_interval_ms: u64,
    pub turbo_mode: bool,
    pub min_hold_ms: u64,
    pub turbo_min_hold_ms: u64,
    pub max_session_trades: u32,
    pub reopen_min_confidence: u8,
    pub close_on_signal_flip: bool,
    pub trailing_stop_enabled: bool,
    pub trailing_activation_percent: f64,
    pub trailing_distance_percent: f64,
    /// Smallest favourable move (percent) turbo mode will protect on a signal flip.
    pub profit_protect_percent: f64,
}

impl Default for TradingConfiguration {
    fn default() -> Self {
        TradingConfiguration {
            min_confidence: 70,
            min_risk_reward: 1.5,
            volume_filter_enabled: true,
            trend_filter_enabled: true,
            take_profit_percent: 2.0,
            take_profit_enabled: true,
            stop_loss_percent: 1.0,
            stop_loss_enabled: true,
            max_position_percent: 10.0,
            max_daily_loss_percent: 5.0,
            auto_reopen_enabled: false,
            auto_reopen_on_loss: false,
            trading_interval_ms: 60_000,
            turbo_mode: false,
            min_hold_ms: 30_000,
            turbo_min_hold_ms: 3_000,
            max_session_trades: 20,
            reopen_min_confidence: 60,
            close_on_signal_flip: false,
            trailing_stop_enabled: false,
            trailing_activation_percent: 1.0,
            trailing_distance_percent: 0.5,
            profit_protect_percent: 0.01,
        }
    }
}

impl TradingConfiguration {
    /// Minimum time a position must be held before the normal exit rules apply.
    pub fn min_hold(&self) -> TimeDelta {
        let ms = if self.turbo_mode {
            self.turbo_min_hold_ms
        } else {
            self.min_hold_ms
        };
        TimeDelta::milliseconds(ms as i64)
    }

    /// How often the market-data loop should poll.
    pub fn refresh_interval(&self, position_open: bool) -> StdDuration {
        let ms = if self.turbo_mode && position_open {
            self.trading_interval_ms.min(TURBO_REFRESH_MS)
        } else {
            self.trading_interval_ms
        };
        StdDuration::from_millis(ms)
    }

    /// Read `[trading]`, falling back to defaults for absent keys.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let d = TradingConfiguration::default();
        let s = "trading";
        Ok(TradingConfiguration {
            min_confidence: read_u8(config, s, "min_confidence", d.min_confidence)?,
            min_risk_reward: config.get_double(s, "min_risk_reward", d.min_risk_reward),
            volume_filter_enabled: config.get_bool(s, "volume_filter", d.volume_filter_enabled),
            trend_filter_enabled: config.get_bool(s, "trend_filter", d.trend_filter_enabled),
            take_profit_percent: config.get_double(s, "take_profit_pct", d.take_profit_percent),
            take_profit_enabled: config.get_bool(s, "take_profit_enabled", d.take_profit_enabled),
            stop_loss_percent: config.get_double(s, "stop_loss_pct", d.stop_loss_percent),
            stop_loss_enabled: config.get_bool(s, "stop_loss_enabled", d.stop_loss_enabled),
            max_position_percent: config.get_double(s, "max_position_pct", d.max_position_percent),
            max_daily_loss_percent: config.get_double(
                s,
                "max_daily_loss_pct",
                d.max_daily_loss_percent,
            ),
            auto_reopen_enabled: config.get_bool(s, "auto_reopen", d.auto_reopen_enabled),
            auto_reopen_on_loss: config.get_bool(s, "auto_reopen_on_loss", d.auto_reopen_on_loss),
            trading_interval_ms: read_u64(config, s, "trading_interval_ms", d.trading_interval_ms)?,
            turbo_mode: config.get_bool(s, "turbo_mode", d.turbo_mode),
            min_hold_ms: read_u64(config, s, "min_hold_ms", d.min_hold_ms)?,
            turbo_min_hold_ms: read_u64(config, s, "turbo_min_hold_ms", d.turbo_min_hold_ms)?,
            max_session_trades: read_u32(config, s, "max_session_trades", d.max_session_trades)?,
            reopen_min_confidence: read_u8(
                config,
                s,
                "reopen_min_confidence",
                d.reopen_min_confidence,
            )?,
            close_on_signal_flip: config.get_bool(
                s,
                "close_on_signal_flip",
                d.close_on_signal_flip,
            ),
            trailing_stop_enabled: config.get_bool(s, "trailing_stop", d.trailing_stop_enabled),
            trailing_activation_percent: config.get_double(
                s,
                "trailing_activation_pct",
                d.trailing_activation_percent,
            ),
            trailing_distance_percent: config.get_double(
                s,
                "trailing_distance_pct",
                d.trailing_distance_percent,
            ),
            profit_protect_percent: config.get_double(
                s,
                "profit_protect_pct",
                d.profit_protect_percent,
            ),
        })
    }
}

/// `[market]` section: which instrument to follow and how.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub instrument: String,
    pub interval_ms: i64,
    pub window: usize,
    pub data_dir: Option<String>,
}

impl MarketSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let instrument = config
            .get_string("market", "instrument")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "market".into(),
                key: "instrument".into(),
            })?;
        Ok(MarketSettings {
            instrument: instrument.trim().to_uppercase(),
            interval_ms: read_u64(config, "market", "interval_ms", 60_000)? as i64,
            window: read_u64(config, "market", "window", DEFAULT_WINDOW as u64)? as usize,
            data_dir: config.get_string("market", "data_dir"),
        })
    }
}

/// `[account]` section: equity used for sizing and paper-fill costs.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSettings {
    pub equity: f64,
    pub slippage_pct: f64,
    pub commission_pct: f64,
}

impl Default for AccountSettings {
    fn default() -> Self {
        AccountSettings {
            equity: 10_000.0,
            slippage_pct: 0.0,
            commission_pct: 0.0,
        }
    }
}

impl AccountSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = AccountSettings::default();
        AccountSettings {
            equity: config.get_double("account", "equity", d.equity),
            slippage_pct: config.get_double("account", "slippage_pct", d.slippage_pct),
            commission_pct: config.get_double("account", "commission_pct", d.commission_pct),
        }
    }
}

fn read_u64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<u64, EngineError> {
    let value = config.get_int(section, key, default as i64);
    u64::try_from(value).map_err(|_| EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{key} must be non-negative"),
    })
}

fn read_u32(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, EngineError> {
    let value = config.get_int(section, key, i64::from(default));
    u32::try_from(value).map_err(|_| EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{key} must be between 0 and {}", u32::MAX),
    })
}

fn read_u8(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u8,
) -> Result<u8, EngineError> {
    let value = config.get_int(section, key, default as i64);
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be between 0 and 100"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn with(mut self, section: &str, key: &str, value: &str) -> Self {
            self.0
                .insert((section.to_string(), key.to_string()), value.to_string());
            self
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    #[test]
    fn defaults_when_section_absent() {
        let cfg = TradingConfiguration::from_config(&MapConfig::default()).unwrap();
        assert_eq!(cfg, TradingConfiguration::default());
    }

    #[test]
    fn reads_overrides() {
        let port = MapConfig::default()
            .with("trading", "min_confidence", "80")
            .with("trading", "take_profit_pct", "3.5")
            .with("trading", "turbo_mode", "true")
            .with("trading", "max_session_trades", "5");
        let cfg = TradingConfiguration::from_config(&port).unwrap();
        assert_eq!(cfg.min_confidence, 80);
        assert!((cfg.take_profit_percent - 3.5).abs() < f64::EPSILON);
        assert!(cfg.turbo_mode);
        assert_eq!(cfg.max_session_trades, 5);
    }

    #[test]
    fn rejects_confidence_above_100() {
        let port = MapConfig::default().with("trading", "min_confidence", "140");
        let err = TradingConfiguration::from_config(&port).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { key, .. } if key == "min_confidence"));
    }

    #[test]
    fn rejects_session_trades_beyond_u32() {
        let port = MapConfig::default().with("trading", "max_session_trades", "4294967296");
        let err = TradingConfiguration::from_config(&port).unwrap_err();
        assert!(
            matches!(err, EngineError::ConfigInvalid { key, .. } if key == "max_session_trades")
        );

        let port = MapConfig::default().with("trading", "max_session_trades", "4294967295");
        let cfg = TradingConfiguration::from_config(&port).unwrap();
        assert_eq!(cfg.max_session_trades, u32::MAX);
    }

    #[test]
    fn rejects_negative_interval() {
        let port = MapConfig::default().with("trading", "trading_interval_ms", "-5");
        let err = TradingConfiguration::from_config(&port).unwrap_err();
        assert!(
            matches!(err, EngineError::ConfigInvalid { key, .. } if key == "trading_interval_ms")
        );
    }

    #[test]
    fn min_hold_depends_on_turbo() {
        let mut cfg = TradingConfiguration::default();
        assert_eq!(cfg.min_hold(), TimeDelta::seconds(30));
        cfg.turbo_mode = true;
        assert_eq!(cfg.min_hold(), TimeDelta::seconds(3));
    }

    #[test]
    fn refresh_faster_in_turbo_with_open_position() {
        let mut cfg = TradingConfiguration::default();
        assert_eq!(cfg.refresh_interval(true), StdDuration::from_secs(60));
        cfg.turbo_mode = true;
        assert_eq!(cfg.refresh_interval(false), StdDuration::from_secs(60));
        assert_eq!(cfg.refresh_interval(true), StdDuration::from_secs(2));
    }

    #[test]
    fn market_settings_require_instrument() {
        let err = MarketSettings::from_config(&MapConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "instrument"));
    }

    #[test]
    fn market_settings_normalise_instrument() {
        let port = MapConfig::default()
            .with("market", "instrument", " ethusdt ")
            .with("market", "interval_ms", "300000");
        let m = MarketSettings::from_config(&port).unwrap();
        assert_eq!(m.instrument, "ETHUSDT");
        assert_eq!(m.interval_ms, 300_000);
        assert_eq!(m.window, DEFAULT_WINDOW);
        assert_eq!(m.data_dir, None);
    }

    #[test]
    fn account_defaults() {
        let a = AccountSettings::from_config(&MapConfig::default());
        assert_eq!(a, AccountSettings::default());
    }
}
