#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use trendscout::domain::candle::Candle;
use trendscout::domain::config::TradingConfiguration;
use trendscout::domain::error::EngineError;
use trendscout::domain::position::Position;
use trendscout::domain::signal::Direction;
use trendscout::ports::execution_port::{ExecutionPort, Fill};
use trendscout::ports::market_data_port::MarketDataPort;

pub const MINUTE_MS: i64 = 60_000;
/// 2024-03-01T00:00:00Z
pub const START_MS: i64 = 1_709_251_200_000;

/// Contiguous one-minute bars with a body of exactly `step` each. `moves`
/// gives the colour of each bar: `true` up, `false` down.
pub fn bars_from_moves(start_price: f64, step: f64, moves: &[bool]) -> Vec<Candle> {
    let mut price = start_price;
    moves
        .iter()
        .enumerate()
        .map(|(i, &up)| {
            let open = price;
            let close = if up { open + step } else { open - step };
            price = close;
            Candle {
                open_time: START_MS + i as i64 * MINUTE_MS,
                open,
                high: open.max(close) + step * 0.25,
                low: open.min(close) - step * 0.25,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

/// Up, up, down repeated: a slow uptrend whose bodies never vary in size.
pub fn sawtooth(n: usize) -> Vec<Candle> {
    let moves: Vec<bool> = (0..n).map(|i| i % 3 != 2).collect();
    bars_from_moves(100.0, 1.0, &moves)
}

pub fn flat(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle {
            open_time: START_MS + i as i64 * MINUTE_MS,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 10.0,
        })
        .collect()
}

/// Quality gates opened wide so every actionable signal trades.
pub fn relaxed_config() -> TradingConfiguration {
    TradingConfiguration {
        min_confidence: 20,
        min_risk_reward: 0.1,
        volume_filter_enabled: false,
        trend_filter_enabled: false,
        reopen_min_confidence: 20,
        ..TradingConfiguration::default()
    }
}

pub struct MockMarketData {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, instrument: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(instrument.to_string(), candles);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_candles(
        &self,
        instrument: &str,
        _interval_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(EngineError::MarketData {
                reason: reason.clone(),
            });
        }
        let all = self.data.get(instrument).cloned().unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }
}

/// Fills at the requested price, optionally refusing every close.
pub struct ScriptedExecution {
    pub refuse_closes: bool,
    pub opens: Cell<u32>,
    pub closes: Cell<u32>,
    pub log: RefCell<Vec<(String, Direction)>>,
}

impl ScriptedExecution {
    pub fn new() -> Self {
        Self {
            refuse_closes: false,
            opens: Cell::new(0),
            closes: Cell::new(0),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn refusing_closes() -> Self {
        Self {
            refuse_closes: true,
            ..Self::new()
        }
    }
}

impl ExecutionPort for ScriptedExecution {
    fn submit_open(
        &self,
        instrument: &str,
        direction: Direction,
        _size: f64,
        price: f64,
    ) -> Result<Fill, EngineError> {
        self.opens.set(self.opens.get() + 1);
        self.log
            .borrow_mut()
            .push((instrument.to_string(), direction));
        Ok(Fill {
            price,
            commission: 0.0,
        })
    }

    fn submit_close(&self, _position: &Position, price: f64) -> Result<Fill, EngineError> {
        if self.refuse_closes {
            return Err(EngineError::Settlement {
                reason: "exchange unavailable".into(),
            });
        }
        self.closes.set(self.closes.get() + 1);
        Ok(Fill {
            price,
            commission: 0.0,
        })
    }
}
