//! CSV adapters: candle files as market data and an append-only trade log.
//!
//! Candle files live at `<base>/<INSTRUMENT>.csv` with the header
//! `open_time,open,high,low,close,volume` (open_time in epoch milliseconds).

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use tracing::debug;
use uuid::Uuid;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::position::{CloseReason, Position, PositionStatus};
use crate::domain::signal::Direction;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_repository::TradeRepository;

fn field<T>(record: &StringRecord, idx: usize, name: &str) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    record
        .get(idx)
        .ok_or_else(|| EngineError::MarketData {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| EngineError::MarketData {
            reason: format!("invalid {name} value: {e}"),
        })
}

/// Read every candle in `path`, sorted by open time.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, EngineError> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::MarketData {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| EngineError::MarketData {
            reason: format!("CSV parse error: {}", e),
        })?;
        candles.push(Candle {
            open_time: field(&record, 0, "open_time")?,
            open: field(&record, 1, "open")?,
            high: field(&record, 2, "high")?,
            low: field(&record, 3, "low")?,
            close: field(&record, 4, "close")?,
            volume: field(&record, 5, "volume")?,
        });
    }
    candles.sort_by_key(|c| c.open_time);
    debug!(path = %path.display(), count = candles.len(), "candles loaded");
    Ok(candles)
}

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

impl MarketDataPort for CsvMarketData {
    fn fetch_candles(
        &self,
        instrument: &str,
        _interval_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let mut candles = read_candles(&self.csv_path(instrument))?;
        let start = candles.len().saturating_sub(limit);
        Ok(candles.split_off(start))
    }
}

const TRADE_HEADER: [&str; 17] = [
    "id",
    "instrument",
    "direction",
    "entry_price",
    "size",
    "opened_at",
    "status",
    "take_profit_price",
    "stop_loss_price",
    "trailing_stop_activated",
    "peak_change_pct",
    "entry_commission",
    "exit_price",
    "realized_pnl",
    "close_reason",
    "closed_at",
    "failure",
];

/// Trade history kept in one CSV file, one row per terminal position.
pub struct CsvTradeLog {
    path: PathBuf,
}

impl CsvTradeLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn opt_time(v: Option<DateTime<Utc>>) -> String {
    v.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn trade_err(reason: String) -> EngineError {
    EngineError::DatabaseQuery { reason }
}

fn parse_opt_f64(s: &str, name: &str) -> Result<Option<f64>, EngineError> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|e| trade_err(format!("invalid {name}: {e}")))
}

fn parse_time(s: &str, name: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| trade_err(format!("invalid {name}: {e}")))
}

fn trade_to_record(p: &Position) -> Vec<String> {
    vec![
        p.id.to_string(),
        p.instrument.clone(),
        p.direction.as_str().to_string(),
        p.entry_price.to_string(),
        p.size.to_string(),
        p.opened_at.to_rfc3339(),
        p.status.as_str().to_string(),
        opt_f64(p.take_profit_price),
        opt_f64(p.stop_loss_price),
        p.trailing_stop_activated.to_string(),
        p.peak_change_pct.to_string(),
        p.entry_commission.to_string(),
        opt_f64(p.exit_price),
        opt_f64(p.realized_pnl),
        p.close_reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        opt_time(p.closed_at),
        p.failure.clone().unwrap_or_default(),
    ]
}

fn record_to_trade(r: &StringRecord) -> Result<Position, EngineError> {
    let get = |i: usize| r.get(i).unwrap_or("");
    let num = |i: usize, name: &str| -> Result<f64, EngineError> {
        get(i)
            .parse()
            .map_err(|e| trade_err(format!("invalid {name}: {e}")))
    };

    Ok(Position {
        id: Uuid::parse_str(get(0)).map_err(|e| trade_err(format!("invalid id: {e}")))?,
        instrument: get(1).to_string(),
        direction: Direction::parse(get(2))
            .ok_or_else(|| trade_err(format!("invalid direction: {}", get(2))))?,
        entry_price: num(3, "entry_price")?,
        size: num(4, "size")?,
        opened_at: parse_time(get(5), "opened_at")?,
        status: PositionStatus::parse(get(6))
            .ok_or_else(|| trade_err(format!("invalid status: {}", get(6))))?,
        take_profit_price: parse_opt_f64(get(7), "take_profit_price")?,
        stop_loss_price: parse_opt_f64(get(8), "stop_loss_price")?,
        trailing_stop_activated: get(9) == "true",
        peak_change_pct: num(10, "peak_change_pct")?,
        entry_commission: num(11, "entry_commission")?,
        exit_price: parse_opt_f64(get(12), "exit_price")?,
        realized_pnl: parse_opt_f64(get(13), "realized_pnl")?,
        close_reason: match get(14) {
            "" => None,
            s => Some(
                CloseReason::parse(s)
                    .ok_or_else(|| trade_err(format!("invalid close_reason: {s}")))?,
            ),
        },
        closed_at: match get(15) {
            "" => None,
            s => Some(parse_time(s, "closed_at")?),
        },
        failure: match get(16) {
            "" => None,
            s => Some(s.to_string()),
        },
    })
}

impl TradeRepository for CsvTradeLog {
    fn append_trade(&self, position: &Position) -> Result<(), EngineError> {
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| EngineError::Database {
                reason: format!("failed to open {}: {}", self.path.display(), e),
            })?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            wtr.write_record(TRADE_HEADER)
                .map_err(|e| trade_err(format!("CSV write error: {e}")))?;
        }
        wtr.write_record(trade_to_record(position))
            .map_err(|e| trade_err(format!("CSV write error: {e}")))?;
        wtr.flush()?;
        Ok(())
    }

    fn list_trades(&self, instrument: Option<&str>) -> Result<Vec<Position>, EngineError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| EngineError::Database {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut trades = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| trade_err(format!("CSV parse error: {e}")))?;
            let trade = record_to_trade(&record)?;
            if instrument.is_none_or(|i| trade.instrument == i) {
                trades.push(trade);
            }
        }
        Ok(trades)
    }
}
