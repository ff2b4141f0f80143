//! SQLite adapter: candle cache and trade history.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use tracing::debug;
use uuid::Uuid;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::position::{CloseReason, Position, PositionStatus};
use crate::domain::signal::Direction;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_repository::TradeRepository;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> EngineError {
    EngineError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> EngineError {
    EngineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(idx: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        reason.into(),
    )
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e.to_string()))
}

const TRADE_COLUMNS: &str = "id, instrument, direction, entry_price, size, opened_at, status,
    take_profit_price, stop_loss_price, trailing_stop_activated, peak_change_pct,
    entry_commission, exit_price, realized_pnl, close_reason, closed_at, failure";

fn row_to_trade(row: &Row<'_>) -> rusqlite::Result<Position> {
    let id: String = row.get(0)?;
    let direction: String = row.get(2)?;
    let opened_at: String = row.get(5)?;
    let status: String = row.get(6)?;
    let close_reason: Option<String> = row.get(14)?;
    let closed_at: Option<String> = row.get(15)?;

    Ok(Position {
        id: Uuid::parse_str(&id).map_err(|e| conversion_err(0, e.to_string()))?,
        instrument: row.get(1)?,
        direction: Direction::parse(&direction)
            .ok_or_else(|| conversion_err(2, format!("unknown direction {direction}")))?,
        entry_price: row.get(3)?,
        size: row.get(4)?,
        opened_at: parse_time(5, &opened_at)?,
        status: PositionStatus::parse(&status)
            .ok_or_else(|| conversion_err(6, format!("unknown status {status}")))?,
        take_profit_price: row.get(7)?,
        stop_loss_price: row.get(8)?,
        trailing_stop_activated: row.get(9)?,
        peak_change_pct: row.get(10)?,
        entry_commission: row.get(11)?,
        exit_price: row.get(12)?,
        realized_pnl: row.get(13)?,
        close_reason: close_reason
            .map(|r| {
                CloseReason::parse(&r)
                    .ok_or_else(|| conversion_err(14, format!("unknown close reason {r}")))
            })
            .transpose()?,
        closed_at: closed_at.map(|t| parse_time(15, &t)).transpose()?,
        failure: row.get(16)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EngineError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// Single-connection pool so every checkout sees the same database.
    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, EngineError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS candles (
                    instrument TEXT NOT NULL,
                    interval_ms INTEGER NOT NULL,
                    open_time INTEGER NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (instrument, interval_ms, open_time)
                );
                CREATE TABLE IF NOT EXISTS trades (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    instrument TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    entry_price REAL NOT NULL,
                    size REAL NOT NULL,
                    opened_at TEXT NOT NULL,
                    status TEXT NOT NULL,
                    take_profit_price REAL,
                    stop_loss_price REAL,
                    trailing_stop_activated INTEGER NOT NULL,
                    peak_change_pct REAL NOT NULL,
                    entry_commission REAL NOT NULL,
                    exit_price REAL,
                    realized_pnl REAL,
                    close_reason TEXT,
                    closed_at TEXT,
                    failure TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_trades_instrument ON trades(instrument);",
            )
            .map_err(query_err)
    }

    /// Upsert candles for one (instrument, interval) in a single transaction.
    pub fn insert_candles(
        &self,
        instrument: &str,
        interval_ms: i64,
        candles: &[Candle],
    ) -> Result<(), EngineError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for c in candles {
            tx.execute(
                "INSERT OR REPLACE INTO candles
                 (instrument, interval_ms, open_time, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    instrument,
                    interval_ms,
                    c.open_time,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        debug!(instrument, count = candles.len(), "candles stored");
        Ok(())
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_candles(
        &self,
        instrument: &str,
        interval_ms: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT open_time, open, high, low, close, volume FROM (
                    SELECT * FROM candles
                    WHERE instrument = ?1 AND interval_ms = ?2
                    ORDER BY open_time DESC
                    LIMIT ?3
                 ) ORDER BY open_time ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![instrument, interval_ms, limit as i64], |row| {
                Ok(Candle {
                    open_time: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

impl TradeRepository for SqliteAdapter {
    fn append_trade(&self, p: &Position) -> Result<(), EngineError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO trades ({TRADE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    p.id.to_string(),
                    p.instrument,
                    p.direction.as_str(),
                    p.entry_price,
                    p.size,
                    p.opened_at.to_rfc3339(),
                    p.status.as_str(),
                    p.take_profit_price,
                    p.stop_loss_price,
                    p.trailing_stop_activated,
                    p.peak_change_pct,
                    p.entry_commission,
                    p.exit_price,
                    p.realized_pnl,
                    p.close_reason.map(|r| r.as_str()),
                    p.closed_at.map(|t| t.to_rfc3339()),
                    p.failure,
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn list_trades(&self, instrument: Option<&str>) -> Result<Vec<Position>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE ?1 IS NULL OR instrument = ?1
                 ORDER BY seq ASC"
            ))
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![instrument], row_to_trade)
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::{TimeDelta, TimeZone};
    use tempfile::TempDir;

    fn make_adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn candle(i: i64, close: f64) -> Candle {
        Candle {
            open_time: i * 60_000,
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0 + i as f64,
        }
    }

    fn closed_trade(instrument: &str, reason: CloseReason) -> Position {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        let mut p = Position::open(instrument, Direction::Long, 200.0, 1_000.0, t);
        p.stop_loss_price = Some(198.0);
        p.begin_close(reason).unwrap();
        p.confirm_close(197.0, 0.5, t + TimeDelta::seconds(45))
            .unwrap();
        p
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = make_adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_returns_newest_candles_in_order() {
        let adapter = make_adapter();
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 100.0 + i as f64)).collect();
        adapter.insert_candles("BTCUSDT", 60_000, &candles).unwrap();
        adapter
            .insert_candles("ETHUSDT", 60_000, &candles[..3])
            .unwrap();

        let fetched = adapter.fetch_candles("BTCUSDT", 60_000, 4).unwrap();
        assert_eq!(fetched, candles[6..].to_vec());
        assert!(adapter.fetch_candles("BTCUSDT", 300_000, 4).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_bar() {
        let adapter = make_adapter();
        adapter
            .insert_candles("BTCUSDT", 60_000, &[candle(0, 100.0)])
            .unwrap();
        adapter
            .insert_candles("BTCUSDT", 60_000, &[candle(0, 101.0)])
            .unwrap();
        let fetched = adapter.fetch_candles("BTCUSDT", 60_000, 10).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!((fetched[0].close - 101.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trades_round_trip() {
        let adapter = make_adapter();
        let a = closed_trade("BTCUSDT", CloseReason::StopLoss);
        let b = closed_trade("ETHUSDT", CloseReason::Manual);
        adapter.append_trade(&a).unwrap();
        adapter.append_trade(&b).unwrap();

        let all = adapter.list_trades(None).unwrap();
        assert_eq!(all, vec![a.clone(), b]);
        let btc = adapter.list_trades(Some("BTCUSDT")).unwrap();
        assert_eq!(btc, vec![a]);
    }

    #[test]
    fn duplicate_trade_is_rejected() {
        let adapter = make_adapter();
        let a = closed_trade("BTCUSDT", CloseReason::TakeProfit);
        adapter.append_trade(&a).unwrap();
        let err = adapter.append_trade(&a).unwrap_err();
        assert!(matches!(err, EngineError::DatabaseQuery { .. }));
    }

    #[test]
    fn from_config_uses_file_path() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("trades.db");
        let config = FileConfigAdapter::from_string(&format!(
            "[sqlite]\npath = {}\npool_size = 2\n",
            db.display()
        ))
        .unwrap();
        let adapter = SqliteAdapter::from_config(&config).unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .append_trade(&closed_trade("BTCUSDT", CloseReason::TakeProfit))
            .unwrap();
        assert!(db.exists());
    }

    #[test]
    fn from_config_requires_path() {
        let config = FileConfigAdapter::from_string("[sqlite]\npool_size = 2\n").unwrap();
        let err = SqliteAdapter::from_config(&config).err().unwrap();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "path"));
    }
}
