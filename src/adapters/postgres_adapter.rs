//! PostgreSQL trade history adapter.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use uuid::Uuid;

use crate::domain::error::EngineError;
use crate::domain::position::{CloseReason, Position, PositionStatus};
use crate::domain::signal::Direction;
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_repository::TradeRepository;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn query_err(e: postgres::Error) -> EngineError {
    EngineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn row_to_trade(row: &Row) -> Result<Position, EngineError> {
    let bad = |what: &str, value: &str| EngineError::DatabaseQuery {
        reason: format!("invalid {what} in trades row: {value}"),
    };
    let id: String = row.get(0);
    let direction: String = row.get(2);
    let status: String = row.get(6);
    let close_reason: Option<String> = row.get(14);

    Ok(Position {
        id: Uuid::parse_str(&id).map_err(|_| bad("id", &id))?,
        instrument: row.get(1),
        direction: Direction::parse(&direction).ok_or_else(|| bad("direction", &direction))?,
        entry_price: row.get(3),
        size: row.get(4),
        opened_at: row.get::<_, DateTime<Utc>>(5),
        status: PositionStatus::parse(&status).ok_or_else(|| bad("status", &status))?,
        take_profit_price: row.get(7),
        stop_loss_price: row.get(8),
        trailing_stop_activated: row.get(9),
        peak_change_pct: row.get(10),
        entry_commission: row.get(11),
        exit_price: row.get(12),
        realized_pnl: row.get(13),
        close_reason: match close_reason {
            Some(r) => Some(CloseReason::parse(&r).ok_or_else(|| bad("close_reason", &r))?),
            None => None,
        },
        closed_at: row.get(15),
        failure: row.get(16),
    })
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| EngineError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        self.client
            .borrow_mut()
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS public.trades (
                    seq BIGSERIAL PRIMARY KEY,
                    id TEXT NOT NULL UNIQUE,
                    instrument TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    entry_price DOUBLE PRECISION NOT NULL,
                    size DOUBLE PRECISION NOT NULL,
                    opened_at TIMESTAMPTZ NOT NULL,
                    status TEXT NOT NULL,
                    take_profit_price DOUBLE PRECISION,
                    stop_loss_price DOUBLE PRECISION,
                    trailing_stop_activated BOOLEAN NOT NULL,
                    peak_change_pct DOUBLE PRECISION NOT NULL,
                    entry_commission DOUBLE PRECISION NOT NULL,
                    exit_price DOUBLE PRECISION,
                    realized_pnl DOUBLE PRECISION,
                    close_reason TEXT,
                    closed_at TIMESTAMPTZ,
                    failure TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_trades_instrument ON public.trades(instrument);",
            )
            .map_err(query_err)
    }
}

impl TradeRepository for PostgresAdapter {
    fn append_trade(&self, p: &Position) -> Result<(), EngineError> {
        let id = p.id.to_string();
        let close_reason = p.close_reason.map(|r| r.as_str());
        let params: &[&(dyn ToSql + Sync)] = &[
            &id,
            &p.instrument,
            &p.direction.as_str(),
            &p.entry_price,
            &p.size,
            &p.opened_at,
            &p.status.as_str(),
            &p.take_profit_price,
            &p.stop_loss_price,
            &p.trailing_stop_activated,
            &p.peak_change_pct,
            &p.entry_commission,
            &p.exit_price,
            &p.realized_pnl,
            &close_reason,
            &p.closed_at,
            &p.failure,
        ];
        self.client
            .borrow_mut()
            .execute(
                "INSERT INTO public.trades (id, instrument, direction, entry_price, size,
                    opened_at, status, take_profit_price, stop_loss_price,
                    trailing_stop_activated, peak_change_pct, entry_commission, exit_price,
                    realized_pnl, close_reason, closed_at, failure)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
                params,
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn list_trades(&self, instrument: Option<&str>) -> Result<Vec<Position>, EngineError> {
        let query = "SELECT id, instrument, direction, entry_price, size, opened_at, status,
                            take_profit_price, stop_loss_price, trailing_stop_activated,
                            peak_change_pct, entry_commission, exit_price, realized_pnl,
                            close_reason, closed_at, failure
                     FROM public.trades
                     WHERE $1::text IS NULL OR instrument = $1
                     ORDER BY seq ASC";

        let rows = self
            .client
            .borrow_mut()
            .query(query, &[&instrument])
            .map_err(query_err)?;

        rows.iter().map(row_to_trade).collect()
    }
}
