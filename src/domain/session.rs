//! Per-instrument trading session.
//!
//! A [`TradingSession`] is the single writer for one instrument's candle
//! store, its one open position and any pending auto-reopen intent. Settlement
//! goes through an [`ExecutionPort`]; every terminal position is appended to a
//! [`TradeRepository`] exactly once. [`SessionBook`] keys sessions by
//! instrument so several can run side by side without sharing state.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::domain::candle::Candle;
use crate::domain::candle_store::{CandleStore, IngestReport};
use crate::domain::config::TradingConfiguration;
use crate::domain::error::{DiscontinuityKind, EngineError};
use crate::domain::indicator::MIN_CANDLES;
use crate::domain::policy::{evaluate_position, HoldReason, PolicyDecision};
use crate::domain::position::{CloseReason, Position, PositionStatus};
use crate::domain::scorer;
use crate::domain::signal::{Direction, Signal};
use crate::ports::execution_port::ExecutionPort;
use crate::ports::trade_repository::TradeRepository;

/// A close asked for a follow-up position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReopenIntent {
    pub after: CloseReason,
    pub previous_direction: Direction,
    pub requested_at: DateTime<Utc>,
}

/// What one candle did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Warming { have: usize, need: usize },
    Flat,
    Opened { direction: Direction, price: f64 },
    Held(HoldReason),
    TrailingActivated,
    Closed {
        reason: CloseReason,
        pnl: f64,
        reopened: Option<Direction>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DailyLedger {
    day: NaiveDate,
    realized_pnl: f64,
}

#[derive(Debug)]
pub struct TradingSession {
    store: CandleStore,
    config: TradingConfiguration,
    equity: f64,
    auto_trade: bool,
    position: Option<Position>,
    pending_reopen: Option<ReopenIntent>,
    trades_opened: u32,
    ledger: Option<DailyLedger>,
    last_signal: Option<Signal>,
}

impl TradingSession {
    pub fn new(store: CandleStore, config: TradingConfiguration, equity: f64) -> Self {
        TradingSession {
            store,
            config,
            equity,
            auto_trade: true,
            position: None,
            pending_reopen: None,
            trades_opened: 0,
            ledger: None,
            last_signal: None,
        }
    }

    pub fn instrument(&self) -> &str {
        self.store.instrument()
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn config(&self) -> &TradingConfiguration {
        &self.config
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_open_position(&self) -> bool {
        self.position.as_ref().is_some_and(Position::is_open)
    }

    pub fn pending_reopen(&self) -> Option<&ReopenIntent> {
        self.pending_reopen.as_ref()
    }

    pub fn trades_opened(&self) -> u32 {
        self.trades_opened
    }

    pub fn last_signal(&self) -> Option<&Signal> {
        self.last_signal.as_ref()
    }

    pub fn auto_trade(&self) -> bool {
        self.auto_trade
    }

    pub fn enable_auto_trade(&mut self) {
        self.auto_trade = true;
    }

    /// Stops automatic entries and drops any pending reopen.
    pub fn disable_auto_trade(&mut self) {
        self.auto_trade = false;
        if self.pending_reopen.take().is_some() {
            info!(instrument = self.instrument(), "pending reopen cancelled");
        }
    }

    /// Quote-currency notional for a new position.
    pub fn position_size(&self) -> f64 {
        self.equity * self.config.max_position_percent / 100.0
    }

    /// Realized PnL for `day`, zero if nothing closed that day.
    pub fn realized_pnl_on(&self, day: NaiveDate) -> f64 {
        match self.ledger {
            Some(l) if l.day == day => l.realized_pnl,
            _ => 0.0,
        }
    }

    pub fn ingest(&mut self, candles: &[Candle]) -> Result<IngestReport, EngineError> {
        self.store.ingest(candles)
    }

    /// Drop the candle window after a feed gap. The open position, if any,
    /// is kept and still managed on price while the window warms up.
    pub fn reset_window(&mut self) {
        warn!(
            instrument = self.instrument(),
            dropped = self.store.len(),
            "candle window reset"
        );
        self.store.reset();
        self.last_signal = None;
    }

    /// Score the current window and remember the result for the policy.
    pub fn evaluate_signal(&mut self) -> Result<Signal, EngineError> {
        let signal = scorer::evaluate(self.store.instrument(), self.store.window(), &self.config)?;
        self.last_signal = Some(signal.clone());
        Ok(signal)
    }

    /// Open a position on `signal`.
    ///
    /// A rejected open settlement is recorded as a FAILED trade and the error
    /// is returned; the session stays flat and the trade does not count
    /// against the session cap.
    pub fn open_position(
        &mut self,
        signal: &Signal,
        now: DateTime<Utc>,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<&Position, EngineError> {
        if self.has_open_position() {
            return Err(EngineError::PositionAlreadyOpen {
                instrument: self.instrument().to_string(),
            });
        }
        self.check_daily_loss(now.date_naive())?;

        let size = self.position_size();
        let fill = match execution.submit_open(
            self.instrument(),
            signal.direction,
            size,
            signal.reference_price,
        ) {
            Ok(fill) => fill,
            Err(e) => {
                let mut failed = Position::open(
                    self.instrument(),
                    signal.direction,
                    signal.reference_price,
                    size,
                    now,
                );
                failed.fail(&e.to_string(), now)?;
                warn!(
                    instrument = self.instrument(),
                    id = %failed.id,
                    error = %e,
                    "open settlement failed, position marked FAILED"
                );
                repository.append_trade(&failed)?;
                return Err(e);
            }
        };

        let mut position = Position::open(self.instrument(), signal.direction, fill.price, size, now);
        position.entry_commission = fill.commission;
        let sign = match signal.direction {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        };
        if self.config.take_profit_enabled {
            position.take_profit_price =
                Some(fill.price * (1.0 + sign * self.config.take_profit_percent / 100.0));
        }
        if self.config.stop_loss_enabled {
            position.stop_loss_price =
                Some(fill.price * (1.0 - sign * self.config.stop_loss_percent / 100.0));
        }

        info!(
            instrument = self.instrument(),
            id = %position.id,
            direction = %position.direction,
            entry = position.entry_price,
            size,
            confidence = signal.confidence,
            "position opened"
        );
        self.trades_opened += 1;
        self.pending_reopen = None;
        Ok(self.position.insert(position))
    }

    /// Run the lifecycle policy against `price`.
    pub fn on_tick(
        &mut self,
        price: f64,
        now: DateTime<Utc>,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<TickOutcome, EngineError> {
        let Some(position) = self.position.as_mut().filter(|p| p.is_open()) else {
            return Ok(TickOutcome::Flat);
        };
        position.observe_price(price);

        match evaluate_position(position, price, now, self.last_signal.as_ref(), &self.config) {
            PolicyDecision::Hold(reason) => Ok(TickOutcome::Held(reason)),
            PolicyDecision::ActivateTrailingStop => {
                position.activate_trailing_stop();
                info!(
                    instrument = %position.instrument,
                    peak_pct = position.peak_change_pct,
                    "trailing stop activated"
                );
                Ok(TickOutcome::TrailingActivated)
            }
            PolicyDecision::Close(decision) => {
                debug!(rule = ?decision.rule, pct = decision.price_change_pct, "close triggered");
                let direction = position.direction;
                let closed = self.close_position(decision.reason, price, now, execution, repository)?;
                if decision.request_reopen && self.auto_trade {
                    self.pending_reopen = Some(ReopenIntent {
                        after: decision.reason,
                        previous_direction: direction,
                        requested_at: now,
                    });
                }
                Ok(TickOutcome::Closed {
                    reason: decision.reason,
                    pnl: closed.realized_pnl.unwrap_or(0.0),
                    reopened: None,
                })
            }
        }
    }

    /// Settle the open position. Clears any pending reopen first.
    ///
    /// On settlement failure the position is recorded as FAILED and the error
    /// is returned; nothing is retried.
    pub fn close_position(
        &mut self,
        reason: CloseReason,
        price: f64,
        now: DateTime<Utc>,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<Position, EngineError> {
        let mut position = match self.position.take() {
            Some(p) if p.is_open() => p,
            other => {
                self.position = other;
                return Err(EngineError::NoOpenPosition {
                    instrument: self.instrument().to_string(),
                });
            }
        };
        self.pending_reopen = None;
        position.begin_close(reason)?;

        match execution.submit_close(&position, price) {
            Ok(fill) => {
                position.confirm_close(fill.price, fill.commission, now)?;
                let pnl = position.realized_pnl.unwrap_or(0.0);
                self.record_pnl(now.date_naive(), pnl);
                info!(
                    instrument = %position.instrument,
                    id = %position.id,
                    reason = %reason,
                    exit = fill.price,
                    pnl,
                    "position closed"
                );
                repository.append_trade(&position)?;
                Ok(position)
            }
            Err(e) => {
                position.fail(&e.to_string(), now)?;
                warn!(
                    instrument = %position.instrument,
                    id = %position.id,
                    error = %e,
                    "close settlement failed, position marked FAILED"
                );
                repository.append_trade(&position)?;
                Err(e)
            }
        }
    }

    pub fn manual_close(
        &mut self,
        price: f64,
        now: DateTime<Utc>,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<Position, EngineError> {
        self.close_position(CloseReason::Manual, price, now, execution, repository)
    }

    /// Act on a pending reopen intent with a fresh signal.
    ///
    /// The intent is consumed either way. Outside turbo mode the session trade
    /// cap applies and the signal must be actionable with at least
    /// `reopen_min_confidence`.
    pub fn try_reopen(
        &mut self,
        now: DateTime<Utc>,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<Option<Direction>, EngineError> {
        if self.has_open_position() || !self.auto_trade {
            return Ok(None);
        }
        let Some(intent) = self.pending_reopen.take() else {
            return Ok(None);
        };

        if !self.config.turbo_mode && self.trades_opened >= self.config.max_session_trades {
            info!(
                instrument = self.instrument(),
                trades = self.trades_opened,
                "session trade cap reached, reopen skipped"
            );
            return Ok(None);
        }

        let signal = self.evaluate_signal()?;
        if !self.config.turbo_mode
            && (!signal.actionable || signal.confidence < self.config.reopen_min_confidence)
        {
            info!(
                instrument = self.instrument(),
                confidence = signal.confidence,
                actionable = signal.actionable,
                "reopen skipped, signal too weak"
            );
            return Ok(None);
        }

        match self.open_position(&signal, now, execution, repository) {
            Ok(p) => {
                let direction = p.direction;
                info!(
                    instrument = self.instrument(),
                    after = %intent.after,
                    %direction,
                    "auto-reopened"
                );
                Ok(Some(direction))
            }
            Err(EngineError::DailyLossLimit { lost, limit }) => {
                info!(lost, limit, "reopen skipped, daily loss limit reached");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Feed one closed bar: append it, score the window, manage the open
    /// position and take entries.
    ///
    /// While the window is warming up an open position is still managed on
    /// price alone, so price exits keep firing; no entries or reopens happen
    /// until the window is ready.
    pub fn on_candle(
        &mut self,
        candle: Candle,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<TickOutcome, EngineError> {
        let now = self.close_time(&candle)?;
        self.store.append(candle)?;
        if !self.store.is_ready() {
            if self.has_open_position() {
                self.last_signal = None;
                let outcome = self.on_tick(candle.close, now, execution, repository)?;
                if matches!(outcome, TickOutcome::Closed { .. }) {
                    return Ok(outcome);
                }
            }
            return Ok(TickOutcome::Warming {
                have: self.store.len(),
                need: MIN_CANDLES,
            });
        }

        let signal = self.evaluate_signal()?;
        let price = candle.close;

        if self.has_open_position() {
            let outcome = self.on_tick(price, now, execution, repository)?;
            if let TickOutcome::Closed { reason, pnl, .. } = outcome {
                let reopened = self.try_reopen(now, execution, repository)?;
                return Ok(TickOutcome::Closed {
                    reason,
                    pnl,
                    reopened,
                });
            }
            return Ok(outcome);
        }

        if self.pending_reopen.is_some() {
            return Ok(match self.try_reopen(now, execution, repository)? {
                Some(direction) => TickOutcome::Opened {
                    direction,
                    price,
                },
                None => TickOutcome::Flat,
            });
        }

        if self.auto_trade && signal.is_tradeable() {
            return match self.open_position(&signal, now, execution, repository) {
                Ok(p) => Ok(TickOutcome::Opened {
                    direction: p.direction,
                    price: p.entry_price,
                }),
                Err(EngineError::DailyLossLimit { lost, limit }) => {
                    info!(lost, limit, "entry skipped, daily loss limit reached");
                    Ok(TickOutcome::Flat)
                }
                Err(e) => Err(e),
            };
        }

        Ok(TickOutcome::Flat)
    }

    fn close_time(&self, candle: &Candle) -> Result<DateTime<Utc>, EngineError> {
        candle
            .opened_at()
            .map(|t| t + TimeDelta::milliseconds(self.store.interval_ms()))
            .ok_or_else(|| EngineError::DataDiscontinuity {
                instrument: self.instrument().to_string(),
                kind: DiscontinuityKind::InvalidBar,
                open_time: candle.open_time,
            })
    }

    fn check_daily_loss(&self, day: NaiveDate) -> Result<(), EngineError> {
        let lost = -self.realized_pnl_on(day);
        let limit = self.equity * self.config.max_daily_loss_percent / 100.0;
        if lost > 0.0 && lost >= limit {
            return Err(EngineError::DailyLossLimit { lost, limit });
        }
        Ok(())
    }

    fn record_pnl(&mut self, day: NaiveDate, pnl: f64) {
        match self.ledger.as_mut() {
            Some(l) if l.day == day => l.realized_pnl += pnl,
            _ => {
                self.ledger = Some(DailyLedger {
                    day,
                    realized_pnl: pnl,
                })
            }
        }
    }
}

/// Sessions keyed by instrument.
#[derive(Debug, Default)]
pub struct SessionBook {
    sessions: HashMap<String, TradingSession>,
}

impl SessionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, replacing none. Fails if the instrument is taken and
    /// the existing session still holds a position.
    pub fn add_session(&mut self, session: TradingSession) -> Result<(), EngineError> {
        let key = session.instrument().to_string();
        if self.sessions.get(&key).is_some_and(|s| s.has_open_position()) {
            return Err(EngineError::PositionAlreadyOpen { instrument: key });
        }
        self.sessions.insert(key, session);
        Ok(())
    }

    pub fn get(&self, instrument: &str) -> Option<&TradingSession> {
        self.sessions.get(instrument)
    }

    pub fn get_mut(&mut self, instrument: &str) -> Option<&mut TradingSession> {
        self.sessions.get_mut(instrument)
    }

    pub fn remove(&mut self, instrument: &str) -> Option<TradingSession> {
        self.sessions.remove(instrument)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn instruments(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        let mut open: Vec<&Position> = self
            .sessions
            .values()
            .filter_map(|s| s.position())
            .filter(|p| p.status == PositionStatus::Open)
            .collect();
        open.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        open
    }

    /// Route a bar to the session for `instrument`.
    pub fn on_candle(
        &mut self,
        instrument: &str,
        candle: Candle,
        execution: &dyn ExecutionPort,
        repository: &dyn TradeRepository,
    ) -> Result<TickOutcome, EngineError> {
        let session = self
            .sessions
            .get_mut(instrument)
            .ok_or_else(|| EngineError::MarketData {
                reason: format!("no session for {instrument}"),
            })?;
        session.on_candle(candle, execution, repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repository::MemoryTradeRepository;
    use crate::adapters::paper_execution::PaperExecution;
    use crate::domain::candle::CandleBias;
    use crate::domain::signal::QualityFlags;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn session(config: TradingConfiguration) -> TradingSession {
        TradingSession::new(CandleStore::new("BTCUSDT", 60_000, 200), config, 10_000.0)
    }

    fn long_signal(price: f64) -> Signal {
        Signal {
            direction: Direction::Long,
            confidence: 85,
            conditions_met: 4,
            long_conditions: 4,
            short_conditions: 0,
            risk_reward: 2.0,
            quality: QualityFlags {
                meets_min_confidence: true,
                meets_min_risk_reward: true,
                passes_volume_filter: true,
                passes_trend_filter: true,
            },
            actionable: true,
            forced: false,
            indicator_tags: Vec::new(),
            reference_price: price,
            suggested_take_profit: None,
            suggested_stop_loss: None,
            short_term_bias: CandleBias::Neutral,
            momentum_override: None,
        }
    }

    #[test]
    fn opens_with_configured_size_and_levels() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        let p = s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();
        assert!((p.size - 1_000.0).abs() < f64::EPSILON);
        assert!((p.take_profit_price.unwrap() - 102.0).abs() < 1e-9);
        assert!((p.stop_loss_price.unwrap() - 99.0).abs() < 1e-9);
        assert_eq!(s.trades_opened(), 1);
    }

    #[test]
    fn only_one_open_position() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();
        let err = s
            .open_position(&long_signal(100.0), t0(), &exec, &repo)
            .unwrap_err();
        assert!(matches!(err, EngineError::PositionAlreadyOpen { .. }));
    }

    #[test]
    fn failed_open_is_recorded_as_failed() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        exec.fail_next(1);
        let err = s
            .open_position(&long_signal(100.0), t0(), &exec, &repo)
            .unwrap_err();
        assert!(matches!(err, EngineError::Settlement { .. }));
        assert!(s.position().is_none());
        assert_eq!(s.trades_opened(), 0);

        let trades = repo.list_trades(None).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, PositionStatus::Failed);
        assert_eq!(trades[0].direction, Direction::Long);
        assert!(trades[0].close_reason.is_none());
        assert!(trades[0].failure.is_some());
        assert_eq!(trades[0].closed_at, Some(t0()));
    }

    #[test]
    fn tick_closes_on_stop_and_records_trade() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();

        let later = t0() + TimeDelta::minutes(1);
        let outcome = s.on_tick(98.5, later, &exec, &repo).unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Closed {
                reason: CloseReason::StopLoss,
                ..
            }
        ));
        assert!(s.position().is_none());
        let trades = repo.list_trades(None).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, PositionStatus::Closed);
        assert!((trades[0].realized_pnl.unwrap() + 15.0).abs() < 1e-9);
        assert!((s.realized_pnl_on(later.date_naive()) + 15.0).abs() < 1e-9);
    }

    #[test]
    fn settlement_failure_marks_failed_without_retry() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();

        exec.fail_next(1);
        let err = s
            .manual_close(100.0, t0(), &exec, &repo)
            .unwrap_err();
        assert!(matches!(err, EngineError::Settlement { .. }));
        assert!(s.position().is_none());
        let trades = repo.list_trades(None).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, PositionStatus::Failed);
        assert_eq!(trades[0].close_reason, Some(CloseReason::Manual));
    }

    #[test]
    fn manual_close_without_position() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        let err = s.manual_close(100.0, t0(), &exec, &repo).unwrap_err();
        assert!(matches!(err, EngineError::NoOpenPosition { .. }));
    }

    #[test]
    fn close_requests_reopen_and_disable_clears_it() {
        let cfg = TradingConfiguration {
            auto_reopen_enabled: true,
            ..TradingConfiguration::default()
        };
        let mut s = session(cfg);
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();

        s.on_tick(102.5, t0() + TimeDelta::minutes(1), &exec, &repo)
            .unwrap();
        assert_eq!(
            s.pending_reopen().map(|i| i.after),
            Some(CloseReason::TakeProfit)
        );

        s.disable_auto_trade();
        assert!(s.pending_reopen().is_none());
    }

    #[test]
    fn manual_close_clears_pending_reopen() {
        let cfg = TradingConfiguration {
            auto_reopen_enabled: true,
            ..TradingConfiguration::default()
        };
        let mut s = session(cfg);
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();
        s.pending_reopen = Some(ReopenIntent {
            after: CloseReason::TakeProfit,
            previous_direction: Direction::Long,
            requested_at: t0(),
        });
        s.manual_close(100.0, t0(), &exec, &repo).unwrap();
        assert!(s.pending_reopen().is_none());
    }

    #[test]
    fn loss_without_reopen_on_loss_does_not_request() {
        let cfg = TradingConfiguration {
            auto_reopen_enabled: true,
            ..TradingConfiguration::default()
        };
        let mut s = session(cfg);
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();
        s.on_tick(98.0, t0() + TimeDelta::minutes(1), &exec, &repo)
            .unwrap();
        assert!(s.pending_reopen().is_none());
    }

    #[test]
    fn daily_loss_limit_blocks_new_entries() {
        let cfg = TradingConfiguration {
            max_daily_loss_percent: 0.1,
            ..TradingConfiguration::default()
        };
        let mut s = session(cfg);
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.open_position(&long_signal(100.0), t0(), &exec, &repo).unwrap();
        // -1.5% of 1000 = -15, limit is 10
        s.on_tick(98.5, t0() + TimeDelta::minutes(1), &exec, &repo)
            .unwrap();
        let err = s
            .open_position(&long_signal(100.0), t0() + TimeDelta::minutes(2), &exec, &repo)
            .unwrap_err();
        assert!(matches!(err, EngineError::DailyLossLimit { .. }));

        // next UTC day starts clean
        let tomorrow = t0() + TimeDelta::days(1);
        assert!(s.open_position(&long_signal(100.0), tomorrow, &exec, &repo).is_ok());
    }

    #[test]
    fn try_reopen_respects_trade_cap() {
        let cfg = TradingConfiguration {
            max_session_trades: 1,
            ..TradingConfiguration::default()
        };
        let mut s = session(cfg);
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        s.trades_opened = 1;
        s.pending_reopen = Some(ReopenIntent {
            after: CloseReason::TakeProfit,
            previous_direction: Direction::Long,
            requested_at: t0(),
        });
        assert_eq!(s.try_reopen(t0(), &exec, &repo).unwrap(), None);
        assert!(s.pending_reopen().is_none());
    }

    #[test]
    fn warming_until_minimum_window() {
        let mut s = session(TradingConfiguration::default());
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        let candle = Candle {
            open_time: 0,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 10.0,
        };
        let outcome = s.on_candle(candle, &exec, &repo).unwrap();
        assert_eq!(outcome, TickOutcome::Warming { have: 1, need: 50 });
    }

    #[test]
    fn book_keys_by_instrument() {
        let mut book = SessionBook::new();
        book.add_session(session(TradingConfiguration::default()))
            .unwrap();
        book.add_session(TradingSession::new(
            CandleStore::new("ETHUSDT", 60_000, 200),
            TradingConfiguration::default(),
            5_000.0,
        ))
        .unwrap();
        assert_eq!(book.instruments(), vec!["BTCUSDT", "ETHUSDT"]);

        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        book.get_mut("BTCUSDT")
            .unwrap()
            .open_position(&long_signal(100.0), t0(), &exec, &repo)
            .unwrap();
        assert_eq!(book.open_positions().len(), 1);
        assert!(book.get("ETHUSDT").unwrap().position().is_none());

        let err = book
            .add_session(session(TradingConfiguration::default()))
            .unwrap_err();
        assert!(matches!(err, EngineError::PositionAlreadyOpen { .. }));
    }

    #[test]
    fn book_rejects_unknown_instrument() {
        let mut book = SessionBook::new();
        let exec = PaperExecution::default();
        let repo = MemoryTradeRepository::new();
        let candle = Candle {
            open_time: 0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        assert!(book.on_candle("XRPUSDT", candle, &exec, &repo).is_err());
    }
}
