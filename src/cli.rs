//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{read_candles, CsvMarketData, CsvTradeLog};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_repository::MemoryTradeRepository;
use crate::adapters::paper_execution::PaperExecution;
use crate::domain::candle::Candle;
use crate::domain::candle_store::CandleStore;
use crate::domain::config::{AccountSettings, MarketSettings, TradingConfiguration};
use crate::domain::config_validation::{
    validate_account_config, validate_market_config, validate_trading_config,
};
use crate::domain::error::{DiscontinuityKind, EngineError};
use crate::domain::metrics::SessionSummary;
use crate::domain::position::Position;
use crate::domain::session::{TickOutcome, TradingSession};
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_repository::TradeRepository;

#[derive(Parser, Debug)]
#[command(name = "trendscout", about = "Crypto spot signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score the latest candle window and print the signal
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        /// Candle CSV to read instead of the configured data source
        #[arg(long)]
        candles: Option<PathBuf>,
    },
    /// Replay a candle file through a paper-trading session
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: PathBuf,
        /// CSV trade log to append closed positions to
        #[arg(long)]
        trades: Option<PathBuf>,
        /// Manually close any position still open after the last bar
        #[arg(long)]
        close_open: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show recorded trades and their summary
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Load a candle CSV into the SQLite candle table
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Signal { config, candles } => run_signal(&config, candles.as_ref()),
        Command::Replay {
            config,
            candles,
            trades,
            close_open,
        } => run_replay(&config, &candles, trades.as_ref(), close_open),
        Command::Validate { config } => run_validate(&config),
        Command::History {
            config,
            instrument,
            trades,
        } => run_history(&config, instrument.as_deref(), trades.as_ref()),
        Command::Import { config, candles } => run_import(&config, &candles),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn fail(e: EngineError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

/// Everything a session needs, read and validated from one config file.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub trading: TradingConfiguration,
    pub market: MarketSettings,
    pub account: AccountSettings,
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<EngineSettings, EngineError> {
    validate_trading_config(config)?;
    validate_market_config(config)?;
    validate_account_config(config)?;
    Ok(EngineSettings {
        trading: TradingConfiguration::from_config(config)?,
        market: MarketSettings::from_config(config)?,
        account: AccountSettings::from_config(config),
    })
}

pub fn build_session(settings: &EngineSettings) -> TradingSession {
    let store = CandleStore::new(
        settings.market.instrument.clone(),
        settings.market.interval_ms,
        settings.market.window,
    );
    TradingSession::new(store, settings.trading.clone(), settings.account.equity)
}

/// Candle source: `[market] data_dir` if set, else the SQLite candle table.
pub fn open_market_data(
    config: &dyn ConfigPort,
    market: &MarketSettings,
) -> Result<Box<dyn MarketDataPort>, EngineError> {
    if let Some(dir) = &market.data_dir {
        return Ok(Box::new(CsvMarketData::new(PathBuf::from(dir))));
    }

    #[cfg(feature = "sqlite")]
    {
        if config.get_string("sqlite", "path").is_some() {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            return Ok(Box::new(adapter));
        }
    }

    #[cfg(not(feature = "sqlite"))]
    let _ = config;
    Err(EngineError::ConfigMissing {
        section: "market".into(),
        key: "data_dir".into(),
    })
}

/// Pick the trade history: an explicit CSV log, then SQLite, then PostgreSQL.
/// Falls back to memory when `allow_memory` is set.
pub fn open_repository(
    config: &dyn ConfigPort,
    trades: Option<&PathBuf>,
    allow_memory: bool,
) -> Result<Box<dyn TradeRepository>, EngineError> {
    if let Some(path) = trades {
        return Ok(Box::new(CsvTradeLog::new(path.clone())));
    }

    #[cfg(feature = "sqlite")]
    {
        if config.get_string("sqlite", "path").is_some() {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            return Ok(Box::new(adapter));
        }
    }

    #[cfg(feature = "postgres")]
    {
        if config.get_string("postgres", "connection_string").is_some() {
            let adapter = crate::adapters::postgres_adapter::PostgresAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            return Ok(Box::new(adapter));
        }
    }

    if allow_memory {
        return Ok(Box::new(MemoryTradeRepository::new()));
    }
    Err(EngineError::ConfigMissing {
        section: "sqlite".into(),
        key: "path".into(),
    })
}

fn run_signal(config_path: &PathBuf, candles_path: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let settings = match build_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let candles = match candles_path {
        Some(path) => read_candles(path),
        None => open_market_data(&adapter, &settings.market).and_then(|port| {
            port.fetch_candles(
                &settings.market.instrument,
                settings.market.interval_ms,
                settings.market.window,
            )
        }),
    };
    let candles = match candles {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    match evaluate_latest(&settings, &candles) {
        Ok(signal) => {
            println!("{}", format_signal(&settings.market.instrument, &signal));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Load the newest `window` bars into a fresh session and score them.
pub fn evaluate_latest(
    settings: &EngineSettings,
    candles: &[Candle],
) -> Result<Signal, EngineError> {
    let mut session = build_session(settings);
    let start = candles.len().saturating_sub(settings.market.window);
    session.ingest(&candles[start..])?;
    session.evaluate_signal()
}

pub fn format_signal(instrument: &str, signal: &Signal) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let level = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));

    let mut out = format!(
        "{instrument} {} confidence {} ({} of 6 conditions, long {} / short {})\n",
        signal.direction,
        signal.confidence,
        signal.conditions_met,
        signal.long_conditions,
        signal.short_conditions,
    );
    out.push_str(&format!(
        "  risk/reward {:.2}  quality {}  actionable {}  forced {}\n",
        signal.risk_reward,
        yes_no(signal.is_quality()),
        yes_no(signal.actionable),
        yes_no(signal.forced),
    ));
    out.push_str(&format!(
        "  price {:.4}  take profit {}  stop loss {}\n",
        signal.reference_price,
        level(signal.suggested_take_profit),
        level(signal.suggested_stop_loss),
    ));
    if let Some(o) = &signal.momentum_override {
        out.push_str(&format!("  momentum override: {o:?}\n"));
    }
    out.push_str(&format!("  tags: {}", signal.indicator_tags.join(", ")));
    out
}

/// Counters and results of a replay.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub bars: usize,
    pub warming: usize,
    pub opened: usize,
    pub rejected: usize,
    pub gaps: usize,
    pub settlement_failures: usize,
    pub open_position: Option<Position>,
    pub summary: SessionSummary,
}

/// Feed every bar to `session` in order.
///
/// Duplicate and out-of-order bars are skipped. A gap resets the window and
/// the session warms up again from the bar after it. Settlement failures are
/// logged and the replay carries on.
pub fn run_replay_pipeline(
    session: &mut TradingSession,
    candles: &[Candle],
    execution: &dyn ExecutionPort,
    repository: &dyn TradeRepository,
    close_open: bool,
) -> Result<ReplayReport, EngineError> {
    let instrument = session.instrument().to_string();
    let already_recorded = repository.list_trades(Some(&instrument))?.len();

    let mut bars = 0usize;
    let mut warming = 0usize;
    let mut opened = 0usize;
    let mut rejected = 0usize;
    let mut gaps = 0usize;
    let mut settlement_failures = 0usize;

    for candle in candles {
        bars += 1;
        let mut result = session.on_candle(*candle, execution, repository);
        if let Err(EngineError::DataDiscontinuity {
            kind: DiscontinuityKind::Gap,
            ..
        }) = result
        {
            gaps += 1;
            session.reset_window();
            result = session.on_candle(*candle, execution, repository);
        }

        match result {
            Ok(TickOutcome::Warming { .. }) => warming += 1,
            Ok(TickOutcome::Opened { .. }) => opened += 1,
            Ok(TickOutcome::Closed {
                reopened: Some(_), ..
            }) => opened += 1,
            Ok(_) => {}
            Err(EngineError::DataDiscontinuity { .. }) => rejected += 1,
            Err(e @ EngineError::Settlement { .. }) => {
                warn!(open_time = candle.open_time, error = %e, "settlement failed during replay");
                settlement_failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if close_open && session.has_open_position() {
        if let Some(last) = session.store().last().copied() {
            let now = last
                .opened_at()
                .map(|t| t + chrono::TimeDelta::milliseconds(session.store().interval_ms()))
                .unwrap_or_else(chrono::Utc::now);
            match session.manual_close(last.close, now, execution, repository) {
                Ok(p) => info!(id = %p.id, "open position closed at end of replay"),
                Err(e @ EngineError::Settlement { .. }) => {
                    warn!(error = %e, "final close failed");
                    settlement_failures += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    let trades = repository.list_trades(Some(&instrument))?;
    let this_run = trades.get(already_recorded..).unwrap_or_default();
    Ok(ReplayReport {
        bars,
        warming,
        opened,
        rejected,
        gaps,
        settlement_failures,
        open_position: session.position().filter(|p| p.is_open()).cloned(),
        summary: SessionSummary::compute(this_run, session.equity()),
    })
}

fn run_replay(
    config_path: &PathBuf,
    candles_path: &Path,
    trades_path: Option<&PathBuf>,
    close_open: bool,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let settings = match build_settings(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let candles = match read_candles(candles_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let repository = match open_repository(&adapter, trades_path, true) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let execution = PaperExecution::from_settings(&settings.account);
    let mut session = build_session(&settings);

    eprintln!(
        "Replaying {} bars of {} ({} ms)",
        candles.len(),
        settings.market.instrument,
        settings.market.interval_ms
    );

    let report = match run_replay_pipeline(
        &mut session,
        &candles,
        &execution,
        repository.as_ref(),
        close_open,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    println!(
        "Bars: {} (warming {}, rejected {}, gaps {})",
        report.bars, report.warming, report.rejected, report.gaps
    );
    println!(
        "Positions opened: {}  settlement failures: {}",
        report.opened, report.settlement_failures
    );
    if let Some(p) = &report.open_position {
        println!(
            "Still open: {} {} @ {:.4} since {}",
            p.direction,
            p.instrument,
            p.entry_price,
            p.opened_at.to_rfc3339()
        );
    }
    println!("{}", format_summary(&report.summary));
    ExitCode::SUCCESS
}

pub fn format_summary(s: &SessionSummary) -> String {
    let mut out = String::from("=== Session Summary ===\n");
    out.push_str(&format!("Starting Equity:  {:.2}\n", s.starting_equity));
    out.push_str(&format!("Ending Equity:    {:.2}\n", s.ending_equity));
    out.push_str(&format!("Total PnL:        {:.2}\n", s.total_pnl));
    out.push_str(&format!("Max Drawdown:     -{:.1}%\n", s.max_drawdown * 100.0));
    out.push_str(&format!(
        "Closed Trades:    {} (won {}, lost {}, flat {})\n",
        s.closed_trades, s.trades_won, s.trades_lost, s.trades_breakeven
    ));
    out.push_str(&format!("Failed Trades:    {}\n", s.failed_trades));
    out.push_str(&format!("Win Rate:         {:.1}%\n", s.win_rate * 100.0));
    out.push_str(&format!("Profit Factor:    {:.2}\n", s.profit_factor));
    out.push_str(&format!("Avg Win:          {:.2}\n", s.avg_win));
    out.push_str(&format!("Avg Loss:         {:.2}\n", s.avg_loss));
    out.push_str(&format!("Largest Win:      {:.2}\n", s.largest_win));
    out.push_str(&format!("Largest Loss:     {:.2}\n", s.largest_loss));
    out.push_str(&format!("Avg Hold:         {:.0}s", s.avg_hold_secs));
    for (reason, count) in &s.by_reason {
        out.push_str(&format!("\n  {reason}: {count}"));
    }
    out
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match build_settings(&adapter) {
        Ok(settings) => {
            println!("Configuration is valid.");
            println!(
                "  instrument {}  interval {} ms  window {}",
                settings.market.instrument, settings.market.interval_ms, settings.market.window
            );
            println!(
                "  min confidence {}  min risk/reward {:.2}  turbo {}",
                settings.trading.min_confidence,
                settings.trading.min_risk_reward,
                settings.trading.turbo_mode
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_history(
    config_path: &PathBuf,
    instrument: Option<&str>,
    trades_path: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let repository = match open_repository(&adapter, trades_path, false) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let filter = instrument.map(str::to_uppercase);
    let trades = match repository.list_trades(filter.as_deref()) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    if trades.is_empty() {
        println!("No trades recorded.");
        return ExitCode::SUCCESS;
    }

    println!(
        "{:<10} {:<5} {:<7} {:>12} {:>12} {:>10} {:<12} {}",
        "INSTRUMENT", "DIR", "STATUS", "ENTRY", "EXIT", "PNL", "REASON", "CLOSED"
    );
    for t in &trades {
        println!(
            "{:<10} {:<5} {:<7} {:>12.4} {:>12} {:>10} {:<12} {}",
            t.instrument,
            t.direction.as_str(),
            t.status.as_str(),
            t.entry_price,
            t.exit_price.map_or_else(|| "-".into(), |p| format!("{p:.4}")),
            t.realized_pnl
                .map_or_else(|| "-".into(), |p| format!("{p:.2}")),
            t.close_reason.map_or("-", |r| r.as_str()),
            t.closed_at.map_or_else(|| "-".into(), |at| at.to_rfc3339()),
        );
    }

    let equity = AccountSettings::from_config(&adapter).equity;
    println!("\n{}", format_summary(&SessionSummary::compute(&trades, equity)));
    ExitCode::SUCCESS
}

fn run_import(config_path: &PathBuf, candles_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_market_config(&adapter) {
        return fail(e);
    }
    let market = match MarketSettings::from_config(&adapter) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    let candles = match read_candles(candles_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let result = SqliteAdapter::from_config(&adapter).and_then(|db| {
            db.initialize_schema()?;
            db.insert_candles(&market.instrument, market.interval_ms, &candles)
        });
        match result {
            Ok(()) => {
                println!("Imported {} bars for {}", candles.len(), market.instrument);
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&market, &candles);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}
