//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_feed::JsonLinesFeed;
use crate::adapters::memory_store::MemoryStore;
use crate::domain::aggregator::CandleAggregator;
use crate::domain::backtest::BacktestEngine;
use crate::domain::candle::BarDuration;
use crate::domain::config::TradingConfig;
use crate::domain::error::TraderError;
use crate::domain::frame::{CandleFrame, FrameRequest};
use crate::domain::ledger::SignalLedger;
use crate::domain::optimizer::Optimizer;
use crate::domain::trade_params::{Family, TradeParams};
use crate::domain::trading::{SharedCandleStore, SharedSignalStore, TradingEngine};
use crate::ports::config_port::ConfigPort;
use crate::ports::feed_port::TickFeed;

/// Ticks buffered between the feed reader and the engine.
const FEED_BUFFER: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "candletrader", about = "Tick-to-candle aggregation and indicator ensemble trading")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate a JSON-lines ticker feed and trade on it
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Feed file; stdin when omitted
        #[arg(short, long)]
        feed: Option<PathBuf>,
    },
    /// Grid-search trade parameters over stored candles
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay stored candles through one indicator family
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        family: Family,
        /// Use the optimizer's parameters instead of the defaults
        #[arg(long)]
        optimized: bool,
    },
    /// Load historical candles from CSV into the store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "1h")]
        duration: BarDuration,
    },
    /// Print candles and requested indicators as JSON
    Frame {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        duration: Option<BarDuration>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        sma: bool,
        #[arg(long)]
        ema: bool,
        #[arg(long)]
        bbands: bool,
        #[arg(long)]
        ichimoku: bool,
        #[arg(long)]
        rsi: bool,
        #[arg(long)]
        macd: bool,
        #[arg(long)]
        hv: bool,
        #[arg(long)]
        events: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), TraderError> {
    let json_logs = cli.json_logs;
    match cli.command {
        Command::Run { config, feed } => run_trader(&config, feed.as_deref(), json_logs),
        Command::Optimize { config } => run_optimize(&config, json_logs),
        Command::Backtest {
            config,
            family,
            optimized,
        } => run_backtest(&config, family, optimized, json_logs),
        Command::Import {
            config,
            csv,
            duration,
        } => run_import(&config, &csv, duration, json_logs),
        Command::Frame {
            config,
            duration,
            limit,
            sma,
            ema,
            bbands,
            ichimoku,
            rsi,
            macd,
            hv,
            events,
        } => {
            let request = FrameRequest {
                limit: FrameRequest::clamp_limit(limit),
                sma: sma.then_some(FrameRequest::SMA_PERIODS),
                ema: ema.then_some(FrameRequest::EMA_PERIODS),
                bbands: bbands.then_some(FrameRequest::BBANDS),
                ichimoku,
                rsi: rsi.then_some(FrameRequest::RSI_PERIOD),
                macd: macd.then_some(FrameRequest::MACD_PERIODS),
                hv: hv.then_some(FrameRequest::HV_PERIODS),
                events,
            };
            run_frame(&config, duration, &request, json_logs)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    FileConfigAdapter::from_file(path)
}

/// Install the global subscriber. `RUST_LOG` overrides `level`; with a log
/// file, events go to both stderr and the file. A subscriber installed
/// earlier in the process is left in place.
pub fn init_logging(level: &str, log_file: Option<&str>, json: bool) -> Result<(), TraderError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file)))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already set");
    }
    Ok(())
}

/// Load and validate the config file, then start logging as it directs.
fn setup(config_path: &Path, json_logs: bool) -> Result<(FileConfigAdapter, TradingConfig), TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = TradingConfig::from_config(&adapter)?;
    init_logging(&config.log_level, config.log_file.as_deref(), json_logs)?;
    Ok((adapter, config))
}

/// SQLite when `[sqlite] path` is set, otherwise an in-process store.
pub fn open_stores(adapter: &dyn ConfigPort) -> Result<(SharedCandleStore, SharedSignalStore), TraderError> {
    #[cfg(feature = "sqlite")]
    {
        if adapter.get_string("sqlite", "path").is_some() {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let sqlite = Arc::new(SqliteAdapter::from_config(adapter)?);
            sqlite.initialize_schema()?;
            let candles: SharedCandleStore = sqlite.clone();
            let signals: SharedSignalStore = sqlite;
            return Ok((candles, signals));
        }
    }
    #[cfg(not(feature = "sqlite"))]
    let _ = adapter;

    let memory = Arc::new(MemoryStore::new());
    let candles: SharedCandleStore = memory.clone();
    let signals: SharedSignalStore = memory;
    Ok((candles, signals))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), TraderError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| TraderError::Internal {
        reason: format!("serialize output: {e}"),
    })?;
    println!("{text}");
    Ok(())
}

fn run_trader(config_path: &Path, feed_path: Option<&Path>, json_logs: bool) -> Result<(), TraderError> {
    let (adapter, config) = setup(config_path, json_logs)?;
    let (candles, signals) = open_stores(&adapter)?;

    let feed = match feed_path {
        Some(path) => JsonLinesFeed::from_path(path)?,
        None => JsonLinesFeed::stdin(),
    };
    let aggregator = CandleAggregator::new(candles.clone());
    let engine = TradingEngine::new(config, candles, signals)?;
    let product_code = engine.config().product_code.clone();

    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(async {
        let (tx, rx) = tokio::sync::mpsc::channel(FEED_BUFFER);
        let reader = tokio::task::spawn_blocking(move || feed.subscribe(&product_code, tx));
        let stats = engine.drive(&aggregator, rx).await;
        let fed = reader.await.map_err(|e| TraderError::Internal {
            reason: format!("feed task failed: {e}"),
        })?;
        fed.map(|()| stats)
    })?;
    engine.wait_for_optimizer()?;

    eprintln!(
        "Processed {} ticks: {} cycles ({} skipped), {} buys, {} sells, {} errors",
        stats.ticks, stats.cycles, stats.skipped, stats.buys, stats.sells, stats.errors
    );
    print_json(&engine.ledger()?)
}

fn run_optimize(config_path: &Path, json_logs: bool) -> Result<(), TraderError> {
    let (adapter, config) = setup(config_path, json_logs)?;
    let (candles, _) = open_stores(&adapter)?;
    let series = candles.read_recent_candles(&config.product_code, config.trade_duration, config.data_limit)?;
    eprintln!("Optimizing over {} candles", series.len());

    let never = AtomicBool::new(false);
    match Optimizer::new(config.num_ranking).optimize_cancellable(&series, &never) {
        Some(optimization) => print_json(&optimization),
        None => Err(TraderError::Internal {
            reason: "optimization cancelled".to_string(),
        }),
    }
}

fn run_backtest(config_path: &Path, family: Family, optimized: bool, json_logs: bool) -> Result<(), TraderError> {
    let (adapter, config) = setup(config_path, json_logs)?;
    let (candles, _) = open_stores(&adapter)?;
    let series = candles.read_recent_candles(&config.product_code, config.trade_duration, config.data_limit)?;

    let params = if optimized {
        Optimizer::new(config.num_ranking).optimize(&series)
    } else {
        TradeParams::default()
    };
    info!(%family, candles = series.len(), optimized, "running backtest");

    match BacktestEngine::new(&series).run(family, &params) {
        Some(ledger) => {
            eprintln!("{family}: {} signals, profit {:.2}", ledger.len(), ledger.profit());
            print_json(&ledger)
        }
        None => {
            eprintln!("{family}: not enough history ({} candles)", series.len());
            Ok(())
        }
    }
}

fn run_import(config_path: &Path, csv_path: &Path, duration: BarDuration, json_logs: bool) -> Result<(), TraderError> {
    let (adapter, config) = setup(config_path, json_logs)?;
    let (candles, _) = open_stores(&adapter)?;
    let series = CsvAdapter::read_file(csv_path, &config.product_code, duration)?;
    for candle in &series.candles {
        candles.upsert_candle(candle)?;
    }
    eprintln!(
        "Imported {} {} candles for {}",
        series.len(),
        duration,
        config.product_code
    );
    Ok(())
}

fn run_frame(
    config_path: &Path,
    duration: Option<BarDuration>,
    request: &FrameRequest,
    json_logs: bool,
) -> Result<(), TraderError> {
    let (adapter, config) = setup(config_path, json_logs)?;
    let (candles, signals) = open_stores(&adapter)?;
    let duration = duration.unwrap_or(config.trade_duration);
    let series = candles.read_recent_candles(&config.product_code, duration, request.limit)?;

    let mut frame = CandleFrame::new(series);
    request.apply(&mut frame, |since| {
        signals
            .read_signal_events_since(since)
            .map(SignalLedger::from_events)
    })?;
    print_json(&frame)
}
