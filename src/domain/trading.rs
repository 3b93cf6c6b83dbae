//! Live trading engine.
//!
//! Each roll-over of the trade duration runs one evaluation cycle over the
//! recent closed candles. Enabled families vote per candle; any buy vote opens
//! a position and arms the stop-limit, any sell vote (or a close under the
//! stop-limit) closes it and schedules a fresh optimization pass.
//!
//! At most one cycle runs at a time. A cycle that finds the guard taken is
//! dropped, not queued.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::Receiver;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

use crate::domain::aggregator::CandleAggregator;
use crate::domain::candle::{Candle, CandleSeries};
use crate::domain::config::TradingConfig;
use crate::domain::error::TraderError;
use crate::domain::ledger::SignalLedger;
use crate::domain::optimizer::Optimizer;
use crate::domain::rules::FamilyLines;
use crate::domain::signal::Side;
use crate::domain::tick::Tick;
use crate::domain::trade_params::TradeParams;
use crate::ports::candle_port::CandleStore;
use crate::ports::signal_port::SignalStore;

pub type SharedCandleStore = Arc<dyn CandleStore + Send + Sync>;
pub type SharedSignalStore = Arc<dyn SignalStore + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Another cycle held the trade guard.
    Skipped,
    Completed { buys: usize, sells: usize },
}

/// Counters for one feed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    pub ticks: usize,
    pub cycles: usize,
    pub skipped: usize,
    pub buys: usize,
    pub sells: usize,
    pub errors: usize,
}

struct TradeState {
    ledger: SignalLedger,
    /// 0 while no stop-limit is armed.
    stop_limit: f64,
}

struct OptimizerPass {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct TradingEngine {
    config: TradingConfig,
    candles: SharedCandleStore,
    signals: SharedSignalStore,
    optimizer: Optimizer,
    params: Arc<RwLock<Arc<TradeParams>>>,
    state: Mutex<TradeState>,
    guard: Semaphore,
    pass: Mutex<Option<OptimizerPass>>,
}

fn internal(what: &str) -> TraderError {
    TraderError::Internal {
        reason: format!("{what} lock poisoned"),
    }
}

impl TradingEngine {
    /// Builds the engine and runs one optimization pass before returning.
    ///
    /// Outside back-test mode the ledger resumes from the last persisted signal.
    pub fn new(
        config: TradingConfig,
        candles: SharedCandleStore,
        signals: SharedSignalStore,
    ) -> Result<Self, TraderError> {
        config.validate()?;

        let ledger = if config.back_test {
            SignalLedger::new()
        } else {
            SignalLedger::from_events(
                signals.read_recent_signal_events(&config.product_code, 1)?,
            )
        };

        let optimizer = Optimizer::new(config.num_ranking);
        let series = candles.read_recent_candles(
            &config.product_code,
            config.trade_duration,
            config.data_limit,
        )?;
        let params = optimizer.optimize(&series);

        info!(
            product_code = %config.product_code,
            duration = %config.trade_duration,
            back_test = config.back_test,
            resumed_side = ?ledger.last().map(|s| s.side),
            "trading engine ready"
        );

        Ok(TradingEngine {
            config,
            candles,
            signals,
            optimizer,
            params: Arc::new(RwLock::new(Arc::new(params))),
            state: Mutex::new(TradeState {
                ledger,
                stop_limit: 0.0,
            }),
            guard: Semaphore::new(1),
            pass: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// The parameter set the next cycle will use.
    pub fn params(&self) -> Result<Arc<TradeParams>, TraderError> {
        self.params
            .read()
            .map(|p| Arc::clone(&p))
            .map_err(|_| internal("trade params"))
    }

    /// Replace the parameter set wholesale.
    pub fn publish_params(&self, params: TradeParams) -> Result<(), TraderError> {
        let mut slot = self.params.write().map_err(|_| internal("trade params"))?;
        *slot = Arc::new(params);
        Ok(())
    }

    pub fn ledger(&self) -> Result<SignalLedger, TraderError> {
        Ok(self.lock_state()?.ledger.clone())
    }

    pub fn stop_limit(&self) -> Result<f64, TraderError> {
        Ok(self.lock_state()?.stop_limit)
    }

    /// Signals at or after `time`: the in-memory ledger in back-test mode,
    /// persisted history otherwise.
    pub fn events_since(&self, time: DateTime<Utc>) -> Result<SignalLedger, TraderError> {
        if self.config.back_test {
            Ok(self.lock_state()?.ledger.collect_after(time))
        } else {
            Ok(SignalLedger::from_events(
                self.signals.read_signal_events_since(time)?,
            ))
        }
    }

    /// Evaluate the candles that closed before the bar opened at `opened_at`.
    pub fn on_bar_opened(&self, opened_at: DateTime<Utc>) -> Result<Cycle, TraderError> {
        let Some(permit) = self.try_guard() else {
            return Ok(Cycle::Skipped);
        };
        let series = self.closed_candles(Some(opened_at))?;
        self.finish(permit, &series, Some(opened_at))
    }

    /// Evaluate an explicit candle window.
    pub fn trade(&self, series: &CandleSeries) -> Result<Cycle, TraderError> {
        let Some(permit) = self.try_guard() else {
            return Ok(Cycle::Skipped);
        };
        self.finish(permit, series, None)
    }

    /// Aggregate ticks until the channel closes, evaluating on each roll-over
    /// of the trade duration. Failures are logged and the next tick proceeds.
    pub async fn drive(&self, aggregator: &CandleAggregator, mut ticks: Receiver<Tick>) -> DriveStats {
        let mut stats = DriveStats::default();
        while let Some(tick) = ticks.recv().await {
            stats.ticks += 1;
            if tick.product_code != self.config.product_code {
                debug!(product_code = %tick.product_code, "ignoring tick for another product");
                continue;
            }

            let opened = match aggregator.ingest_all(&tick, &self.config.durations) {
                Ok(opened) => opened,
                Err(e) => {
                    error!(error = %e, "candle ingest failed");
                    stats.errors += 1;
                    continue;
                }
            };
            if !opened.contains(&self.config.trade_duration) {
                continue;
            }

            match self.on_bar_opened(tick.bar_start(self.config.trade_duration)) {
                Ok(Cycle::Completed { buys, sells }) => {
                    stats.cycles += 1;
                    stats.buys += buys;
                    stats.sells += sells;
                }
                Ok(Cycle::Skipped) => stats.skipped += 1,
                Err(e) => {
                    error!(error = %e, "evaluation cycle aborted");
                    stats.errors += 1;
                }
            }
        }
        info!(ticks = stats.ticks, cycles = stats.cycles, errors = stats.errors, "tick feed ended");
        stats
    }

    /// Start an optimization pass over the recent candles.
    ///
    /// In background mode any in-flight pass is cancelled and the new one runs
    /// on its own thread; a cancelled pass never publishes.
    pub fn refresh_params(&self) -> Result<(), TraderError> {
        self.refresh_before(None)
    }

    /// Like [`refresh_params`](Self::refresh_params), over the candles that
    /// closed before `opened_at` when given.
    fn refresh_before(&self, opened_at: Option<DateTime<Utc>>) -> Result<(), TraderError> {
        let series = self.closed_candles(opened_at)?;
        if !self.config.background_optimize {
            // Inline passes must not stall the other workers of a multi-thread runtime.
            let params = match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| self.optimizer.optimize(&series))
                }
                _ => self.optimizer.optimize(&series),
            };
            return self.publish_params(params);
        }

        let mut pass = self.pass.lock().map_err(|_| internal("optimizer pass"))?;
        if let Some(previous) = pass.take() {
            previous.cancel.store(true, Ordering::Relaxed);
            debug!("cancelled in-flight optimizer pass");
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let slot = Arc::clone(&self.params);
        let optimizer = self.optimizer;
        let handle = std::thread::Builder::new()
            .name("optimizer".to_string())
            .spawn(move || {
                let Some(optimization) = optimizer.optimize_cancellable(&series, &flag) else {
                    debug!("optimizer pass cancelled");
                    return;
                };
                match slot.write() {
                    Ok(mut current) if !flag.load(Ordering::Relaxed) => {
                        *current = Arc::new(optimization.params);
                    }
                    Ok(_) => debug!("optimizer pass cancelled before publish"),
                    Err(_) => error!("trade params lock poisoned"),
                }
            })?;
        *pass = Some(OptimizerPass { cancel, handle });
        Ok(())
    }

    /// Block until the current background pass, if any, has finished.
    pub fn wait_for_optimizer(&self) -> Result<(), TraderError> {
        let pass = self
            .pass
            .lock()
            .map_err(|_| internal("optimizer pass"))?
            .take();
        if let Some(pass) = pass {
            pass.handle.join().map_err(|_| TraderError::Internal {
                reason: "optimizer thread panicked".to_string(),
            })?;
        }
        Ok(())
    }

    fn try_guard(&self) -> Option<SemaphorePermit<'_>> {
        match self.guard.try_acquire() {
            Ok(permit) => Some(permit),
            Err(_) => {
                debug!("trade guard busy; skipping cycle");
                None
            }
        }
    }

    /// The cycle's trades are already recorded when the refresh runs, so a
    /// refresh failure is logged and the outcome still returned.
    fn finish(
        &self,
        permit: SemaphorePermit<'_>,
        series: &CandleSeries,
        opened_at: Option<DateTime<Utc>>,
    ) -> Result<Cycle, TraderError> {
        let (cycle, sold) = self.evaluate(series)?;
        drop(permit);
        if sold {
            if let Err(e) = self.refresh_before(opened_at) {
                error!(error = %e, "re-optimization after sell failed; keeping current params");
            }
        }
        Ok(cycle)
    }

    /// Returns the cycle outcome and whether a position was closed.
    fn evaluate(&self, series: &CandleSeries) -> Result<(Cycle, bool), TraderError> {
        let params = self.params()?;
        let closes = series.closes();
        let lines: Vec<FamilyLines> = params
            .enabled_families()
            .into_iter()
            .map(|family| FamilyLines::for_params(family, &params, &closes))
            .collect();

        let candles = &series.candles;
        let mut state = self.lock_state()?;
        let (mut buys, mut sells) = (0, 0);

        for i in 1..candles.len() {
            let (buy_point, sell_point) = lines
                .iter()
                .map(|l| l.vote(candles, i))
                .fold((0, 0), |(b, s), v| (b + usize::from(v.buy), s + usize::from(v.sell)));
            let candle = &candles[i];

            if buy_point > 0 {
                if !self.place(&mut state.ledger, Side::Buy, candle)? {
                    continue;
                }
                state.stop_limit = candle.close * self.config.stop_limit_percent;
                buys += 1;
            }

            if sell_point > 0 || state.stop_limit > candle.close {
                if !self.place(&mut state.ledger, Side::Sell, candle)? {
                    continue;
                }
                state.stop_limit = 0.0;
                sells += 1;
            }
        }

        Ok((Cycle::Completed { buys, sells }, sells > 0))
    }

    /// A duplicate-key conflict is logged and treated as not recorded.
    fn place(&self, ledger: &mut SignalLedger, side: Side, candle: &Candle) -> Result<bool, TraderError> {
        let store: Option<&dyn SignalStore> = if self.config.back_test {
            None
        } else {
            Some(&*self.signals)
        };
        let code = &self.config.product_code;
        let size = self.config.trade_size;
        let placed = match side {
            Side::Buy => ledger.buy(code, candle.time, candle.close, size, store),
            Side::Sell => ledger.sell(code, candle.time, candle.close, size, store),
        };
        match placed {
            Ok(true) => {
                info!(%side, time = %candle.time, price = candle.close, size, "signal recorded");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(TraderError::DuplicateSignal { time }) => {
                warn!(%side, %time, "signal conflict; trade not recorded");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The newest `data_limit` candles; with `opened_at`, only those that
    /// closed before that bar opened.
    fn closed_candles(&self, opened_at: Option<DateTime<Utc>>) -> Result<CandleSeries, TraderError> {
        let limit = self.config.data_limit;
        let Some(opened_at) = opened_at else {
            return self.candles.read_recent_candles(
                &self.config.product_code,
                self.config.trade_duration,
                limit,
            );
        };
        let mut series = self
            .candles
            .read_recent_candles(&self.config.product_code, self.config.trade_duration, limit + 1)?
            .before(opened_at);
        let excess = series.len().saturating_sub(limit);
        series.candles.drain(..excess);
        Ok(series)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, TradeState>, TraderError> {
        self.state.lock().map_err(|_| internal("trade state"))
    }
}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        if let Ok(mut pass) = self.pass.lock() {
            if let Some(pass) = pass.take() {
                pass.cancel.store(true, Ordering::Relaxed);
            }
        }
    }
}
