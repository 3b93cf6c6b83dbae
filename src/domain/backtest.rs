//! Replays a candle series through one indicator family's rule.
//!
//! Each backtest returns `None` when the series is too short for the family's
//! lookback, otherwise the unpersisted ledger of the trades the rule made.

use crate::domain::candle::CandleSeries;
use crate::domain::indicator::ichimoku::SENKOU_B_PERIOD;
use crate::domain::ledger::SignalLedger;
use crate::domain::rules::FamilyLines;
use crate::domain::signal::Side;
use crate::domain::trade_params::{Family, TradeParams};

/// Every simulated trade is for one unit.
pub const BACKTEST_SIZE: f64 = 1.0;

pub struct BacktestEngine<'a> {
    series: &'a CandleSeries,
    closes: Vec<f64>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(series: &'a CandleSeries) -> Self {
        BacktestEngine {
            closes: series.closes(),
            series,
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn ema(&self, period1: usize, period2: usize) -> Option<SignalLedger> {
        if self.len() <= period1 || self.len() <= period2 {
            return None;
        }
        Some(self.replay(&FamilyLines::ema(&self.closes, period1, period2)))
    }

    pub fn bb(&self, n: usize, k: f64) -> Option<SignalLedger> {
        if self.len() <= n {
            return None;
        }
        Some(self.replay(&FamilyLines::bb(&self.closes, n, k)))
    }

    pub fn macd(&self, fast: usize, slow: usize, signal: usize) -> Option<SignalLedger> {
        if self.len() <= fast || self.len() <= slow || self.len() <= signal {
            return None;
        }
        Some(self.replay(&FamilyLines::macd(&self.closes, fast, slow, signal)))
    }

    pub fn ichimoku(&self) -> Option<SignalLedger> {
        if self.len() <= SENKOU_B_PERIOD {
            return None;
        }
        Some(self.replay(&FamilyLines::ichimoku(&self.closes)))
    }

    pub fn rsi(&self, period: usize, buy_threshold: f64, sell_threshold: f64) -> Option<SignalLedger> {
        if self.len() <= period {
            return None;
        }
        Some(self.replay(&FamilyLines::rsi(
            &self.closes,
            period,
            buy_threshold,
            sell_threshold,
        )))
    }

    /// Backtest `family` with the parameters held in `params`, ignoring its enable flag.
    pub fn run(&self, family: Family, params: &TradeParams) -> Option<SignalLedger> {
        match family {
            Family::Ema => self.ema(params.ema.period1, params.ema.period2),
            Family::Bb => self.bb(params.bb.n, params.bb.k),
            Family::Macd => self.macd(
                params.macd.fast_period,
                params.macd.slow_period,
                params.macd.signal_period,
            ),
            Family::Ichimoku => self.ichimoku(),
            Family::Rsi => self.rsi(
                params.rsi.period,
                params.rsi.buy_threshold,
                params.rsi.sell_threshold,
            ),
        }
    }

    fn replay(&self, lines: &FamilyLines) -> SignalLedger {
        let candles = &self.series.candles;
        let mut ledger = SignalLedger::new();
        for i in 1..candles.len() {
            let vote = lines.vote(candles, i);
            let candle = &candles[i];
            if vote.buy {
                ledger.record(
                    Side::Buy,
                    &self.series.product_code,
                    candle.time,
                    candle.close,
                    BACKTEST_SIZE,
                );
            }
            if vote.sell {
                ledger.record(
                    Side::Sell,
                    &self.series.product_code,
                    candle.time,
                    candle.close,
                    BACKTEST_SIZE,
                );
            }
        }
        ledger
    }
}
