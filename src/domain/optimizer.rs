//! Grid search over each indicator family's parameters.
//!
//! Every family keeps the parameter tuple with the highest back-tested profit
//! (falling back to conventional defaults when nothing beats zero). Families
//! are then ranked by that profit and the top `num_ranking` profitable ones
//! are enabled.

use serde::Serialize;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::domain::backtest::BacktestEngine;
use crate::domain::candle::CandleSeries;
use crate::domain::ledger::SignalLedger;
use crate::domain::trade_params::{Family, Ranking, TradeParams};

pub const EMA_PERIOD1_RANGE: Range<usize> = 5..50;
pub const EMA_PERIOD2_RANGE: Range<usize> = 12..50;
pub const BB_N_RANGE: Range<usize> = 10..20;
pub const BB_K_VALUES: [f64; 2] = [1.9, 2.0];
pub const MACD_FAST_RANGE: Range<usize> = 10..19;
pub const MACD_SLOW_RANGE: Range<usize> = 20..30;
pub const MACD_SIGNAL_RANGE: Range<usize> = 5..15;
pub const RSI_PERIOD_RANGE: Range<usize> = 5..25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Optimizer {
    num_ranking: usize,
}

/// Outcome of one optimization pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Optimization {
    pub params: TradeParams,
    /// Sorted best first.
    pub rankings: Vec<Ranking>,
}

impl Optimizer {
    pub fn new(num_ranking: usize) -> Self {
        Optimizer { num_ranking }
    }

    pub fn num_ranking(&self) -> usize {
        self.num_ranking
    }

    pub fn optimize(&self, series: &CandleSeries) -> TradeParams {
        let never = AtomicBool::new(false);
        self.optimize_cancellable(series, &never)
            .map(|o| o.params)
            .unwrap_or_default()
    }

    /// Runs the full grid; returns `None` as soon as `cancel` is observed set.
    pub fn optimize_cancellable(
        &self,
        series: &CandleSeries,
        cancel: &AtomicBool,
    ) -> Option<Optimization> {
        let search = Search {
            engine: BacktestEngine::new(series),
            cancel,
        };
        let mut params = TradeParams::default();

        let ema = search.ema(&mut params)?;
        let bb = search.bb(&mut params)?;
        let macd = search.macd(&mut params)?;
        let ichimoku = search.ichimoku()?;
        let rsi = search.rsi(&mut params)?;

        let mut rankings: Vec<Ranking> = [
            (Family::Ema, ema),
            (Family::Bb, bb),
            (Family::Macd, macd),
            (Family::Ichimoku, ichimoku),
            (Family::Rsi, rsi),
        ]
        .into_iter()
        .map(|(family, performance)| Ranking {
            family,
            enable: false,
            performance,
        })
        .collect();

        rank(&mut rankings, self.num_ranking);
        for ranking in &rankings {
            params.set_enabled(ranking.family, ranking.enable);
        }

        info!(
            candles = series.len(),
            enabled = ?params.enabled_families(),
            ema = ema,
            bb = bb,
            macd = macd,
            ichimoku = ichimoku,
            rsi = rsi,
            "optimized trade params"
        );
        Some(Optimization { params, rankings })
    }
}

/// Sort best first (stable) and enable the top `num_ranking` entries with positive performance.
pub fn rank(rankings: &mut [Ranking], num_ranking: usize) {
    rankings.sort_by(|a, b| b.performance.total_cmp(&a.performance));
    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.enable = i < num_ranking && ranking.performance > 0.0;
    }
}

struct Search<'a> {
    engine: BacktestEngine<'a>,
    cancel: &'a AtomicBool,
}

impl Search<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Profit of a computable backtest, or `None` to skip the grid point.
    fn profit(ledger: Option<SignalLedger>) -> Option<f64> {
        ledger.map(|l| l.profit())
    }

    fn ema(&self, params: &mut TradeParams) -> Option<f64> {
        let mut performance = 0.0;
        for period1 in EMA_PERIOD1_RANGE {
            for period2 in EMA_PERIOD2_RANGE {
                if self.cancelled() {
                    return None;
                }
                let Some(profit) = Self::profit(self.engine.ema(period1, period2)) else {
                    continue;
                };
                if performance < profit {
                    performance = profit;
                    params.ema.period1 = period1;
                    params.ema.period2 = period2;
                }
            }
        }
        debug!(performance, period1 = params.ema.period1, period2 = params.ema.period2, "ema search done");
        Some(performance)
    }

    fn bb(&self, params: &mut TradeParams) -> Option<f64> {
        let mut performance = 0.0;
        for n in BB_N_RANGE {
            for k in BB_K_VALUES {
                if self.cancelled() {
                    return None;
                }
                let Some(profit) = Self::profit(self.engine.bb(n, k)) else {
                    continue;
                };
                if performance < profit {
                    performance = profit;
                    params.bb.n = n;
                    params.bb.k = k;
                }
            }
        }
        debug!(performance, n = params.bb.n, k = params.bb.k, "bb search done");
        Some(performance)
    }

    fn macd(&self, params: &mut TradeParams) -> Option<f64> {
        let mut performance = 0.0;
        for fast in MACD_FAST_RANGE {
            for slow in MACD_SLOW_RANGE {
                for signal in MACD_SIGNAL_RANGE {
                    if self.cancelled() {
                        return None;
                    }
                    let Some(profit) = Self::profit(self.engine.macd(fast, slow, signal)) else {
                        continue;
                    };
                    if performance < profit {
                        performance = profit;
                        params.macd.fast_period = fast;
                        params.macd.slow_period = slow;
                        params.macd.signal_period = signal;
                    }
                }
            }
        }
        debug!(
            performance,
            fast = params.macd.fast_period,
            slow = params.macd.slow_period,
            signal = params.macd.signal_period,
            "macd search done"
        );
        Some(performance)
    }

    /// Ichimoku has no tunable parameters.
    fn ichimoku(&self) -> Option<f64> {
        if self.cancelled() {
            return None;
        }
        Some(Self::profit(self.engine.ichimoku()).unwrap_or(0.0))
    }

    fn rsi(&self, params: &mut TradeParams) -> Option<f64> {
        let mut performance = 0.0;
        let (buy, sell) = (params.rsi.buy_threshold, params.rsi.sell_threshold);
        for period in RSI_PERIOD_RANGE {
            if self.cancelled() {
                return None;
            }
            let Some(profit) = Self::profit(self.engine.rsi(period, buy, sell)) else {
                continue;
            };
            if performance < profit {
                performance = profit;
                params.rsi.period = period;
            }
        }
        debug!(performance, period = params.rsi.period, "rsi search done");
        Some(performance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{BarDuration, Candle};
    use chrono::{TimeDelta, TimeZone, Utc};

    fn series(closes: &[f64]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                product_code: "BTC_JPY".into(),
                duration: BarDuration::Hour,
                time: start + TimeDelta::hours(i as i64),
                open: c,
                close: c,
                high: c + 0.5,
                low: c - 0.5,
                volume: 1.0,
            })
            .collect();
        CandleSeries::new("BTC_JPY", BarDuration::Hour, candles)
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 8.0 * (i as f64 / 5.0).sin() + 3.0 * (i as f64 / 2.3).cos())
            .collect()
    }

    fn ranking(family: Family, performance: f64) -> Ranking {
        Ranking {
            family,
            enable: false,
            performance,
        }
    }

    fn sample_rankings() -> Vec<Ranking> {
        vec![
            ranking(Family::Ema, 10.0),
            ranking(Family::Bb, 0.0),
            ranking(Family::Macd, 25.0),
            ranking(Family::Ichimoku, -3.0),
            ranking(Family::Rsi, 10.0),
        ]
    }

    fn enabled(rankings: &[Ranking]) -> Vec<Family> {
        rankings.iter().filter(|r| r.enable).map(|r| r.family).collect()
    }

    #[test]
    fn rank_sorts_descending_and_is_stable() {
        let mut rankings = sample_rankings();
        rank(&mut rankings, 5);
        let order: Vec<Family> = rankings.iter().map(|r| r.family).collect();
        assert_eq!(
            order,
            vec![Family::Macd, Family::Ema, Family::Rsi, Family::Bb, Family::Ichimoku]
        );
    }

    #[test]
    fn rank_never_enables_unprofitable_families() {
        let mut rankings = sample_rankings();
        rank(&mut rankings, 5);
        assert_eq!(enabled(&rankings), vec![Family::Macd, Family::Ema, Family::Rsi]);
    }

    #[test]
    fn rank_zero_enables_nothing() {
        let mut rankings = sample_rankings();
        rank(&mut rankings, 0);
        assert!(enabled(&rankings).is_empty());
    }

    #[test]
    fn rank_is_monotonic_in_num_ranking() {
        let mut previous: Vec<Family> = Vec::new();
        for n in 0..=5 {
            let mut rankings = sample_rankings();
            rank(&mut rankings, n);
            let now = enabled(&rankings);
            assert!(previous.iter().all(|f| now.contains(f)), "n={n}");
            previous = now;
        }
    }

    #[test]
    fn short_history_yields_disabled_defaults() {
        let params = Optimizer::new(3).optimize(&series(&wave(8)));
        assert_eq!(params, TradeParams::default());
    }

    #[test]
    fn optimize_with_zero_ranking_disables_everything() {
        let params = Optimizer::new(0).optimize(&series(&wave(120)));
        assert!(params.enabled_families().is_empty());
    }

    #[test]
    fn optimize_is_monotonic_in_num_ranking() {
        let s = series(&wave(120));
        let mut previous: Vec<Family> = Vec::new();
        for n in 0..=5 {
            let now = Optimizer::new(n).optimize(&s).enabled_families();
            assert!(previous.iter().all(|f| now.contains(f)), "n={n}");
            previous = now;
        }
    }

    #[test]
    fn chosen_params_reproduce_reported_performance() {
        let s = series(&wave(120));
        let never = AtomicBool::new(false);
        let optimization = Optimizer::new(5).optimize_cancellable(&s, &never).unwrap();
        let engine = BacktestEngine::new(&s);
        for ranking in &optimization.rankings {
            let profit = engine
                .run(ranking.family, &optimization.params)
                .map(|l| l.profit())
                .unwrap_or(0.0);
            // Ichimoku reports its raw profit; searched families never report below zero.
            let expected = match ranking.family {
                Family::Ichimoku => profit,
                _ => profit.max(0.0),
            };
            assert!(
                (expected - ranking.performance).abs() < 1e-9,
                "{}: {profit} vs {}",
                ranking.family,
                ranking.performance
            );
        }
    }

    #[test]
    fn cancelled_pass_returns_none() {
        let cancel = AtomicBool::new(true);
        assert!(Optimizer::new(3).optimize_cancellable(&series(&wave(120)), &cancel).is_none());
    }
}
