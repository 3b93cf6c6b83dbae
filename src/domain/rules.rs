//! Crossover and threshold rules shared by back-testing and live trading.
//!
//! Every rule looks at the transition from index `i - 1` to `i` and only votes
//! when the lines it needs are defined at both points.

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    calculate_bollinger, calculate_ema, calculate_ichimoku, calculate_macd, calculate_rsi, pair,
    BollingerLines, IchimokuLines, Line, MacdLines,
};
use crate::domain::trade_params::{Family, TradeParams};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vote {
    pub buy: bool,
    pub sell: bool,
}

impl Vote {
    const NONE: Vote = Vote {
        buy: false,
        sell: false,
    };
}

/// Precomputed indicator lines for one family and parameter tuple.
#[derive(Debug, Clone)]
pub enum FamilyLines {
    Ema {
        short: Line,
        long: Line,
    },
    Bb(BollingerLines),
    Macd(MacdLines),
    Ichimoku(IchimokuLines),
    Rsi {
        values: Line,
        buy_threshold: f64,
        sell_threshold: f64,
    },
}

impl FamilyLines {
    pub fn ema(closes: &[f64], period1: usize, period2: usize) -> Self {
        FamilyLines::Ema {
            short: calculate_ema(closes, period1),
            long: calculate_ema(closes, period2),
        }
    }

    pub fn bb(closes: &[f64], n: usize, k: f64) -> Self {
        FamilyLines::Bb(calculate_bollinger(closes, n, k))
    }

    pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Self {
        FamilyLines::Macd(calculate_macd(closes, fast, slow, signal))
    }

    pub fn ichimoku(closes: &[f64]) -> Self {
        FamilyLines::Ichimoku(calculate_ichimoku(closes))
    }

    pub fn rsi(closes: &[f64], period: usize, buy_threshold: f64, sell_threshold: f64) -> Self {
        FamilyLines::Rsi {
            values: calculate_rsi(closes, period),
            buy_threshold,
            sell_threshold,
        }
    }

    /// Lines for `family` using the parameters held in `params`.
    pub fn for_params(family: Family, params: &TradeParams, closes: &[f64]) -> Self {
        match family {
            Family::Ema => Self::ema(closes, params.ema.period1, params.ema.period2),
            Family::Bb => Self::bb(closes, params.bb.n, params.bb.k),
            Family::Macd => Self::macd(
                closes,
                params.macd.fast_period,
                params.macd.slow_period,
                params.macd.signal_period,
            ),
            Family::Ichimoku => Self::ichimoku(closes),
            Family::Rsi => Self::rsi(
                closes,
                params.rsi.period,
                params.rsi.buy_threshold,
                params.rsi.sell_threshold,
            ),
        }
    }

    pub fn vote(&self, candles: &[Candle], i: usize) -> Vote {
        if i == 0 || i >= candles.len() {
            return Vote::NONE;
        }
        match self {
            FamilyLines::Ema { short, long } => ema_vote(short, long, i),
            FamilyLines::Bb(bands) => bb_vote(bands, candles, i),
            FamilyLines::Macd(lines) => macd_vote(lines, i),
            FamilyLines::Ichimoku(lines) => ichimoku_vote(lines, candles, i),
            FamilyLines::Rsi {
                values,
                buy_threshold,
                sell_threshold,
            } => rsi_vote(values, *buy_threshold, *sell_threshold, i),
        }
    }
}

fn ema_vote(short: &Line, long: &Line, i: usize) -> Vote {
    let (Some((s0, s1)), Some((l0, l1))) = (pair(short, i), pair(long, i)) else {
        return Vote::NONE;
    };
    Vote {
        buy: s0 < l0 && s1 >= l1,
        sell: s0 > l0 && s1 <= l1,
    }
}

fn bb_vote(bands: &BollingerLines, candles: &[Candle], i: usize) -> Vote {
    let (Some((up0, up1)), Some((down0, down1))) = (pair(&bands.upper, i), pair(&bands.lower, i))
    else {
        return Vote::NONE;
    };
    let (c0, c1) = (candles[i - 1].close, candles[i].close);
    Vote {
        buy: down0 > c0 && down1 <= c1,
        sell: up0 < c0 && up1 >= c1,
    }
}

fn macd_vote(lines: &MacdLines, i: usize) -> Vote {
    let (Some((m0, m1)), Some((s0, s1))) = (pair(&lines.macd, i), pair(&lines.signal, i)) else {
        return Vote::NONE;
    };
    Vote {
        buy: m1 < 0.0 && s1 < 0.0 && m0 < s0 && m1 >= s1,
        sell: m1 > 0.0 && s1 > 0.0 && m0 > s0 && m1 <= s1,
    }
}

fn ichimoku_vote(lines: &IchimokuLines, candles: &[Candle], i: usize) -> Vote {
    let at = |line: &Line| line.get(i).copied().flatten();
    let (Some((ch0, ch1)), Some(a), Some(b), Some(tenkan), Some(kijun)) = (
        pair(&lines.chikou, i),
        at(&lines.senkou_a),
        at(&lines.senkou_b),
        at(&lines.tenkan),
        at(&lines.kijun),
    ) else {
        return Vote::NONE;
    };
    let (prev, cur) = (&candles[i - 1], &candles[i]);
    Vote {
        buy: ch0 < prev.high
            && ch1 >= cur.high
            && a < cur.low
            && b < cur.low
            && tenkan > kijun,
        sell: ch0 > prev.low
            && ch1 <= cur.low
            && a > cur.high
            && b > cur.high
            && tenkan < kijun,
    }
}

/// Samples pinned at exactly 0 or 100 count as not yet warmed up.
fn rsi_vote(values: &Line, buy_threshold: f64, sell_threshold: f64, i: usize) -> Vote {
    let Some((prev, cur)) = pair(values, i) else {
        return Vote::NONE;
    };
    if prev == 0.0 || prev == 100.0 {
        return Vote::NONE;
    }
    Vote {
        buy: prev < buy_threshold && cur >= buy_threshold,
        sell: prev > sell_threshold && cur <= sell_threshold,
    }
}
