//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the MACD line
//! Histogram = MACD Line - Signal Line
//!
//! The line is defined from index max(fast, slow) - 1, the signal and
//! histogram a further (signal - 1) entries later.

use serde::Serialize;

use super::{calculate_ema, Line};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdLines {
    pub macd: Line,
    #[serde(rename = "macd_signal")]
    pub signal: Line,
    #[serde(rename = "macd_hist")]
    pub histogram: Line,
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdLines {
    let len = closes.len();
    if fast == 0 || slow == 0 || signal_period == 0 {
        return MacdLines {
            macd: vec![None; len],
            signal: vec![None; len],
            histogram: vec![None; len],
        };
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let macd: Line = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let mut signal: Line = vec![None; len];
    if let Some(first) = macd.iter().position(Option::is_some) {
        let defined: Vec<f64> = macd[first..].iter().flatten().copied().collect();
        for (offset, value) in calculate_ema(&defined, signal_period).into_iter().enumerate() {
            signal[first + offset] = value;
        }
    }

    let histogram = macd
        .iter()
        .zip(&signal)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdLines {
        macd,
        signal,
        histogram,
    }
}
