//! Technical indicators over closing-price series.
//!
//! Every indicator returns [`Line`]s aligned index-for-index with the input
//! closes. An entry is `None` until enough history exists to compute it;
//! warm-up values are never reported as zero.

pub mod bollinger;
pub mod ema;
pub mod hv;
pub mod ichimoku;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{calculate_bollinger, BollingerLines};
pub use ema::calculate_ema;
pub use hv::calculate_hv;
pub use ichimoku::{calculate_ichimoku, IchimokuLines};
pub use macd::{calculate_macd, MacdLines};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;

/// One indicator value per candle; `None` while warming up.
pub type Line = Vec<Option<f64>>;

/// Values at `i - 1` and `i`, when both are defined.
pub fn pair(line: &[Option<f64>], i: usize) -> Option<(f64, f64)> {
    if i == 0 {
        return None;
    }
    match (line.get(i - 1).copied().flatten(), line.get(i).copied().flatten()) {
        (Some(prev), Some(cur)) => Some((prev, cur)),
        _ => None,
    }
}

/// A line with no defined values.
pub fn undefined(len: usize) -> Line {
    vec![None; len]
}

#[cfg(test)]
pub(crate) fn assert_close(actual: Option<f64>, expected: f64) {
    match actual {
        Some(v) => approx::assert_relative_eq!(v, expected, epsilon = 1e-9, max_relative = 1e-12),
        None => panic!("expected {expected}, got None"),
    }
}
