//! Historical volatility.
//!
//! r[i] = ln(C[i] / C[i-1]); HV(n)[i] = population stddev of the last n
//! log returns × 100. Defined from index n.

use super::{stddev::calculate_stddev, Line};

const SCALE: f64 = 100.0;

pub fn calculate_hv(closes: &[f64], period: usize) -> Line {
    if closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let mut values: Line = Vec::with_capacity(closes.len());
    values.push(None);
    values.extend(calculate_stddev(&returns, period, SCALE));
    values
}
