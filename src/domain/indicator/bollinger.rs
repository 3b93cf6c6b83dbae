//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper: Middle + k × StdDev
//! - Lower: Middle - k × StdDev
//!
//! StdDev is the population standard deviation. First (n-1) entries undefined.

use serde::Serialize;

use super::{stddev::calculate_stddev, calculate_sma, Line};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerLines {
    #[serde(rename = "up")]
    pub upper: Line,
    #[serde(rename = "mid")]
    pub middle: Line,
    #[serde(rename = "down")]
    pub lower: Line,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, k: f64) -> BollingerLines {
    let middle = calculate_sma(closes, period);
    let deviation = calculate_stddev(closes, period, 1.0);

    let band = |sign: f64| -> Line {
        middle
            .iter()
            .zip(&deviation)
            .map(|(m, d)| match (m, d) {
                (Some(m), Some(d)) => Some(m + sign * k * d),
                _ => None,
            })
            .collect()
    };

    BollingerLines {
        upper: band(1.0),
        lower: band(-1.0),
        middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::assert_close;

    #[test]
    fn bollinger_warmup() {
        let bands = calculate_bollinger(&[10.0, 20.0, 30.0, 40.0], 3, 2.0);
        assert_eq!(bands.upper[1], None);
        assert_eq!(bands.lower[1], None);
        assert!(bands.middle[2].is_some());
    }

    #[test]
    fn bollinger_basic_calculation() {
        let bands = calculate_bollinger(&[10.0, 20.0, 30.0], 3, 2.0);
        let sd = (200.0f64 / 3.0).sqrt();
        assert_close(bands.middle[2], 20.0);
        assert_close(bands.upper[2], 20.0 + 2.0 * sd);
        assert_close(bands.lower[2], 20.0 - 2.0 * sd);
    }

    #[test]
    fn bollinger_constant_prices_collapse() {
        let bands = calculate_bollinger(&[100.0; 5], 3, 2.0);
        assert_close(bands.upper[4], 100.0);
        assert_close(bands.lower[4], 100.0);
    }
}
