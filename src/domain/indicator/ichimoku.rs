//! Ichimoku Cloud over closing prices.
//!
//! - Tenkan  = (max + min) / 2 of the last 9 closes
//! - Kijun   = (max + min) / 2 of the last 26 closes
//! - SenkouA = (Tenkan + Kijun) / 2
//! - SenkouB = (max + min) / 2 of the last 52 closes
//! - Chikou  = close 26 bars earlier
//!
//! Spans are not displaced forward; each line is aligned with the close it was
//! computed at.

use serde::Serialize;

use super::Line;

pub const TENKAN_PERIOD: usize = 9;
pub const KIJUN_PERIOD: usize = 26;
pub const SENKOU_B_PERIOD: usize = 52;
pub const CHIKOU_LAG: usize = 26;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IchimokuLines {
    pub tenkan: Line,
    pub kijun: Line,
    #[serde(rename = "senkoua")]
    pub senkou_a: Line,
    #[serde(rename = "senkoub")]
    pub senkou_b: Line,
    pub chikou: Line,
}

pub fn calculate_ichimoku(closes: &[f64]) -> IchimokuLines {
    let tenkan = midpoint_line(closes, TENKAN_PERIOD);
    let kijun = midpoint_line(closes, KIJUN_PERIOD);
    let senkou_a = tenkan
        .iter()
        .zip(&kijun)
        .map(|(t, k)| match (t, k) {
            (Some(t), Some(k)) => Some((t + k) / 2.0),
            _ => None,
        })
        .collect();
    let senkou_b = midpoint_line(closes, SENKOU_B_PERIOD);
    let chikou = (0..closes.len())
        .map(|i| i.checked_sub(CHIKOU_LAG).map(|j| closes[j]))
        .collect();

    IchimokuLines {
        tenkan,
        kijun,
        senkou_a,
        senkou_b,
        chikou,
    }
}

fn midpoint_line(closes: &[f64], period: usize) -> Line {
    (0..closes.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let (min, max) = min_max(&closes[i + 1 - period..=i]);
            Some((min + max) / 2.0)
        })
        .collect()
}

fn min_max(window: &[f64]) -> (f64, f64) {
    window
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
            (lo.min(p), hi.max(p))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::assert_close;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn lines_align_with_input() {
        let lines = calculate_ichimoku(&ramp(60));
        assert_eq!(lines.tenkan.len(), 60);
        assert_eq!(lines.kijun.len(), 60);
        assert_eq!(lines.senkou_a.len(), 60);
        assert_eq!(lines.senkou_b.len(), 60);
        assert_eq!(lines.chikou.len(), 60);
    }

    #[test]
    fn warmup_boundaries() {
        let lines = calculate_ichimoku(&ramp(60));
        assert_eq!(lines.tenkan[7], None);
        assert!(lines.tenkan[8].is_some());
        assert_eq!(lines.kijun[24], None);
        assert!(lines.kijun[25].is_some());
        assert_eq!(lines.senkou_a[24], None);
        assert!(lines.senkou_a[25].is_some());
        assert_eq!(lines.senkou_b[50], None);
        assert!(lines.senkou_b[51].is_some());
        assert_eq!(lines.chikou[25], None);
        assert!(lines.chikou[26].is_some());
    }

    #[test]
    fn values_on_a_ramp() {
        let lines = calculate_ichimoku(&ramp(60));
        // window 2..=10 → (2 + 10) / 2
        assert_close(lines.tenkan[10], 6.0);
        // window 5..=30 → (5 + 30) / 2
        assert_close(lines.kijun[30], 17.5);
        assert_close(lines.senkou_a[30], (26.0 + 17.5) / 2.0);
        // window 0..=51
        assert_close(lines.senkou_b[51], 25.5);
        assert_close(lines.chikou[40], 14.0);
    }

    #[test]
    fn short_input_is_undefined() {
        let lines = calculate_ichimoku(&ramp(5));
        assert!(lines.tenkan.iter().all(Option::is_none));
        assert!(lines.chikou.iter().all(Option::is_none));
    }

    #[test]
    fn midpoint_uses_true_extremes() {
        let closes = [5.0, 1.0, 9.0, 3.0, 4.0, 2.0, 8.0, 7.0, 6.0];
        let lines = calculate_ichimoku(&closes);
        assert_close(lines.tenkan[8], 5.0);
    }
}
