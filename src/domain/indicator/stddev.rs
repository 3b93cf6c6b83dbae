//! Rolling population standard deviation, scaled by a deviation multiplier.
//!
//! STDDEV(n)[i] = sqrt(sum((x[i-j] - mean)^2 for j in 0..n) / n) * mult

use super::Line;

pub fn calculate_stddev(values: &[f64], period: usize, mult: f64) -> Line {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            Some(variance.sqrt() * mult)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::assert_close;

    #[test]
    fn stddev_warmup() {
        let line = calculate_stddev(&[10.0, 20.0, 30.0, 40.0], 3, 1.0);
        assert_eq!(line[1], None);
        assert!(line[2].is_some());
    }

    #[test]
    fn stddev_known_values() {
        let line = calculate_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, 1.0);
        assert_close(line[7], 2.0);
    }

    #[test]
    fn stddev_multiplier_scales() {
        let line = calculate_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, 100.0);
        assert_close(line[7], 200.0);
    }

    #[test]
    fn stddev_constant_is_zero() {
        let line = calculate_stddev(&[5.0; 4], 2, 1.0);
        assert_close(line[3], 0.0);
    }
}
