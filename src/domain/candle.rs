//! Candles (price bars), bar durations and ordered candle series.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;

/// Supported bar durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BarDuration {
    #[serde(rename = "1s")]
    Second,
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hour,
}

impl BarDuration {
    pub const ALL: [BarDuration; 3] = [BarDuration::Second, BarDuration::Minute, BarDuration::Hour];

    pub fn seconds(self) -> i64 {
        match self {
            BarDuration::Second => 1,
            BarDuration::Minute => 60,
            BarDuration::Hour => 3600,
        }
    }

    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BarDuration::Second => "1s",
            BarDuration::Minute => "1m",
            BarDuration::Hour => "1h",
        }
    }

    /// Start of the bar containing `time`.
    pub fn truncate(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let rem = time.timestamp().rem_euclid(self.seconds());
        time - TimeDelta::seconds(rem) - TimeDelta::nanoseconds(time.timestamp_subsec_nanos() as i64)
    }
}

impl fmt::Display for BarDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarDuration {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1s" => Ok(BarDuration::Second),
            "1m" => Ok(BarDuration::Minute),
            "1h" => Ok(BarDuration::Hour),
            other => Err(TraderError::UnknownDuration(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub product_code: String,
    pub duration: BarDuration,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl Candle {
    /// A bar opened by a single price observation.
    pub fn opened_at(
        product_code: &str,
        duration: BarDuration,
        time: DateTime<Utc>,
        price: f64,
        volume: f64,
    ) -> Self {
        Candle {
            product_code: product_code.to_string(),
            duration,
            time,
            open: price,
            close: price,
            high: price,
            low: price,
            volume,
        }
    }

    /// Fold another price observation into this bar.
    pub fn absorb(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }
}

/// Candles for one instrument and duration, oldest first, strictly increasing in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    pub product_code: String,
    pub duration: BarDuration,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    /// Sorts by bar start and keeps the last candle for any repeated timestamp.
    pub fn new(product_code: &str, duration: BarDuration, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.time);
        let mut ordered: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match ordered.last_mut() {
                Some(last) if last.time == candle.time => *last = candle,
                _ => ordered.push(candle),
            }
        }
        CandleSeries {
            product_code: product_code.to_string(),
            duration,
            candles: ordered,
        }
    }

    pub fn empty(product_code: &str, duration: BarDuration) -> Self {
        Self::new(product_code, duration, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.candles.iter().map(|c| c.time).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.open).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Candles strictly before `time`.
    pub fn before(&self, time: DateTime<Utc>) -> CandleSeries {
        CandleSeries {
            product_code: self.product_code.clone(),
            duration: self.duration,
            candles: self
                .candles
                .iter()
                .take_while(|c| c.time < time)
                .cloned()
                .collect(),
        }
    }
}
