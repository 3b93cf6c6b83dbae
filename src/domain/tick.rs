//! Price ticks delivered by the exchange feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::BarDuration;

/// Extra fields in the exchange's ticker payload are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub product_code: String,
    pub timestamp: DateTime<Utc>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub volume: f64,
}

impl Tick {
    /// (best_bid + best_ask) / 2
    pub fn mid_price(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }

    pub fn bar_start(&self, duration: BarDuration) -> DateTime<Utc> {
        duration.truncate(self.timestamp)
    }
}
