//! Candle persistence port.

use chrono::{DateTime, Utc};

use crate::domain::candle::{BarDuration, Candle, CandleSeries};
use crate::domain::error::TraderError;

/// Candle rows keyed by (product code, duration, bar start).
pub trait CandleStore {
    fn read_candle(
        &self,
        product_code: &str,
        duration: BarDuration,
        time: DateTime<Utc>,
    ) -> Result<Option<Candle>, TraderError>;

    /// Insert the candle or replace the row with the same key.
    fn upsert_candle(&self, candle: &Candle) -> Result<(), TraderError>;

    /// The newest `limit` candles, returned oldest first.
    fn read_recent_candles(
        &self,
        product_code: &str,
        duration: BarDuration,
        limit: usize,
    ) -> Result<CandleSeries, TraderError>;
}
