//! Tick-to-candle aggregation.

use std::sync::Arc;
use tracing::debug;

use crate::domain::candle::{BarDuration, Candle};
use crate::domain::error::TraderError;
use crate::domain::tick::Tick;
use crate::ports::candle_port::CandleStore;

pub struct CandleAggregator {
    store: Arc<dyn CandleStore + Send + Sync>,
}

impl CandleAggregator {
    pub fn new(store: Arc<dyn CandleStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Upsert the bar containing `tick` for `product_code`/`duration`.
    ///
    /// Returns `true` when the tick opened a new bar.
    pub fn ingest(
        &self,
        tick: &Tick,
        product_code: &str,
        duration: BarDuration,
    ) -> Result<bool, TraderError> {
        let bar_start = tick.bar_start(duration);
        let price = tick.mid_price();

        match self.store.read_candle(product_code, duration, bar_start)? {
            None => {
                let candle = Candle::opened_at(product_code, duration, bar_start, price, tick.volume);
                self.store.upsert_candle(&candle)?;
                debug!(product_code, %duration, time = %bar_start, price, "opened candle");
                Ok(true)
            }
            Some(mut candle) => {
                candle.absorb(price, tick.volume);
                self.store.upsert_candle(&candle)?;
                Ok(false)
            }
        }
    }

    /// Ingest into every duration; returns the durations whose bar rolled over.
    pub fn ingest_all(
        &self,
        tick: &Tick,
        durations: &[BarDuration],
    ) -> Result<Vec<BarDuration>, TraderError> {
        let mut opened = Vec::new();
        for &duration in durations {
            if self.ingest(tick, &tick.product_code, duration)? {
                opened.push(duration);
            }
        }
        Ok(opened)
    }
}
