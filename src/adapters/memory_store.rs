//! In-process candle and signal store.
//!
//! Backs back-test mode and tests; rows live in ordered maps guarded by a mutex.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::candle::{BarDuration, Candle, CandleSeries};
use crate::domain::error::TraderError;
use crate::domain::signal::SignalEvent;
use crate::ports::candle_port::CandleStore;
use crate::ports::signal_port::SignalStore;

type CandleKey = (String, BarDuration);

#[derive(Default)]
pub struct MemoryStore {
    candles: Mutex<BTreeMap<CandleKey, BTreeMap<DateTime<Utc>, Candle>>>,
    signals: Mutex<BTreeMap<DateTime<Utc>, SignalEvent>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, TraderError> {
    mutex.lock().map_err(|e| TraderError::Database {
        reason: format!("memory store poisoned: {e}"),
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_candles(&self, candles: &[Candle]) -> Result<(), TraderError> {
        for candle in candles {
            self.upsert_candle(candle)?;
        }
        Ok(())
    }

    pub fn signal_count(&self) -> usize {
        self.signals.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl CandleStore for MemoryStore {
    fn read_candle(
        &self,
        product_code: &str,
        duration: BarDuration,
        time: DateTime<Utc>,
    ) -> Result<Option<Candle>, TraderError> {
        let candles = lock(&self.candles)?;
        Ok(candles
            .get(&(product_code.to_string(), duration))
            .and_then(|rows| rows.get(&time))
            .cloned())
    }

    fn upsert_candle(&self, candle: &Candle) -> Result<(), TraderError> {
        let mut candles = lock(&self.candles)?;
        candles
            .entry((candle.product_code.clone(), candle.duration))
            .or_default()
            .insert(candle.time, candle.clone());
        Ok(())
    }

    fn read_recent_candles(
        &self,
        product_code: &str,
        duration: BarDuration,
        limit: usize,
    ) -> Result<CandleSeries, TraderError> {
        let candles = lock(&self.candles)?;
        let recent: Vec<Candle> = candles
            .get(&(product_code.to_string(), duration))
            .map(|rows| rows.values().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(CandleSeries::new(product_code, duration, recent))
    }
}

impl SignalStore for MemoryStore {
    fn append_signal_event(&self, event: &SignalEvent) -> Result<(), TraderError> {
        let mut signals = lock(&self.signals)?;
        if signals.contains_key(&event.time) {
            return Err(TraderError::DuplicateSignal { time: event.time });
        }
        signals.insert(event.time, event.clone());
        Ok(())
    }

    fn read_recent_signal_events(
        &self,
        product_code: &str,
        count: usize,
    ) -> Result<Vec<SignalEvent>, TraderError> {
        let signals = lock(&self.signals)?;
        let mut recent: Vec<SignalEvent> = signals
            .values()
            .rev()
            .filter(|e| e.product_code == product_code)
            .take(count)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    fn read_signal_events_since(
        &self,
        time: DateTime<Utc>,
    ) -> Result<Vec<SignalEvent>, TraderError> {
        let signals = lock(&self.signals)?;
        Ok(signals.range(time..).map(|(_, e)| e.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Side;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn event(minutes: i64, side: Side) -> SignalEvent {
        SignalEvent {
            time: t0() + TimeDelta::minutes(minutes),
            product_code: "BTC_JPY".into(),
            side,
            price: 100.0,
            size: 1.0,
        }
    }

    #[test]
    fn recent_candles_are_ascending_and_limited() {
        let store = MemoryStore::new();
        for m in 0..5 {
            let c = Candle::opened_at(
                "BTC_JPY",
                BarDuration::Minute,
                t0() + TimeDelta::minutes(m),
                m as f64,
                1.0,
            );
            store.upsert_candle(&c).unwrap();
        }
        let series = store
            .read_recent_candles("BTC_JPY", BarDuration::Minute, 3)
            .unwrap();
        assert_eq!(series.closes(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn candle_keys_are_per_duration() {
        let store = MemoryStore::new();
        let c = Candle::opened_at("BTC_JPY", BarDuration::Minute, t0(), 1.0, 1.0);
        store.upsert_candle(&c).unwrap();
        assert!(store
            .read_candle("BTC_JPY", BarDuration::Hour, t0())
            .unwrap()
            .is_none());
        assert_eq!(
            store.read_candle("BTC_JPY", BarDuration::Minute, t0()).unwrap(),
            Some(c)
        );
    }

    #[test]
    fn duplicate_signal_time_is_rejected() {
        let store = MemoryStore::new();
        store.append_signal_event(&event(0, Side::Buy)).unwrap();
        let err = store.append_signal_event(&event(0, Side::Sell)).unwrap_err();
        assert!(matches!(err, TraderError::DuplicateSignal { .. }));
        assert_eq!(store.signal_count(), 1);
    }

    #[test]
    fn signal_queries() {
        let store = MemoryStore::new();
        store.append_signal_event(&event(0, Side::Buy)).unwrap();
        store.append_signal_event(&event(1, Side::Sell)).unwrap();
        store.append_signal_event(&event(2, Side::Buy)).unwrap();

        let last = store.read_recent_signal_events("BTC_JPY", 1).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].side, Side::Buy);

        let since = store
            .read_signal_events_since(t0() + TimeDelta::minutes(1))
            .unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].side, Side::Sell);
    }
}
