#![allow(dead_code)]

use candletrader::domain::candle::{BarDuration, Candle, CandleSeries};
use candletrader::domain::config::TradingConfig;
use candletrader::domain::error::TraderError;
use candletrader::domain::signal::SignalEvent;
use candletrader::domain::tick::Tick;
use candletrader::domain::trade_params::{RsiParams, TradeParams};
use candletrader::ports::signal_port::SignalStore;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::io::Write;
use std::sync::Mutex;

pub const PRODUCT: &str = "BTC_JPY";

/// RSI(2) crosses 30 on the fifth close; the last close breaks a 0.95 stop.
pub const BUY_THEN_DROP: [f64; 6] = [100.0, 95.0, 90.0, 92.0, 100.0, 94.0];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn make_candle(duration: BarDuration, index: i64, close: f64) -> Candle {
    Candle {
        product_code: PRODUCT.to_string(),
        duration,
        time: t0() + duration.as_delta() * index as i32,
        open: close,
        close,
        high: close,
        low: close,
        volume: 1.0,
    }
}

pub fn make_series(duration: BarDuration, closes: &[f64]) -> CandleSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(duration, i as i64, c))
        .collect();
    CandleSeries::new(PRODUCT, duration, candles)
}

/// Oscillating closes long enough for every indicator family.
pub fn make_wave(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 1000.0 + 80.0 * (i as f64 / 6.0).sin() + 25.0 * (i as f64 / 2.5).cos())
        .collect()
}

/// One tick per minute at the given mid prices, 30 seconds into each minute.
pub fn minute_ticks(closes: &[f64]) -> Vec<Tick> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &price)| Tick {
            product_code: PRODUCT.to_string(),
            timestamp: t0() + TimeDelta::minutes(i as i64) + TimeDelta::seconds(30),
            best_bid: price,
            best_ask: price,
            volume: 1.0,
        })
        .collect()
}

pub fn ticker_frame(tick: &Tick) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "channelMessage",
        "params": {
            "channel": format!("lightning_ticker_{}", tick.product_code),
            "message": tick,
        }
    })
    .to_string()
}

pub fn rsi_only() -> TradeParams {
    let mut params = TradeParams::default();
    params.rsi = RsiParams {
        enable: true,
        period: 2,
        buy_threshold: 30.0,
        sell_threshold: 100.0,
    };
    params
}

pub fn trading_config(back_test: bool) -> TradingConfig {
    TradingConfig {
        back_test,
        stop_limit_percent: 0.95,
        background_optimize: false,
        ..TradingConfig::new(PRODUCT)
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Signal store whose appends always fail; records what was attempted.
pub struct FailingSignalStore {
    pub duplicate: bool,
    pub attempts: Mutex<Vec<SignalEvent>>,
}

impl FailingSignalStore {
    pub fn duplicate() -> Self {
        Self {
            duplicate: true,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self {
            duplicate: false,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl SignalStore for FailingSignalStore {
    fn append_signal_event(&self, event: &SignalEvent) -> Result<(), TraderError> {
        self.attempts.lock().unwrap().push(event.clone());
        if self.duplicate {
            Err(TraderError::DuplicateSignal { time: event.time })
        } else {
            Err(TraderError::Database {
                reason: "disk full".to_string(),
            })
        }
    }

    fn read_recent_signal_events(&self, _: &str, _: usize) -> Result<Vec<SignalEvent>, TraderError> {
        Ok(Vec::new())
    }

    fn read_signal_events_since(&self, _: DateTime<Utc>) -> Result<Vec<SignalEvent>, TraderError> {
        Ok(Vec::new())
    }
}
