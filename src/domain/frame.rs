//! Candle window plus requested indicator lines, as served to chart clients.
//!
//! Each indicator field appears in the serialized frame only when it was
//! requested and computable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::candle::{BarDuration, Candle, CandleSeries};
use crate::domain::indicator::ichimoku::TENKAN_PERIOD;
use crate::domain::indicator::{
    calculate_bollinger, calculate_ema, calculate_hv, calculate_ichimoku, calculate_macd,
    calculate_rsi, calculate_sma, BollingerLines, IchimokuLines, Line, MacdLines,
};
use crate::domain::ledger::SignalLedger;

pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodLine {
    pub period: usize,
    pub values: Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandsFrame {
    pub n: usize,
    pub k: f64,
    #[serde(flatten)]
    pub lines: BollingerLines,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdFrame {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    #[serde(flatten)]
    pub lines: MacdLines,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleFrame {
    pub product_code: String,
    pub duration: BarDuration,
    pub candles: Vec<Candle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub smas: Vec<PeriodLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emas: Vec<PeriodLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbands: Option<BandsFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ichimoku: Option<IchimokuLines>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<PeriodLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdFrame>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hvs: Vec<PeriodLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<SignalLedger>,
}

impl CandleFrame {
    pub fn new(series: CandleSeries) -> Self {
        CandleFrame {
            product_code: series.product_code,
            duration: series.duration,
            candles: series.candles,
            smas: Vec::new(),
            emas: Vec::new(),
            bbands: None,
            ichimoku: None,
            rsi: None,
            macd: None,
            hvs: Vec::new(),
            events: None,
        }
    }

    fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.time)
    }

    pub fn add_sma(&mut self, period: usize) -> bool {
        if self.candles.len() <= period {
            return false;
        }
        let values = calculate_sma(&self.closes(), period);
        self.smas.push(PeriodLine { period, values });
        true
    }

    pub fn add_ema(&mut self, period: usize) -> bool {
        if self.candles.len() <= period {
            return false;
        }
        let values = calculate_ema(&self.closes(), period);
        self.emas.push(PeriodLine { period, values });
        true
    }

    pub fn add_bbands(&mut self, n: usize, k: f64) -> bool {
        if self.candles.len() < n {
            return false;
        }
        let lines = calculate_bollinger(&self.closes(), n, k);
        self.bbands = Some(BandsFrame { n, k, lines });
        true
    }

    pub fn add_ichimoku(&mut self) -> bool {
        if self.candles.len() < TENKAN_PERIOD {
            return false;
        }
        self.ichimoku = Some(calculate_ichimoku(&self.closes()));
        true
    }

    pub fn add_rsi(&mut self, period: usize) -> bool {
        if self.candles.len() <= period {
            return false;
        }
        let values = calculate_rsi(&self.closes(), period);
        self.rsi = Some(PeriodLine { period, values });
        true
    }

    pub fn add_macd(&mut self, fast: usize, slow: usize, signal: usize) -> bool {
        if self.candles.len() <= 1 {
            return false;
        }
        let lines = calculate_macd(&self.closes(), fast, slow, signal);
        self.macd = Some(MacdFrame {
            fast_period: fast,
            slow_period: slow,
            signal_period: signal,
            lines,
        });
        true
    }

    pub fn add_hv(&mut self, period: usize) -> bool {
        if self.candles.len() < period {
            return false;
        }
        let values = calculate_hv(&self.closes(), period);
        self.hvs.push(PeriodLine { period, values });
        true
    }

    /// Attach signal events; an empty ledger is not attached.
    pub fn add_events(&mut self, events: SignalLedger) -> bool {
        if events.is_empty() {
            return false;
        }
        self.events = Some(events);
        true
    }
}

/// Which indicators to attach, with their parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub limit: usize,
    pub sma: Option<[usize; 3]>,
    pub ema: Option<[usize; 3]>,
    pub bbands: Option<(usize, f64)>,
    pub ichimoku: bool,
    pub rsi: Option<usize>,
    pub macd: Option<(usize, usize, usize)>,
    pub hv: Option<[usize; 3]>,
    pub events: bool,
}

impl Default for FrameRequest {
    fn default() -> Self {
        FrameRequest {
            limit: MAX_LIMIT,
            sma: None,
            ema: None,
            bbands: None,
            ichimoku: false,
            rsi: None,
            macd: None,
            hv: None,
            events: false,
        }
    }
}

impl FrameRequest {
    pub const SMA_PERIODS: [usize; 3] = [7, 14, 50];
    pub const EMA_PERIODS: [usize; 3] = [7, 14, 50];
    pub const BBANDS: (usize, f64) = (20, 2.0);
    pub const RSI_PERIOD: usize = 14;
    pub const MACD_PERIODS: (usize, usize, usize) = (12, 26, 9);
    pub const HV_PERIODS: [usize; 3] = [21, 63, 252];

    /// Out-of-range or missing limits fall back to [`MAX_LIMIT`].
    pub fn clamp_limit(limit: Option<i64>) -> usize {
        match limit {
            Some(n) if n >= 1 && n <= MAX_LIMIT as i64 => n as usize,
            _ => MAX_LIMIT,
        }
    }

    /// Attach every requested indicator. Events are attached when requested
    /// and `events` yields a non-empty ledger for the frame's first candle time.
    pub fn apply<F, E>(&self, frame: &mut CandleFrame, events: F) -> Result<(), E>
    where
        F: FnOnce(DateTime<Utc>) -> Result<SignalLedger, E>,
    {
        if let Some(periods) = self.sma {
            for period in periods {
                frame.add_sma(period);
            }
        }
        if let Some(periods) = self.ema {
            for period in periods {
                frame.add_ema(period);
            }
        }
        if let Some((n, k)) = self.bbands {
            frame.add_bbands(n, k);
        }
        if self.ichimoku {
            frame.add_ichimoku();
        }
        if let Some(period) = self.rsi {
            frame.add_rsi(period);
        }
        if let Some((fast, slow, signal)) = self.macd {
            frame.add_macd(fast, slow, signal);
        }
        if let Some(periods) = self.hv {
            for period in periods {
                frame.add_hv(period);
            }
        }
        if self.events {
            if let Some(first) = frame.first_time() {
                frame.add_events(events(first)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Side;
    use chrono::{TimeDelta, TimeZone};

    fn frame(n: usize) -> CandleFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = (0..n)
            .map(|i| {
                Candle::opened_at(
                    "BTC_JPY",
                    BarDuration::Hour,
                    start + TimeDelta::hours(i as i64),
                    100.0 + (i % 7) as f64,
                    1.0,
                )
            })
            .collect();
        CandleFrame::new(CandleSeries::new("BTC_JPY", BarDuration::Hour, candles))
    }

    #[test]
    fn plain_frame_omits_indicator_fields() {
        let json = serde_json::to_value(frame(3)).unwrap();
        let object = json.as_object().unwrap();
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        assert!(object.contains_key("candles"));
        assert_eq!(json["duration"], "1h");
    }

    #[test]
    fn requires_enough_candles() {
        let mut f = frame(7);
        assert!(!f.add_sma(7));
        assert!(f.add_sma(6));
        assert!(!f.add_ema(7));
        assert!(f.add_bbands(7, 2.0));
        assert!(!f.add_bbands(8, 2.0));
        assert!(!f.add_ichimoku());
        assert!(!f.add_rsi(7));
        assert!(f.add_macd(12, 26, 9));
        assert!(f.add_hv(7));
        assert!(!f.add_hv(8));
    }

    #[test]
    fn macd_needs_two_candles() {
        assert!(!frame(1).add_macd(12, 26, 9));
    }

    #[test]
    fn serialized_names_follow_chart_contract() {
        let mut f = frame(60);
        f.add_bbands(20, 2.0);
        f.add_macd(12, 26, 9);
        f.add_ichimoku();
        let json = serde_json::to_value(&f).unwrap();
        assert!(json["bbands"]["up"].is_array());
        assert!(json["bbands"]["down"].is_array());
        assert_eq!(json["bbands"]["n"], 20);
        assert!(json["macd"]["macd_signal"].is_array());
        assert!(json["macd"]["macd_hist"].is_array());
        assert!(json["ichimoku"]["senkoua"].is_array());
        // warm-up values are null, never zero
        assert!(json["bbands"]["up"][0].is_null());
    }

    #[test]
    fn empty_events_are_not_attached() {
        let mut f = frame(3);
        assert!(!f.add_events(SignalLedger::new()));
        assert!(f.events.is_none());

        let mut ledger = SignalLedger::new();
        ledger.record(Side::Buy, "BTC_JPY", f.candles[1].time, 101.0, 1.0);
        assert!(f.add_events(ledger));
    }

    #[test]
    fn clamp_limit_falls_back_to_max() {
        assert_eq!(FrameRequest::clamp_limit(None), MAX_LIMIT);
        assert_eq!(FrameRequest::clamp_limit(Some(0)), MAX_LIMIT);
        assert_eq!(FrameRequest::clamp_limit(Some(-3)), MAX_LIMIT);
        assert_eq!(FrameRequest::clamp_limit(Some(2000)), MAX_LIMIT);
        assert_eq!(FrameRequest::clamp_limit(Some(250)), 250);
    }

    #[test]
    fn apply_attaches_requested_indicators() {
        let mut f = frame(80);
        let request = FrameRequest {
            sma: Some(FrameRequest::SMA_PERIODS),
            hv: Some(FrameRequest::HV_PERIODS),
            rsi: Some(FrameRequest::RSI_PERIOD),
            events: true,
            ..FrameRequest::default()
        };
        let first = f.first_time().unwrap();
        request
            .apply(&mut f, |since| -> Result<SignalLedger, ()> {
                assert_eq!(since, first);
                Ok(SignalLedger::new())
            })
            .unwrap();
        assert_eq!(f.smas.len(), 3);
        // HV(252) is not computable over 80 candles
        assert_eq!(f.hvs.len(), 2);
        assert!(f.rsi.is_some());
        assert!(f.emas.is_empty());
        assert!(f.events.is_none());
    }
}
