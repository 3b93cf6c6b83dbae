//! Optimized per-family trade parameters and the ranking used to pick them.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};

/// Indicator families that can vote in the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ema,
    Bb,
    Macd,
    Ichimoku,
    Rsi,
}

impl Family {
    /// Ranking order; ties keep this order.
    pub const ALL: [Family; 5] = [
        Family::Ema,
        Family::Bb,
        Family::Macd,
        Family::Ichimoku,
        Family::Rsi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Ema => "ema",
            Family::Bb => "bb",
            Family::Macd => "macd",
            Family::Ichimoku => "ichimoku",
            Family::Rsi => "rsi",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ema" => Ok(Family::Ema),
            "bb" | "bbands" | "bollinger" => Ok(Family::Bb),
            "macd" => Ok(Family::Macd),
            "ichimoku" => Ok(Family::Ichimoku),
            "rsi" => Ok(Family::Rsi),
            other => Err(format!("unknown indicator family: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmaParams {
    pub enable: bool,
    pub period1: usize,
    pub period2: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BbParams {
    pub enable: bool,
    pub n: usize,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdParams {
    pub enable: bool,
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IchimokuParams {
    pub enable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RsiParams {
    pub enable: bool,
    pub period: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

/// The full parameter set consumed by the trading engine.
///
/// Replaced wholesale after each optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeParams {
    pub ema: EmaParams,
    pub bb: BbParams,
    pub macd: MacdParams,
    pub ichimoku: IchimokuParams,
    pub rsi: RsiParams,
}

impl Default for TradeParams {
    /// Conventional parameters with every family disabled.
    fn default() -> Self {
        TradeParams {
            ema: EmaParams {
                enable: false,
                period1: 7,
                period2: 14,
            },
            bb: BbParams {
                enable: false,
                n: 20,
                k: 2.0,
            },
            macd: MacdParams {
                enable: false,
                fast_period: DEFAULT_FAST,
                slow_period: DEFAULT_SLOW,
                signal_period: DEFAULT_SIGNAL,
            },
            ichimoku: IchimokuParams { enable: false },
            rsi: RsiParams {
                enable: false,
                period: 14,
                buy_threshold: 30.0,
                sell_threshold: 70.0,
            },
        }
    }
}

impl TradeParams {
    pub fn is_enabled(&self, family: Family) -> bool {
        match family {
            Family::Ema => self.ema.enable,
            Family::Bb => self.bb.enable,
            Family::Macd => self.macd.enable,
            Family::Ichimoku => self.ichimoku.enable,
            Family::Rsi => self.rsi.enable,
        }
    }

    pub fn set_enabled(&mut self, family: Family, enable: bool) {
        match family {
            Family::Ema => self.ema.enable = enable,
            Family::Bb => self.bb.enable = enable,
            Family::Macd => self.macd.enable = enable,
            Family::Ichimoku => self.ichimoku.enable = enable,
            Family::Rsi => self.rsi.enable = enable,
        }
    }

    pub fn enabled_families(&self) -> Vec<Family> {
        Family::ALL
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }
}

/// Best historical profit of one family; transient during optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ranking {
    pub family: Family,
    pub enable: bool,
    pub performance: f64,
}
