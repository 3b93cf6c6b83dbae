//! Trading configuration built from a [`ConfigPort`] and validated up front.

use crate::domain::candle::BarDuration;
use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "trader";

pub const DEFAULT_DATA_LIMIT: usize = 365;
pub const DEFAULT_STOP_LIMIT_PERCENT: f64 = 0.9;
pub const DEFAULT_NUM_RANKING: usize = 3;
pub const MAX_NUM_RANKING: usize = 5;
pub const DEFAULT_TRADE_SIZE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub product_code: String,
    /// Duration whose roll-over triggers an evaluation cycle.
    pub trade_duration: BarDuration,
    /// Every duration ticks are aggregated into.
    pub durations: Vec<BarDuration>,
    /// Simulate trades in memory instead of persisting them.
    pub back_test: bool,
    /// Number of recent candles evaluated and optimized over.
    pub data_limit: usize,
    pub stop_limit_percent: f64,
    pub num_ranking: usize,
    pub trade_size: f64,
    pub background_optimize: bool,
    pub log_file: Option<String>,
    pub log_level: String,
}

impl TradingConfig {
    /// Defaults for `product_code`.
    pub fn new(product_code: &str) -> Self {
        TradingConfig {
            product_code: product_code.to_string(),
            trade_duration: BarDuration::Minute,
            durations: BarDuration::ALL.to_vec(),
            back_test: true,
            data_limit: DEFAULT_DATA_LIMIT,
            stop_limit_percent: DEFAULT_STOP_LIMIT_PERCENT,
            num_ranking: DEFAULT_NUM_RANKING,
            trade_size: DEFAULT_TRADE_SIZE,
            background_optimize: true,
            log_file: None,
            log_level: "info".to_string(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let product_code = required_string(config, "product_code")?;
        let defaults = TradingConfig::new(&product_code);

        let trade_duration = match config.get_string(SECTION, "trade_duration") {
            Some(s) => parse_duration("trade_duration", &s)?,
            None => defaults.trade_duration,
        };
        let durations = match config.get_string(SECTION, "durations") {
            Some(s) => parse_durations(&s)?,
            None => defaults.durations.clone(),
        };

        let built = TradingConfig {
            trade_duration,
            durations,
            back_test: config.get_bool(SECTION, "back_test", defaults.back_test),
            data_limit: non_negative(config, "data_limit", DEFAULT_DATA_LIMIT)?,
            stop_limit_percent: config.get_double(
                SECTION,
                "stop_limit_percent",
                DEFAULT_STOP_LIMIT_PERCENT,
            ),
            num_ranking: non_negative(config, "num_ranking", DEFAULT_NUM_RANKING)?,
            trade_size: config.get_double(SECTION, "trade_size", DEFAULT_TRADE_SIZE),
            background_optimize: config.get_bool(
                SECTION,
                "background_optimize",
                defaults.background_optimize,
            ),
            log_file: config
                .get_string(SECTION, "log_file")
                .filter(|s| !s.trim().is_empty()),
            log_level: config
                .get_string(SECTION, "log_level")
                .unwrap_or(defaults.log_level.clone()),
            product_code,
        };
        built.validate()?;
        Ok(built)
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        if self.product_code.trim().is_empty() {
            return Err(TraderError::invalid(SECTION, "product_code", "product_code must not be empty"));
        }
        if self.durations.is_empty() {
            return Err(TraderError::invalid(SECTION, "durations", "at least one duration is required"));
        }
        if !self.durations.contains(&self.trade_duration) {
            return Err(TraderError::invalid(
                SECTION,
                "trade_duration",
                format!("trade_duration {} must be listed in durations", self.trade_duration),
            ));
        }
        if self.data_limit <= 1 {
            return Err(TraderError::invalid(SECTION, "data_limit", "data_limit must be greater than 1"));
        }
        if !(self.stop_limit_percent > 0.0 && self.stop_limit_percent <= 1.0) {
            return Err(TraderError::invalid(
                SECTION,
                "stop_limit_percent",
                "stop_limit_percent must be in (0, 1]",
            ));
        }
        if self.num_ranking > MAX_NUM_RANKING {
            return Err(TraderError::invalid(
                SECTION,
                "num_ranking",
                format!("num_ranking must be at most {MAX_NUM_RANKING}"),
            ));
        }
        if self.trade_size <= 0.0 {
            return Err(TraderError::invalid(SECTION, "trade_size", "trade_size must be positive"));
        }
        Ok(())
    }
}

fn required_string(config: &dyn ConfigPort, key: &str) -> Result<String, TraderError> {
    match config.get_string(SECTION, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(TraderError::ConfigMissing {
            section: SECTION.to_string(),
            key: key.to_string(),
        }),
    }
}

fn non_negative(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TraderError> {
    let value = config.get_int(SECTION, key, default as i64);
    usize::try_from(value)
        .map_err(|_| TraderError::invalid(SECTION, key, format!("{key} must be non-negative")))
}

fn parse_duration(key: &str, value: &str) -> Result<BarDuration, TraderError> {
    value
        .parse()
        .map_err(|e: TraderError| TraderError::invalid(SECTION, key, e.to_string()))
}

fn parse_durations(value: &str) -> Result<Vec<BarDuration>, TraderError> {
    let mut durations = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let duration = parse_duration("durations", part)?;
        if !durations.contains(&duration) {
            durations.push(duration);
        }
    }
    Ok(durations)
}
