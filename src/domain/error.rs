//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for candletrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    /// A signal event already exists for this timestamp.
    #[error("signal event already recorded at {time}")]
    DuplicateSignal { time: DateTime<Utc> },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown bar duration: {0}")]
    UnknownDuration(String),

    #[error("feed decode error: {reason}")]
    FeedDecode { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Internal { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownDuration(_) => 2,
            TraderError::Database { .. }
            | TraderError::DatabaseQuery { .. }
            | TraderError::DuplicateSignal { .. } => 3,
            TraderError::FeedDecode { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
