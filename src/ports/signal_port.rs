//! Signal event persistence port.

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::domain::signal::SignalEvent;

/// Signal rows keyed uniquely by timestamp.
pub trait SignalStore {
    /// Fails with [`TraderError::DuplicateSignal`] when a row already exists for the timestamp.
    fn append_signal_event(&self, event: &SignalEvent) -> Result<(), TraderError>;

    /// The newest `count` events for the product, returned oldest first.
    fn read_recent_signal_events(
        &self,
        product_code: &str,
        count: usize,
    ) -> Result<Vec<SignalEvent>, TraderError>;

    /// Events at or after `time`, oldest first.
    fn read_signal_events_since(
        &self,
        time: DateTime<Utc>,
    ) -> Result<Vec<SignalEvent>, TraderError>;
}
