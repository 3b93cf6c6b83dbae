//! Signal ledger: alternating buy/sell record with realized profit.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::signal::{Side, SignalEvent};
use crate::ports::signal_port::SignalStore;

/// Ordered signal events, oldest first.
///
/// Sides strictly alternate. A BUY is accepted only when the ledger is empty or
/// its last event is a SELL strictly before the new timestamp, and vice versa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalLedger {
    signals: Vec<SignalEvent>,
}

impl SignalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger from persisted history, for example when resuming.
    pub fn from_events(mut signals: Vec<SignalEvent>) -> Self {
        signals.sort_by_key(|s| s.time);
        SignalLedger { signals }
    }

    pub fn signals(&self) -> &[SignalEvent] {
        &self.signals
    }

    pub fn last(&self) -> Option<&SignalEvent> {
        self.signals.last()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn can_buy(&self, time: DateTime<Utc>) -> bool {
        self.can_place(Side::Buy, time)
    }

    pub fn can_sell(&self, time: DateTime<Utc>) -> bool {
        self.can_place(Side::Sell, time)
    }

    fn can_place(&self, side: Side, time: DateTime<Utc>) -> bool {
        match self.signals.last() {
            None => true,
            Some(last) => last.side == side.opposite() && last.time < time,
        }
    }

    /// Append without persisting. Returns false when alternation rejects it.
    pub fn record(
        &mut self,
        side: Side,
        product_code: &str,
        time: DateTime<Utc>,
        price: f64,
        size: f64,
    ) -> bool {
        if !self.can_place(side, time) {
            return false;
        }
        self.signals.push(SignalEvent {
            time,
            product_code: product_code.to_string(),
            side,
            price,
            size,
        });
        true
    }

    pub fn buy(
        &mut self,
        product_code: &str,
        time: DateTime<Utc>,
        price: f64,
        size: f64,
        store: Option<&dyn SignalStore>,
    ) -> Result<bool, TraderError> {
        self.place(Side::Buy, product_code, time, price, size, store)
    }

    pub fn sell(
        &mut self,
        product_code: &str,
        time: DateTime<Utc>,
        price: f64,
        size: f64,
        store: Option<&dyn SignalStore>,
    ) -> Result<bool, TraderError> {
        self.place(Side::Sell, product_code, time, price, size, store)
    }

    /// The event is persisted before it is appended; a failed write leaves the
    /// ledger untouched.
    fn place(
        &mut self,
        side: Side,
        product_code: &str,
        time: DateTime<Utc>,
        price: f64,
        size: f64,
        store: Option<&dyn SignalStore>,
    ) -> Result<bool, TraderError> {
        if !self.can_place(side, time) {
            debug!(%side, %time, "signal rejected by alternation");
            return Ok(false);
        }
        let event = SignalEvent {
            time,
            product_code: product_code.to_string(),
            side,
            price,
            size,
        };
        if let Some(store) = store {
            store.append_signal_event(&event)?;
        }
        self.signals.push(event);
        Ok(true)
    }

    /// Realized profit over closed round trips.
    ///
    /// A leading SELL is ignored. While a position is open the total as of the
    /// last SELL is returned, so an open BUY never counts against the result.
    pub fn profit(&self) -> f64 {
        let mut total = 0.0;
        let mut at_last_sell = 0.0;
        let mut holding = false;

        for (i, event) in self.signals.iter().enumerate() {
            if i == 0 && event.side == Side::Sell {
                continue;
            }
            match event.side {
                Side::Buy => {
                    total -= event.notional();
                    holding = true;
                }
                Side::Sell => {
                    total += event.notional();
                    holding = false;
                    at_last_sell = total;
                }
            }
        }

        if holding { at_last_sell } else { total }
    }

    /// Events at or after `time`; empty when none qualify.
    pub fn collect_after(&self, time: DateTime<Utc>) -> SignalLedger {
        let start = self.signals.partition_point(|s| s.time < time);
        SignalLedger {
            signals: self.signals[start..].to_vec(),
        }
    }
}

impl Serialize for SignalLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let profit = self.profit();
        let mut state = serializer.serialize_struct("SignalLedger", 2)?;
        if self.signals.is_empty() {
            state.skip_field("signals")?;
        } else {
            state.serialize_field("signals", &self.signals)?;
        }
        if profit == 0.0 {
            state.skip_field("profit")?;
        } else {
            state.serialize_field("profit", &profit)?;
        }
        state.end()
    }
}
