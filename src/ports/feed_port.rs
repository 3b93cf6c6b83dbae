//! Exchange tick feed port.

use tokio::sync::mpsc::Sender;

use crate::domain::error::TraderError;
use crate::domain::tick::Tick;

pub trait TickFeed {
    /// Push ticks for `product_code` into `sink` until the feed ends or the receiver closes.
    ///
    /// Blocking; callers run it off the async executor.
    fn subscribe(&self, product_code: &str, sink: Sender<Tick>) -> Result<(), TraderError>;
}
