//! JSON-RPC 2.0 ticker frames, one per line.
//!
//! Only `channelMessage` notifications carry ticks; anything else fails to
//! decode and is skipped by [`JsonLinesFeed`].

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

use crate::domain::error::TraderError;
use crate::domain::tick::Tick;
use crate::ports::feed_port::TickFeed;

#[derive(Debug, Deserialize)]
#[serde(tag = "method", content = "params")]
enum Notification {
    #[serde(rename = "channelMessage")]
    ChannelMessage { channel: String, message: Tick },
}

/// Decode one frame into a tick.
pub fn decode_frame(text: &str) -> Result<Tick, TraderError> {
    match serde_json::from_str::<Notification>(text) {
        Ok(Notification::ChannelMessage { channel, message }) => {
            debug!(%channel, product_code = %message.product_code, "ticker frame");
            Ok(message)
        }
        Err(e) => Err(TraderError::FeedDecode {
            reason: e.to_string(),
        }),
    }
}

type Source = Box<dyn BufRead + Send>;

/// Replays newline-delimited frames from a reader. Single use.
pub struct JsonLinesFeed {
    source: Mutex<Option<Source>>,
}

impl JsonLinesFeed {
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        JsonLinesFeed {
            source: Mutex::new(Some(Box::new(reader))),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        Ok(Self::from_reader(BufReader::new(File::open(path)?)))
    }

    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }
}

impl TickFeed for JsonLinesFeed {
    fn subscribe(&self, product_code: &str, sink: Sender<Tick>) -> Result<(), TraderError> {
        let source = self
            .source
            .lock()
            .map_err(|_| TraderError::Internal {
                reason: "feed source lock poisoned".to_string(),
            })?
            .take()
            .ok_or_else(|| TraderError::Internal {
                reason: "feed already consumed".to_string(),
            })?;

        for (number, line) in source.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let tick = match decode_frame(&line) {
                Ok(tick) => tick,
                Err(e) => {
                    warn!(line = number + 1, error = %e, "skipping undecodable frame");
                    continue;
                }
            };
            if tick.product_code != product_code {
                continue;
            }
            if sink.blocking_send(tick).is_err() {
                debug!("tick receiver closed");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    const FRAME: &str = r#"{"jsonrpc":"2.0","method":"channelMessage","params":{"channel":"lightning_ticker_BTC_JPY","message":{"product_code":"BTC_JPY","timestamp":"2024-05-01T12:34:56.789Z","tick_id":42,"best_bid":100.0,"best_ask":102.0,"ltp":101.0,"volume":12.5}}}"#;

    #[test]
    fn decodes_channel_message() {
        let tick = decode_frame(FRAME).unwrap();
        assert_eq!(tick.product_code, "BTC_JPY");
        assert!((tick.mid_price() - 101.0).abs() < f64::EPSILON);
        assert_eq!(
            tick.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap()
                + chrono::TimeDelta::milliseconds(789)
        );
    }

    #[test]
    fn rejects_other_methods_and_bad_payloads() {
        let subscribe_ack = r#"{"jsonrpc":"2.0","id":1,"result":true}"#;
        assert!(matches!(decode_frame(subscribe_ack), Err(TraderError::FeedDecode { .. })));

        let bad_time = FRAME.replace("2024-05-01T12:34:56.789Z", "yesterday");
        assert!(matches!(decode_frame(&bad_time), Err(TraderError::FeedDecode { .. })));

        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn feed_skips_bad_lines_and_other_products() {
        let other = FRAME.replace("\"product_code\":\"BTC_JPY\"", "\"product_code\":\"ETH_JPY\"");
        let input = format!("{FRAME}\n\ngarbage\n{other}\n{FRAME}\n");
        let feed = JsonLinesFeed::from_reader(Cursor::new(input.into_bytes()));

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        feed.subscribe("BTC_JPY", tx).unwrap();

        let mut received = 0;
        while let Ok(tick) = rx.try_recv() {
            assert_eq!(tick.product_code, "BTC_JPY");
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[test]
    fn feed_is_single_use() {
        let feed = JsonLinesFeed::from_reader(Cursor::new(Vec::new()));
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        feed.subscribe("BTC_JPY", tx.clone()).unwrap();
        assert!(feed.subscribe("BTC_JPY", tx).is_err());
    }
}
