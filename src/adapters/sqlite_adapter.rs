//! SQLite candle and signal store.
//!
//! Timestamps are stored as fixed-width RFC 3339 text so lexical order is
//! chronological order.

use crate::domain::candle::{BarDuration, Candle, CandleSeries};
use crate::domain::error::TraderError;
use crate::domain::signal::{Side, SignalEvent};
use crate::ports::candle_port::CandleStore;
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_port::SignalStore;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TraderError {
    TraderError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    column: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
}

fn parse_time(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn candle_from_row(row: &Row<'_>) -> rusqlite::Result<Candle> {
    let duration: String = row.get(1)?;
    Ok(Candle {
        product_code: row.get(0)?,
        duration: duration
            .parse::<BarDuration>()
            .map_err(|e| conversion_error(1, e))?,
        time: parse_time(row, 2)?,
        open: row.get(3)?,
        close: row.get(4)?,
        high: row.get(5)?,
        low: row.get(6)?,
        volume: row.get(7)?,
    })
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<SignalEvent> {
    let side: String = row.get(2)?;
    Ok(SignalEvent {
        time: parse_time(row, 0)?,
        product_code: row.get(1)?,
        side: side.parse::<Side>().map_err(|e| conversion_error(2, e))?,
        price: row.get(3)?,
        size: row.get(4)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| TraderError::invalid("sqlite", "pool_size", "pool_size must be positive"))?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS candles (
                    product_code TEXT NOT NULL,
                    duration TEXT NOT NULL,
                    time TEXT NOT NULL,
                    open REAL NOT NULL,
                    close REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (product_code, duration, time)
                );
                CREATE TABLE IF NOT EXISTS signal_events (
                    time TEXT PRIMARY KEY NOT NULL,
                    product_code TEXT NOT NULL,
                    side TEXT NOT NULL,
                    price REAL NOT NULL,
                    size REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_signal_events_product ON signal_events(product_code, time);",
            )
            .map_err(query_error)
    }

    /// Upsert many candles in one transaction.
    pub fn insert_candles(&self, candles: &[Candle]) -> Result<(), TraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        for candle in candles {
            Self::upsert(&tx, candle)?;
        }
        tx.commit().map_err(query_error)
    }

    fn upsert(conn: &rusqlite::Connection, candle: &Candle) -> Result<(), TraderError> {
        conn.execute(
            "INSERT OR REPLACE INTO candles (product_code, duration, time, open, close, high, low, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                candle.product_code,
                candle.duration.as_str(),
                format_time(candle.time),
                candle.open,
                candle.close,
                candle.high,
                candle.low,
                candle.volume
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }
}

impl CandleStore for SqliteAdapter {
    fn read_candle(
        &self,
        product_code: &str,
        duration: BarDuration,
        time: DateTime<Utc>,
    ) -> Result<Option<Candle>, TraderError> {
        self.conn()?
            .query_row(
                "SELECT product_code, duration, time, open, close, high, low, volume
                 FROM candles
                 WHERE product_code = ?1 AND duration = ?2 AND time = ?3",
                params![product_code, duration.as_str(), format_time(time)],
                candle_from_row,
            )
            .optional()
            .map_err(query_error)
    }

    fn upsert_candle(&self, candle: &Candle) -> Result<(), TraderError> {
        let conn = self.conn()?;
        Self::upsert(&conn, candle)
    }

    fn read_recent_candles(
        &self,
        product_code: &str,
        duration: BarDuration,
        limit: usize,
    ) -> Result<CandleSeries, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM (
                    SELECT product_code, duration, time, open, close, high, low, volume
                    FROM candles
                    WHERE product_code = ?1 AND duration = ?2
                    ORDER BY time DESC
                    LIMIT ?3
                 ) ORDER BY time ASC",
            )
            .map_err(query_error)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let candles = stmt
            .query_map(params![product_code, duration.as_str(), limit], candle_from_row)
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        Ok(CandleSeries::new(product_code, duration, candles))
    }
}

impl SignalStore for SqliteAdapter {
    fn append_signal_event(&self, event: &SignalEvent) -> Result<(), TraderError> {
        let result = self.conn()?.execute(
            "INSERT INTO signal_events (time, product_code, side, price, size)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format_time(event.time),
                event.product_code,
                event.side.as_str(),
                event.price,
                event.size
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TraderError::DuplicateSignal { time: event.time })
            }
            Err(e) => Err(query_error(e)),
        }
    }

    fn read_recent_signal_events(
        &self,
        product_code: &str,
        count: usize,
    ) -> Result<Vec<SignalEvent>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM (
                    SELECT time, product_code, side, price, size
                    FROM signal_events
                    WHERE product_code = ?1
                    ORDER BY time DESC
                    LIMIT ?2
                 ) ORDER BY time ASC",
            )
            .map_err(query_error)?;

        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let events = stmt
            .query_map(params![product_code, count], signal_from_row)
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(events)
    }

    fn read_signal_events_since(
        &self,
        time: DateTime<Utc>,
    ) -> Result<Vec<SignalEvent>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT time, product_code, side, price, size
                 FROM signal_events
                 WHERE time >= ?1
                 ORDER BY time ASC",
            )
            .map_err(query_error)?;

        let events = stmt
            .query_map(params![format_time(time)], signal_from_row)
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(events)
    }
}
