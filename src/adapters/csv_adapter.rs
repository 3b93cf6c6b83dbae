//! Historical candle import from CSV.
//!
//! Expected header: `time,open,high,low,close,volume`, with RFC 3339 times.
//! Times are truncated to the start of their bar.

use crate::domain::candle::{BarDuration, Candle, CandleSeries};
use crate::domain::error::TraderError;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: chrono::DateTime<chrono::Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter;

impl CsvAdapter {
    pub fn read_file<P: AsRef<Path>>(
        path: P,
        product_code: &str,
        duration: BarDuration,
    ) -> Result<CandleSeries, TraderError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| TraderError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::read(file, product_code, duration)
    }

    pub fn read<R: Read>(
        reader: R,
        product_code: &str,
        duration: BarDuration,
    ) -> Result<CandleSeries, TraderError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut candles = Vec::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| TraderError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;
            if row.high < row.low {
                return Err(TraderError::Database {
                    reason: format!("row {}: high {} below low {}", line + 1, row.high, row.low),
                });
            }
            candles.push(Candle {
                product_code: product_code.to_string(),
                duration,
                time: duration.truncate(row.time),
                open: row.open,
                close: row.close,
                high: row.high,
                low: row.low,
                volume: row.volume,
            });
        }

        Ok(CandleSeries::new(product_code, duration, candles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "time,open,high,low,close,volume
2024-01-01T01:00:00Z,101.0,103.0,100.0,102.0,7.5
2024-01-01T00:00:00Z,100.0,102.0,99.0,101.0,5.0
2024-01-01T02:30:00Z,102.0,104.0,101.0,103.5,2.0
";

    #[test]
    fn reads_and_orders_rows() {
        let series = CsvAdapter::read(SAMPLE.as_bytes(), "BTC_JPY", BarDuration::Hour).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.candles[0].time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(series.closes(), vec![101.0, 102.0, 103.5]);
    }

    #[test]
    fn truncates_to_bar_start() {
        let series = CsvAdapter::read(SAMPLE.as_bytes(), "BTC_JPY", BarDuration::Hour).unwrap();
        assert_eq!(
            series.candles[2].time,
            Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_rows() {
        let bad = "time,open,high,low,close,volume\nnot-a-time,1,2,0,1,1\n";
        assert!(matches!(
            CsvAdapter::read(bad.as_bytes(), "BTC_JPY", BarDuration::Hour),
            Err(TraderError::Database { .. })
        ));

        let inverted = "time,open,high,low,close,volume\n2024-01-01T00:00:00Z,1,0.5,2,1,1\n";
        assert!(CsvAdapter::read(inverted.as_bytes(), "BTC_JPY", BarDuration::Hour).is_err());
    }

    #[test]
    fn read_file_reports_missing_file() {
        assert!(CsvAdapter::read_file("/nonexistent/candles.csv", "BTC_JPY", BarDuration::Hour).is_err());
    }

    #[test]
    fn read_file_reads_temp_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let series = CsvAdapter::read_file(file.path(), "BTC_JPY", BarDuration::Hour).unwrap();
        assert_eq!(series.product_code, "BTC_JPY");
        assert_eq!(series.len(), 3);
    }
}
