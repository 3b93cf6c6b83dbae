//! INI file configuration adapter.

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use tracing::warn;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| TraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

/// Log a malformed value once per lookup and fall back to the default.
fn or_default<T: std::fmt::Display>(
    parsed: Result<Option<T>, String>,
    section: &str,
    key: &str,
    default: T,
) -> T {
    match parsed {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(reason) => {
            warn!(section, key, %reason, %default, "malformed config value; using default");
            default
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    /// Blank values read as absent.
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        or_default(self.config.getint(section, key), section, key, default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        or_default(self.config.getfloat(section, key), section, key, default)
    }

    /// Accepts true/false, yes/no, on/off, 1/0 and their one-letter forms.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        or_default(self.config.getboolcoerce(section, key), section, key, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[trader]
product_code = BTC_JPY
trade_duration = 1m

[sqlite]
path = /var/lib/candletrader/trader.db
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("trader", "product_code"),
            Some("BTC_JPY".to_string())
        );
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/candletrader/trader.db".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[trader]\ndata_limit = 100\n").unwrap();
        assert_eq!(adapter.get_string("trader", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[trader]\nnum_ranking = 2\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("trader", "num_ranking", 0), 2);
        assert_eq!(adapter.get_int("trader", "missing", 42), 42);
        assert_eq!(adapter.get_int("trader", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[trader]\nstop_limit_percent = 0.85\nbad = not_a_number\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("trader", "stop_limit_percent", 0.0), 0.85);
        assert_eq!(adapter.get_double("trader", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("trader", "bad", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[trader]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("trader", "a", false));
        assert!(adapter.get_bool("trader", "b", false));
        assert!(adapter.get_bool("trader", "c", false));
        assert!(!adapter.get_bool("trader", "d", true));
        assert!(!adapter.get_bool("trader", "e", true));
        assert!(!adapter.get_bool("trader", "f", true));
        assert!(adapter.get_bool("trader", "missing", true));
    }

    #[test]
    fn blank_string_is_absent() {
        let adapter = FileConfigAdapter::from_string("[trader]\nlog_file =\n").unwrap();
        assert_eq!(adapter.get_string("trader", "log_file"), None);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[trader]\nback_test = false\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert!(!adapter.get_bool("trader", "back_test", true));
    }

    #[test]
    fn from_file_reports_missing_file() {
        match FileConfigAdapter::from_file("/nonexistent/path/config.ini") {
            Err(TraderError::ConfigParse { file, .. }) => {
                assert_eq!(file, "/nonexistent/path/config.ini");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
