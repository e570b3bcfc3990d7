//! Runtime configuration, read from `DENTEFELIZ_*` environment variables.

use std::path::PathBuf;

use crate::identity::AdminCredentials;
use crate::limits::DEFAULT_DAILY_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the durable store log.
    pub data_dir: PathBuf,
    /// Log appends between compactions.
    pub compact_threshold: u64,
    /// Prometheus exporter port; `None` disables it.
    pub metrics_port: Option<u16>,
    /// Scheduled appointments one client may hold on one day.
    pub daily_limit: usize,
    pub admin: AdminCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
            daily_limit: DEFAULT_DAILY_LIMIT,
            admin: AdminCredentials::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("DENTEFELIZ_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let compact_threshold: u64 = lookup("DENTEFELIZ_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);
        let metrics_port: Option<u16> = lookup("DENTEFELIZ_METRICS_PORT").and_then(|s| s.parse().ok());
        let daily_limit: usize = lookup("DENTEFELIZ_DAILY_LIMIT")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.daily_limit);
        let admin = AdminCredentials {
            username: lookup("DENTEFELIZ_ADMIN_USERNAME").unwrap_or(defaults.admin.username),
            password: lookup("DENTEFELIZ_ADMIN_PASSWORD").unwrap_or(defaults.admin.password),
        };

        Self {
            data_dir,
            compact_threshold,
            metrics_port,
            daily_limit,
            admin,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("clinic.wal")
    }
}
