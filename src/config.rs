use std::path::PathBuf;
use std::time::Duration;

use crate::limits::DEFAULT_MAX_STAY_NIGHTS;

/// Engine-facing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Per-room availability cache lifetime; `None` disables the cache.
    pub availability_cache_ttl: Option<Duration>,
    pub max_stay_nights: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            availability_cache_ttl: None,
            max_stay_nights: DEFAULT_MAX_STAY_NIGHTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub engine: EngineConfig,
}

impl Config {
    /// Read `ROOMBOOK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default, like missing ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }

        let defaults = EngineConfig::default();
        let store_timeout = parsed::<u64>(&lookup, "ROOMBOOK_STORE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);
        let availability_cache_ttl = parsed::<u64>(&lookup, "ROOMBOOK_AVAILABILITY_CACHE_TTL_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let max_stay_nights = parsed::<i64>(&lookup, "ROOMBOOK_MAX_STAY_NIGHTS")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_stay_nights);

        Self {
            data_dir: lookup("ROOMBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            metrics_port: parsed(&lookup, "ROOMBOOK_METRICS_PORT"),
            compact_threshold: parsed(&lookup, "ROOMBOOK_COMPACT_THRESHOLD").unwrap_or(1000),
            engine: EngineConfig {
                store_timeout,
                availability_cache_ttl,
                max_stay_nights,
            },
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}
