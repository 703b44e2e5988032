use electralens_core::IngestConfig;
use serde::{Deserialize, Serialize};

const MEGABYTE: usize = 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SQLite database file, created on first start
    pub db_path: String,
    pub port: u16,
    /// Largest accepted upload, in megabytes
    pub max_upload_mb: usize,
    /// Try the one-cell-per-line reader when no aligned table is found
    pub fallback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: "electralens.db".to_string(),
            port: 8000,
            max_upload_mb: 20,
            fallback: true,
        }
    }
}

impl ServerConfig {
    /// Reads `ELECTRALENS_DB`, `ELECTRALENS_PORT`, `ELECTRALENS_MAX_UPLOAD_MB`
    /// and `ELECTRALENS_FALLBACK`. Unset or unparsable values keep their
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            db_path: lookup("ELECTRALENS_DB").unwrap_or(defaults.db_path),
            port: lookup("ELECTRALENS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            max_upload_mb: lookup("ELECTRALENS_MAX_UPLOAD_MB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_mb),
            fallback: lookup("ELECTRALENS_FALLBACK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.fallback),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(MEGABYTE)
    }

    /// Pipeline settings; the stream reader is dropped when `fallback` is off.
    pub fn ingest_config(&self) -> IngestConfig {
        let config = IngestConfig::default();
        if self.fallback {
            config
        } else {
            config.without_fallback()
        }
    }
}
