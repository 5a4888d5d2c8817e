//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default except where
//! noted.
//!
//! | Key                       | Default                    |
//! |---------------------------|----------------------------|
//! | `LISTEN_ADDR`             | `0.0.0.0:3000`             |
//! | `SOURCE_URL`              | [`DEFAULT_SOURCE_URL`]     |
//! | `PROBE_TIMEOUT_SECS`      | `3`                        |
//! | `FETCH_TIMEOUT_SECS`      | `10`                       |
//! | `PROBE_RANGE_BYTES`       | `16384`                    |
//! | `CACHE_TTL_SECS`          | `300`                      |
//! | `RATE_LIMIT_MAX_REQUESTS` | `10`                       |
//! | `RATE_LIMIT_WINDOW_SECS`  | `60`                       |
//! | `STORAGE_BACKEND`         | `fs` (`fs` or `memory`)    |
//! | `STORAGE_ROOT`            | `./data`                   |
//! | `ADMIN_ENABLED`           | `true`                     |
//! | `LOG_FORMAT`              | `text` (`text` or `json`)  |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Page scraped when `SOURCE_URL` is unset.
pub const DEFAULT_SOURCE_URL: &str = "http://localhost:8080/leaderboard";

/// Where snapshots and the country directory are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// One file per object under a root directory.
    Filesystem(PathBuf),
    /// Process memory; lost on restart.
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration that could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A key was set to an unusable value.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Environment key.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`AppConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Leaderboard page to scrape.
    pub source_url: String,
    /// Timeout for the fingerprint probe.
    pub probe_timeout: Duration,
    /// Timeout for a full page fetch.
    pub fetch_timeout: Duration,
    /// Bytes requested by the fingerprint probe.
    pub probe_range_bytes: u64,
    /// Cache TTL used when the probe fails.
    pub cache_ttl: Duration,
    /// Requests allowed per client per window on `/leaderboard`.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window length.
    pub rate_limit_window: Duration,
    /// Object storage backend.
    pub storage: StorageBackend,
    /// Mount the `/admin` maintenance routes.
    pub admin_enabled: bool,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR`, `STORAGE_BACKEND`, or
    /// `LOG_FORMAT` is set to something unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let listen_addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            key: "LISTEN_ADDR",
            value: raw_addr.clone(),
        })?;

        let storage_root = lookup("STORAGE_ROOT").unwrap_or_else(|| "./data".to_string());
        let storage = match lookup("STORAGE_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => StorageBackend::Filesystem(PathBuf::from(storage_root)),
            Some(kind) if kind == "fs" || kind == "filesystem" => {
                StorageBackend::Filesystem(PathBuf::from(storage_root))
            }
            Some(kind) if kind == "memory" => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other,
                });
            }
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            listen_addr,
            source_url: lookup("SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            probe_timeout: Duration::from_secs(parse_env(&lookup, "PROBE_TIMEOUT_SECS", 3)),
            fetch_timeout: Duration::from_secs(parse_env(&lookup, "FETCH_TIMEOUT_SECS", 10)),
            probe_range_bytes: parse_env(&lookup, "PROBE_RANGE_BYTES", 16 * 1024),
            cache_ttl: Duration::from_secs(parse_env(&lookup, "CACHE_TTL_SECS", 300)),
            rate_limit_max_requests: parse_env(&lookup, "RATE_LIMIT_MAX_REQUESTS", 10),
            rate_limit_window: Duration::from_secs(parse_env(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                60,
            )),
            storage,
            admin_enabled: parse_env_bool(&lookup, "ADMIN_ENABLED", true),
            log_format,
        })
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let Ok(cfg) = config(&[]) else {
            panic!("default config rejected");
        };
        assert_eq!(cfg.listen_addr.port(), 3000);
        assert_eq!(cfg.probe_timeout, Duration::from_secs(3));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(10));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.rate_limit_max_requests, 10);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(60));
        assert_eq!(cfg.storage, StorageBackend::Filesystem(PathBuf::from("./data")));
        assert!(cfg.admin_enabled);
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn overrides_are_read() {
        let Ok(cfg) = config(&[
            ("CACHE_TTL_SECS", "60"),
            ("STORAGE_BACKEND", "memory"),
            ("LOG_FORMAT", "JSON"),
            ("ADMIN_ENABLED", "0"),
        ]) else {
            panic!("config rejected");
        };
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(!cfg.admin_enabled);
    }

    #[test]
    fn garbage_numbers_fall_back_to_defaults() {
        let Ok(cfg) = config(&[("PROBE_TIMEOUT_SECS", "soon")]) else {
            panic!("config rejected");
        };
        assert_eq!(cfg.probe_timeout, Duration::from_secs(3));
    }

    #[test]
    fn bad_listen_addr_and_backend_are_errors() {
        assert!(config(&[("LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config(&[("STORAGE_BACKEND", "s3")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
