//! Server configuration.
//!
//! Values are layered, later sources winning:
//!
//! ```text
//! built-in defaults ─► TOML file ─► STOCKBOOK_* environment variables
//! ```
//!
//! The file is `$STOCKBOOK_CONFIG` when set (and must then exist), otherwise
//! an optional `stockbook.toml` in the working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use stockbook_core::{DEFAULT_ESTIMATED_MARGIN_BPS, DEFAULT_OVERDUE_AFTER_DAYS};
use stockbook_db::DbConfig;

/// Env var naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "STOCKBOOK_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "stockbook.toml";
const DEFAULT_LOG_FILTER: &str = "info,stockbook=debug,sqlx=warn";

/// Stockbook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Per-request deadline; expiry answers 503
    pub request_timeout_secs: u64,

    /// Shop's local offset from UTC, used for daily/monthly windows
    pub utc_offset_minutes: i32,

    /// Days of silence after which an indebted debtor is overdue
    pub overdue_after_days: i64,

    /// Assumed margin for lines without a recorded cost (basis points)
    pub estimated_margin_bps: u32,

    /// Ranked products returned per dashboard period
    pub top_products_limit: usize,

    /// Reject increases above a debtor's max debt
    pub enforce_credit_limit: bool,

    /// tracing EnvFilter directive; RUST_LOG wins when set
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_path: default_database_path(),
            max_connections: 5,
            request_timeout_secs: 30,
            utc_offset_minutes: 0,
            overdue_after_days: DEFAULT_OVERDUE_AFTER_DAYS,
            estimated_margin_bps: DEFAULT_ESTIMATED_MARGIN_BPS,
            top_products_limit: 10,
            enforce_credit_limit: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::load_from(Some(Path::new(&path))),
            None => Self::load_from(None),
        }
    }

    /// Loads configuration with an explicit file.
    ///
    /// `None` falls back to an optional `stockbook.toml`.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: ServerConfig = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port)?
            .set_default("database_path", defaults.database_path.to_string_lossy().into_owned())?
            .set_default("max_connections", defaults.max_connections)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("utc_offset_minutes", defaults.utc_offset_minutes)?
            .set_default("overdue_after_days", defaults.overdue_after_days)?
            .set_default("estimated_margin_bps", defaults.estimated_margin_bps)?
            .set_default("top_products_limit", defaults.top_products_limit as u64)?
            .set_default("enforce_credit_limit", defaults.enforce_credit_limit)?
            .set_default("log_filter", defaults.log_filter)?
            .add_source(file_source)
            .add_source(Environment::with_prefix("STOCKBOOK").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges the deserializer cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::invalid("max_connections", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be at least 1"));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(ConfigError::invalid(
                "utc_offset_minutes",
                "must be within ±1439 minutes",
            ));
        }
        if self.overdue_after_days < 0 {
            return Err(ConfigError::invalid("overdue_after_days", "must not be negative"));
        }
        if self.estimated_margin_bps > 10_000 {
            return Err(ConfigError::invalid("estimated_margin_bps", "must be at most 10000"));
        }
        if !(1..=100).contains(&self.top_products_limit) {
            return Err(ConfigError::invalid("top_products_limit", "must be between 1 and 100"));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The shop's local offset. Validated on load, UTC otherwise.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .enforce_credit_limit(self.enforce_credit_limit)
            .estimated_margin_bps(self.estimated_margin_bps)
    }
}

/// `<data dir>/stockbook.db`, or `./stockbook.db` without a home directory.
fn default_database_path() -> PathBuf {
    ProjectDirs::from("com", "stockbook", "stockbook")
        .map(|dirs| dirs.data_dir().join("stockbook.db"))
        .unwrap_or_else(|| PathBuf::from("./stockbook.db"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    fn invalid(key: &str, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.utc_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = ServerConfig {
            utc_offset_minutes: 24 * 60,
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "utc_offset_minutes"
        ));

        let config = ServerConfig {
            estimated_margin_bps: 12_000,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            top_products_limit: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_offset_in_minutes() {
        let config = ServerConfig {
            utc_offset_minutes: 300,
            ..ServerConfig::default()
        };
        assert_eq!(config.utc_offset().local_minus_utc(), 5 * 3600);
    }

    #[test]
    fn test_db_config_carries_policy() {
        let config = ServerConfig {
            enforce_credit_limit: true,
            estimated_margin_bps: 2_500,
            max_connections: 3,
            ..ServerConfig::default()
        };
        let db = config.db_config();
        assert!(db.policy.enforce_credit_limit);
        assert_eq!(db.policy.estimated_margin_bps, 2_500);
        assert_eq!(db.max_connections, 3);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = ServerConfig::load_from(Some(Path::new("/nonexistent/stockbook.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
