//! Centralized configuration for the demo.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than when the repository is first resolved.

use std::env;
use std::fmt;

use domain::Configuration;

/// Storage backend provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on exit)
    Memory,
    /// SQLite file or `:memory:` database
    Sqlite,
    /// Redis list
    Redis,
}

impl StorageProvider {
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        if s.eq_ignore_ascii_case("memory") {
            Ok(Self::Memory)
        } else if s.eq_ignore_ascii_case("sqlite") {
            Ok(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("redis") {
            Ok(Self::Redis)
        } else {
            Err(ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("expected memory, sqlite or redis, got '{}'", s),
            })
        }
    }

    /// Whether the adapter crate for this provider was compiled in.
    pub fn is_available(self) -> bool {
        match self {
            Self::Memory => true,
            Self::Sqlite => cfg!(feature = "sqlite"),
            Self::Redis => cfg!(feature = "redis"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite path or `:memory:` (default: `:memory:`)
    pub db_connection_string: String,
    /// Redis URL (default: `redis://127.0.0.1/`)
    pub redis_url: String,
    /// Redis list key (default: `users`)
    pub redis_key: String,
    /// Delete the Redis list before running
    pub redis_flush_on_start: bool,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_provider = match lookup("STORAGE_PROVIDER") {
            Some(raw) => StorageProvider::from_str(raw.trim())?,
            None => StorageProvider::Sqlite,
        };
        if !storage_provider.is_available() {
            return Err(ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("{:?} support was not compiled in", storage_provider),
            });
        }

        let db_connection_string = lookup("DB_CONNECTION_STRING")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| ":memory:".into());

        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1/".into());
        if storage_provider == StorageProvider::Redis && !redis_url.starts_with("redis") {
            return Err(ConfigError {
                field: "REDIS_URL",
                message: format!("expected a redis:// or rediss:// URL, got '{}'", redis_url),
            });
        }

        let redis_key = lookup("REDIS_KEY")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "users".into());

        let flush = lookup("REDIS_FLUSH_ON_START").unwrap_or_default();
        let redis_flush_on_start = matches!(flush.to_lowercase().as_str(), "1" | "true" | "yes");

        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            storage_provider,
            db_connection_string,
            redis_url,
            redis_key,
            redis_flush_on_start,
            log_format,
        })
    }

    /// Backend parameters for the selected provider.
    pub fn to_configuration(&self) -> Configuration {
        match self.storage_provider {
            StorageProvider::Memory => Configuration::new(),
            StorageProvider::Sqlite => Configuration::new().with(
                Configuration::DB_CONNECTION_STRING,
                self.db_connection_string.clone(),
            ),
            StorageProvider::Redis => Configuration::new()
                .with(Configuration::REDIS_URL, self.redis_url.clone())
                .with(Configuration::REDIS_KEY, self.redis_key.clone()),
        }
    }

    /// Log warnings about settings that destroy data.
    pub fn warn_if_destructive(&self) {
        if self.storage_provider == StorageProvider::Redis && self.redis_flush_on_start {
            tracing::warn!(
                key = %self.redis_key,
                "REDIS_FLUSH_ON_START is set: the user list will be deleted before the demo runs"
            );
        }
    }
}
