//! Configuration management.
//!
//! Values come from an optional file plus `EVENTSTORE__*` environment
//! variables, e.g. `EVENTSTORE__PERSISTENCE__MODULE=sqlite` and
//! `EVENTSTORE__PERSISTENCE__SQLITE_DBNAME=instudio.db`.

use serde::Deserialize;
use std::time::Duration;

use crate::event_sourcing::notification_log::DEFAULT_MAX_PAGE_SIZE;
use crate::utils::RetryPolicy;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Event store backend
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Notification log paging
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Command retry on concurrency conflicts
    #[serde(default)]
    pub retry: RetryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceModule {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub module: PersistenceModule,

    /// SQLite database file, or `:memory:`
    #[serde(default = "default_sqlite_dbname")]
    pub sqlite_dbname: String,

    /// Connection pool size for file-backed SQLite
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            module: PersistenceModule::default(),
            sqlite_dbname: default_sqlite_dbname(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Upper bound on items returned by one notification page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per command; 1 means conflicts reach the caller
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_sqlite_dbname() -> String {
    "instudio.db".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    5
}

fn default_max_delay_ms() -> u64 {
    200
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_log_level() -> String {
    "info,instudio_events=debug".to_string()
}

impl AppConfig {
    /// Load configuration from environment.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("EVENTSTORE").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("EVENTSTORE").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(text: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_use_memory_store_without_retry() {
        let config = AppConfig::default();

        assert_eq!(config.persistence.module, PersistenceModule::Memory);
        assert_eq!(config.persistence.sqlite_dbname, "instudio.db");
        assert_eq!(config.notifications.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.retry.policy().max_attempts, 1);
    }

    #[test]
    fn test_empty_source_matches_defaults() {
        let config = from_toml("");
        assert_eq!(config.persistence.module, PersistenceModule::Memory);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_sqlite_from_file() {
        let config = from_toml(
            r#"
            [persistence]
            module = "sqlite"
            sqlite_dbname = "salon.db"

            [notifications]
            max_page_size = 50

            [retry]
            max_attempts = 3
            initial_delay_ms = 1
            "#,
        );

        assert_eq!(config.persistence.module, PersistenceModule::Sqlite);
        assert_eq!(config.persistence.sqlite_dbname, "salon.db");
        assert_eq!(config.persistence.max_connections, 4);
        assert_eq!(config.notifications.max_page_size, 50);

        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1));
        assert_eq!(policy.max_delay, Duration::from_millis(200));
    }
}
