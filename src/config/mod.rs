use std::time::Duration;

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

use crate::domain::Department;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub departments: DepartmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Base URL of the record server, e.g. `http://127.0.0.1:8080`.
    pub api_base_url: String,
    pub max_pinned_per_department: usize,
    pub bootstrap_timeout_ms: u64,
    pub tick_interval_ms: u64,
    /// Delay before re-entering bootstrap after the push stream drops. Zero
    /// leaves the store disconnected until `connect` is called again.
    pub reconnect_delay_ms: u64,
    /// Directory for the pin override cache. No directory means memory only.
    pub pin_cache_dir: Option<String>,
    pub role: Option<String>,
}

impl EngineConfig {
    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        (self.reconnect_delay_ms > 0).then(|| Duration::from_millis(self.reconnect_delay_ms))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            max_pinned_per_department: 3,
            bootstrap_timeout_ms: 3000,
            tick_interval_ms: 1000,
            reconnect_delay_ms: 5000,
            pin_cache_dir: None,
            role: None,
        }
    }
}

/// Ordered classifier rules. Empty means the built-in table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DepartmentConfig {
    #[serde(default)]
    pub rules: Vec<DepartmentRuleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DepartmentRuleConfig {
    pub department: Department,
    pub fragments: Vec<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://noticeboard.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("engine.api_base_url", "http://127.0.0.1:8080")?
            .set_default("engine.max_pinned_per_department", 3)?
            .set_default("engine.bootstrap_timeout_ms", 3000)?
            .set_default("engine.tick_interval_ms", 1000)?
            .set_default("engine.reconnect_delay_ms", 5000)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with NOTICEBOARD__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("NOTICEBOARD").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://noticeboard.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            engine: EngineConfig::default(),
            departments: DepartmentConfig::default(),
        }
    }
}
