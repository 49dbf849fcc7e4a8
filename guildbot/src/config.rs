use anyhow::Result;
use config::{Config as ConfigLoader, Environment, File};
use guildbot_cache::CacheConfig;
use guildbot_metrics::MonitorConfig;
use guildbot_storage::PoolConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::logging::LogSettings;

/// Process configuration, layered from defaults, `config/default`, `config/local`, an
/// optional explicit file and `GUILDBOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub log: LogSettings,
    pub pool: PoolSettings,
    pub cache: CacheSettings,
    pub monitor: MonitorSettings,
    pub maintenance_interval_ms: u64,
    /// Prometheus listener; no exporter is installed when unset.
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub pool_size: usize,
    pub queue_timeout_ms: u64,
    pub connection_timeout_ms: u64,
    /// Zero disables idle retirement.
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size: usize,
    pub default_ttl_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub history_size: usize,
    pub slow_query_threshold_ms: f64,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("GUILDBOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn pool_config(&self) -> Result<PoolConfig> {
        let idle_timeout = match self.pool.idle_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(PoolConfig::builder()
            .pool_size(self.pool.pool_size)
            .queue_timeout(Duration::from_millis(self.pool.queue_timeout_ms))
            .connection_timeout(Duration::from_millis(self.pool.connection_timeout_ms))
            .idle_timeout(idle_timeout)
            .build()?)
    }

    pub fn cache_config(&self) -> Result<CacheConfig> {
        Ok(CacheConfig::builder()
            .max_size(self.cache.max_size)
            .default_ttl(Duration::from_millis(self.cache.default_ttl_ms))
            .build()?)
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        Ok(MonitorConfig::builder()
            .history_size(self.monitor.history_size)
            .slow_query_threshold_ms(self.monitor.slow_query_threshold_ms)
            .build()?)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://guildbot.db".to_string(),
            log: LogSettings::default(),
            pool: PoolSettings::default(),
            cache: CacheSettings::default(),
            monitor: MonitorSettings::default(),
            maintenance_interval_ms: 60_000,
            metrics_addr: None,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 5,
            queue_timeout_ms: 5_000,
            connection_timeout_ms: 30_000,
            idle_timeout_ms: 60_000,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl_ms: 300_000,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            history_size: 1000,
            slow_query_threshold_ms: 100.0,
        }
    }
}
