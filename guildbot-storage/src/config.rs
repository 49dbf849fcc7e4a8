//! Connection pool configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PoolError;

/// Shortest interval between idle sweeps.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the SQLite connection pool.
///
/// The pool opens exactly `pool_size` connections up front and never grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened at construction.
    pub pool_size: usize,

    /// How long a caller may wait in the queue for a free connection.
    pub queue_timeout: Duration,

    /// Upper bound for opening a connection; also used as SQLite's busy timeout.
    pub connection_timeout: Duration,

    /// Idle connections unused for this long are closed for good. `None` keeps
    /// them forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            queue_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Builder for creating PoolConfig instances.
///
/// Provides a fluent interface for configuring connection pools.
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    pool_size: Option<usize>,
    queue_timeout: Option<Duration>,
    connection_timeout: Option<Duration>,
    idle_timeout: Option<Option<Duration>>,
}

impl PoolConfigBuilder {
    /// Creates a new PoolConfigBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of connections.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Sets the queue wait timeout.
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Sets the connection open timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the idle timeout for connections.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Builds the PoolConfig instance.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Configuration` if configuration is invalid.
    pub fn build(self) -> Result<PoolConfig, PoolError> {
        let default = PoolConfig::default();

        let pool_size = self.pool_size.unwrap_or(default.pool_size);
        if pool_size == 0 {
            return Err(PoolError::Configuration(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        let queue_timeout = self.queue_timeout.unwrap_or(default.queue_timeout);
        if queue_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "queue_timeout must be greater than 0".to_string(),
            ));
        }

        let connection_timeout = self
            .connection_timeout
            .unwrap_or(default.connection_timeout);
        if connection_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "connection_timeout must be greater than 0".to_string(),
            ));
        }

        let idle_timeout = self.idle_timeout.unwrap_or(default.idle_timeout);
        if idle_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(PoolError::Configuration(
                "idle_timeout must be greater than 0 when set".to_string(),
            ));
        }

        Ok(PoolConfig {
            pool_size,
            queue_timeout,
            connection_timeout,
            idle_timeout,
        })
    }
}

impl PoolConfig {
    /// Creates a new PoolConfigBuilder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Small pool with generous waits and no idle retirement.
    pub fn development() -> Self {
        Self {
            pool_size: 2,
            queue_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: None,
        }
    }

    /// Larger pool that fails fast under contention.
    pub fn high_throughput() -> Self {
        Self {
            pool_size: 10,
            queue_timeout: Duration::from_secs(2),
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }

    /// How often the idle sweep runs, if it runs at all.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.idle_timeout
            .map(|timeout| (timeout / 4).max(MIN_SWEEP_INTERVAL))
    }
}
