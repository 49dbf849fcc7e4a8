use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries before the least recently used one is evicted.
    pub max_size: usize,

    /// Time-to-live applied by `Cache::set`.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Builder for creating CacheConfig instances.
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_size: Option<usize>,
    default_ttl: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Creates a new CacheConfigBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    /// Sets the default TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Builds the CacheConfig.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if `max_size` is zero.
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        let default = CacheConfig::default();

        let max_size = self.max_size.unwrap_or(default.max_size);
        if max_size == 0 {
            return Err(CacheError::Configuration(
                "max_size must be greater than 0".to_string(),
            ));
        }

        Ok(CacheConfig {
            max_size,
            default_ttl: self.default_ttl.unwrap_or(default.default_ttl),
        })
    }
}

impl CacheConfig {
    /// Creates a new CacheConfigBuilder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }
}
