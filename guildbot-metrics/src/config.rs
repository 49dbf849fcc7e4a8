use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Configuration for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Query records kept in the history ring.
    pub history_size: usize,

    /// History entries included in a metrics report.
    pub recent_window: usize,

    /// Maximum number of slow queries returned at once.
    pub slow_query_limit: usize,

    /// Default threshold for slow queries, in milliseconds.
    pub slow_query_threshold_ms: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_size: 1000,
            recent_window: 10,
            slow_query_limit: 20,
            slow_query_threshold_ms: 100.0,
        }
    }
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    history_size: Option<usize>,
    recent_window: Option<usize>,
    slow_query_limit: Option<usize>,
    slow_query_threshold_ms: Option<f64>,
}

impl MonitorConfigBuilder {
    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = Some(size);
        self
    }

    pub fn recent_window(mut self, window: usize) -> Self {
        self.recent_window = Some(window);
        self
    }

    pub fn slow_query_limit(mut self, limit: usize) -> Self {
        self.slow_query_limit = Some(limit);
        self
    }

    pub fn slow_query_threshold_ms(mut self, threshold: f64) -> Self {
        self.slow_query_threshold_ms = Some(threshold);
        self
    }

    /// # Errors
    ///
    /// Returns `MonitorError::Configuration` for an empty history or a negative
    /// threshold.
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        let default = MonitorConfig::default();

        let history_size = self.history_size.unwrap_or(default.history_size);
        if history_size == 0 {
            return Err(MonitorError::Configuration(
                "history_size must be greater than 0".to_string(),
            ));
        }

        let slow_query_threshold_ms = self
            .slow_query_threshold_ms
            .unwrap_or(default.slow_query_threshold_ms);
        if !slow_query_threshold_ms.is_finite() || slow_query_threshold_ms < 0.0 {
            return Err(MonitorError::Configuration(
                "slow_query_threshold_ms must be a non-negative number".to_string(),
            ));
        }

        Ok(MonitorConfig {
            history_size,
            recent_window: self.recent_window.unwrap_or(default.recent_window),
            slow_query_limit: self.slow_query_limit.unwrap_or(default.slow_query_limit),
            slow_query_threshold_ms,
        })
    }
}
