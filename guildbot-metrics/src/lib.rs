//! Performance monitoring for the guildbot data layer.
//!
//! [`PerformanceMonitor`] aggregates per-query timings by statement type, keeps a
//! bounded history for slow-query analysis and holds the latest cache and pool
//! snapshots. Every recorded query is also emitted through the `metrics` facade.

pub mod classify;
pub mod config;
pub mod error;
pub mod facade;
pub mod health;
pub mod monitor;
pub mod system;

pub use classify::QueryType;
pub use config::{MonitorConfig, MonitorConfigBuilder};
pub use error::MonitorError;
pub use health::PoolHealth;
pub use monitor::{
    DurationStats, MetricsReport, PerformanceMonitor, QueryMetrics, QueryRecord,
    QueryTypeMetrics, MAX_RECORDED_SQL_CHARS,
};
pub use system::MemorySnapshot;
