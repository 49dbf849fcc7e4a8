//! Plain statistics records exchanged between the cache, the connection pool
//! and the performance monitor.
//!
//! Each producer builds these by value on request; the monitor stores the latest
//! copy it was handed and never reaches back into the producer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time statistics for a `Cache`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries currently stored (expired entries not yet purged included).
    pub size: usize,

    /// Maximum number of entries before LRU eviction kicks in.
    pub max_size: usize,

    /// Lookups that returned a live value.
    pub hits: u64,

    /// Lookups for absent or expired keys.
    pub misses: u64,

    /// Insertions and overwrites.
    pub sets: u64,

    /// Entries removed to make room for a new key.
    pub evictions: u64,

    /// Entries removed by explicit invalidation.
    pub invalidations: u64,

    /// Entries purged because their TTL elapsed.
    pub expirations: u64,

    /// Hit rate as a percentage (0.0 - 100.0).
    pub hit_rate: f64,

    /// Best-effort byte estimate of keys plus serialized values.
    pub memory_usage: usize,

    /// Timestamp when statistics were collected.
    pub collected_at: DateTime<Utc>,
}

impl CacheStats {
    /// Statistics of a cache that has never been used.
    pub fn empty(max_size: usize) -> Self {
        Self {
            size: 0,
            max_size,
            hits: 0,
            misses: 0,
            sets: 0,
            evictions: 0,
            invalidations: 0,
            expirations: 0,
            hit_rate: 0.0,
            memory_usage: 0,
            collected_at: Utc::now(),
        }
    }

    /// Total number of lookups served.
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate as a percentage, 0 when no lookups have happened yet.
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// Point-in-time statistics for a `ConnectionPool`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured number of connections.
    pub pool_size: usize,

    /// Connections still owned by the pool (shrinks as idle handles retire).
    pub total_connections: usize,

    /// Idle connections ready to be handed out.
    pub available_connections: usize,

    /// Connections currently checked out.
    pub in_use_connections: usize,

    /// Callers currently waiting for a connection.
    pub queued_requests: usize,

    /// Connections created over the pool's lifetime; survives `reset_stats`.
    pub created: u64,

    /// Successful acquisitions, direct or by hand-off.
    pub acquired: u64,

    /// Connections returned to the pool.
    pub released: u64,

    /// Acquisitions that had to wait in the queue.
    pub queued: u64,

    /// Queued acquisitions that gave up after the queue timeout.
    pub timeouts: u64,

    /// Failed query executions.
    pub errors: u64,

    /// `in_use / total * 100` with two decimals, "0.00" when the pool is empty.
    pub utilization: String,

    /// Timestamp when statistics were collected.
    pub collected_at: DateTime<Utc>,
}

impl PoolStats {
    /// Formats the utilization percentage the way it is reported.
    pub fn format_utilization(in_use: usize, total: usize) -> String {
        if total == 0 {
            "0.00".to_string()
        } else {
            format!("{:.2}", in_use as f64 / total as f64 * 100.0)
        }
    }

    /// Utilization as a number for threshold checks.
    pub fn utilization_percent(&self) -> f64 {
        if self.total_connections == 0 {
            0.0
        } else {
            self.in_use_connections as f64 / self.total_connections as f64 * 100.0
        }
    }

    /// High utilization with callers waiting.
    pub fn is_under_pressure(&self) -> bool {
        self.utilization_percent() > 80.0 && self.queued_requests > 0
    }

    /// Whether idle retirement has shrunk the pool below its configured size.
    pub fn is_depleted(&self) -> bool {
        self.total_connections < self.pool_size
    }
}
