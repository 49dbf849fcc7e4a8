//! Emission through the `metrics` facade.
//!
//! Nothing is exported unless the process installs a recorder; the `guildbot` binary
//! installs a Prometheus one when `metrics_addr` is configured.

use guildbot_core::{CacheStats, PoolStats};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Duration;

use crate::classify::QueryType;

/// Registers descriptions for every metric emitted here.
pub fn describe_metrics() {
    describe_counter!(
        "db_queries_total",
        Unit::Count,
        "Total number of database queries, including cache hits"
    );
    describe_histogram!(
        "db_query_duration_seconds",
        Unit::Seconds,
        "Database query duration in seconds"
    );
    describe_gauge!(
        "db_pool_connections",
        Unit::Count,
        "Connections in the pool by state"
    );
    describe_gauge!(
        "db_pool_queued_requests",
        Unit::Count,
        "Callers waiting for a database connection"
    );
    describe_gauge!("cache_entries", Unit::Count, "Entries held by the query cache");
    describe_gauge!(
        "cache_hit_rate_percent",
        Unit::Percent,
        "Query cache hit rate"
    );
}

/// Records one query.
pub fn record_query(query_type: QueryType, duration: Duration, cached: bool) {
    let cached = if cached { "true" } else { "false" };

    counter!(
        "db_queries_total",
        "query_type" => query_type.as_str(),
        "cached" => cached
    )
    .increment(1);

    histogram!(
        "db_query_duration_seconds",
        "query_type" => query_type.as_str(),
        "cached" => cached
    )
    .record(duration.as_secs_f64());
}

/// Publishes the latest pool snapshot as gauges.
pub fn set_pool_gauges(stats: &PoolStats) {
    gauge!("db_pool_connections", "state" => "available").set(stats.available_connections as f64);
    gauge!("db_pool_connections", "state" => "in_use").set(stats.in_use_connections as f64);
    gauge!("db_pool_queued_requests").set(stats.queued_requests as f64);
}

/// Publishes the latest cache snapshot as gauges.
pub fn set_cache_gauges(stats: &CacheStats) {
    gauge!("cache_entries").set(stats.size as f64);
    gauge!("cache_hit_rate_percent").set(stats.hit_rate);
}
