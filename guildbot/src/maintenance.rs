//! Periodic upkeep while the bot runs.

use chrono::{DateTime, Utc};
use guildbot_metrics::PoolHealth;
use guildbot_storage::DataStore;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one maintenance pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceReport {
    /// Expired cache entries purged.
    pub expired: usize,
    /// Slow queries recorded since the previous pass.
    pub new_slow_queries: usize,
    pub pool_health: Option<PoolHealth>,
}

/// Runs maintenance passes every `every` until `shutdown` resolves.
pub async fn run<F>(store: &DataStore, every: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut since = Utc::now();
    info!(interval_ms = every.as_millis() as u64, "Maintenance loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let now = Utc::now();
                tick(store, since);
                since = now;
            }
        }
    }

    info!("Maintenance loop stopped");
}

/// Purges expired cache entries, pushes fresh stats into the monitor and logs slow
/// queries recorded after `since`.
pub fn tick(store: &DataStore, since: DateTime<Utc>) -> MaintenanceReport {
    let expired = store.cache().cleanup();
    store.refresh_metrics();

    let monitor = store.monitor();
    let slow: Vec<_> = monitor
        .default_slow_queries()
        .into_iter()
        .filter(|record| record.recorded_at > since)
        .collect();

    for record in &slow {
        warn!(
            sql = %record.sql,
            duration_ms = record.duration_ms,
            query_type = %record.query_type,
            "Slow query"
        );
    }

    let report = monitor.metrics();
    match report.pool_health {
        Some(PoolHealth::Healthy) | None => {}
        Some(health) => {
            if let Some(pool) = &report.pool {
                warn!(
                    ?health,
                    total = pool.total_connections,
                    in_use = pool.in_use_connections,
                    queued = pool.queued_requests,
                    utilization = %pool.utilization,
                    "Connection pool is not healthy"
                );
            }
        }
    }

    debug!(
        expired,
        slow = slow.len(),
        cache_hit_rate = report.queries.cache_hit_rate,
        rss_bytes = report.memory.resident_bytes,
        "Maintenance pass complete"
    );

    MaintenanceReport {
        expired,
        new_slow_queries: slow.len(),
        pool_health: report.pool_health,
    }
}
