//! Cache-aside data access over the pool.

use guildbot_cache::{Cache, KeyPattern};
use guildbot_metrics::{MetricsReport, PerformanceMonitor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::PoolError;
use crate::pool::ConnectionPool;
use crate::query::{QueryMethod, QueryOutput, RunResult, SqlParam};

/// The data access function used by the rest of the bot.
///
/// Reads check the cache first and fill it on a miss; writes go straight to the pool
/// and drop whatever cached key family they touch. Every statement is timed into the
/// monitor, with cache hits recorded as cached queries.
#[derive(Debug, Clone)]
pub struct DataStore {
    pool: ConnectionPool,
    cache: Arc<Cache<QueryOutput>>,
    monitor: Arc<PerformanceMonitor>,
}

impl DataStore {
    pub fn new(
        pool: ConnectionPool,
        cache: Arc<Cache<QueryOutput>>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            pool,
            cache,
            monitor,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<Cache<QueryOutput>> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Returns the cached output for `key`, or runs the statement and caches it.
    ///
    /// `ttl` overrides the cache's default time-to-live. Failed statements are not
    /// cached.
    pub async fn query_cached(
        &self,
        key: &str,
        sql: &str,
        params: &[SqlParam],
        method: QueryMethod,
        ttl: Option<Duration>,
    ) -> Result<QueryOutput, PoolError> {
        let started = Instant::now();

        if let Some(output) = self.cache.get(key) {
            self.monitor.record_query(sql, started.elapsed(), true);
            debug!(key, "Query served from cache");
            return Ok(output);
        }

        let output = self.pool.exec_query(sql, params, method).await?;
        match ttl {
            Some(ttl) => self.cache.set_with_ttl(key, output.clone(), ttl),
            None => self.cache.set(key, output.clone()),
        }
        self.monitor.record_query(sql, started.elapsed(), false);

        Ok(output)
    }

    /// Runs a statement without touching the cache.
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        method: QueryMethod,
    ) -> Result<QueryOutput, PoolError> {
        let started = Instant::now();
        let output = self.pool.exec_query(sql, params, method).await?;
        self.monitor.record_query(sql, started.elapsed(), false);
        Ok(output)
    }

    /// Runs a write and, if it succeeds, invalidates every cached key matching
    /// `invalidate`.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[SqlParam],
        invalidate: Option<&KeyPattern>,
    ) -> Result<RunResult, PoolError> {
        let result = self.query(sql, params, QueryMethod::Run).await?.run_result();

        if let Some(pattern) = invalidate {
            let removed = self.cache.invalidate_pattern(pattern);
            debug!(pattern = pattern.as_str(), removed, "Invalidated cached queries after write");
        }

        Ok(result)
    }

    /// Pushes the latest cache and pool stats into the monitor.
    pub fn refresh_metrics(&self) {
        self.monitor.update_cache_metrics(self.cache.stats());
        self.monitor.update_pool_metrics(self.pool.stats());
    }

    /// Refreshes subsystem stats, then builds the monitor report.
    pub fn report(&self) -> MetricsReport {
        self.refresh_metrics();
        self.monitor.metrics()
    }
}
