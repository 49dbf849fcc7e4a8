//! Passive query and subsystem performance aggregation.

use chrono::{DateTime, Utc};
use guildbot_core::{CacheStats, PoolStats};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::classify::QueryType;
use crate::config::MonitorConfig;
use crate::facade;
use crate::health::PoolHealth;
use crate::system::{MemorySnapshot, ProcessSampler};

/// Longest SQL text kept in a history record, in characters.
pub const MAX_RECORDED_SQL_CHARS: usize = 200;

/// One executed (or cache-served) query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// SQL text, cut to [`MAX_RECORDED_SQL_CHARS`].
    pub sql: String,
    pub duration_ms: f64,
    pub cached: bool,
    pub query_type: QueryType,
    pub recorded_at: DateTime<Utc>,
}

/// Duration aggregates in milliseconds. All zero when nothing was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub total_ms: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTypeMetrics {
    pub count: u64,
    pub cached: u64,
    pub durations: DurationStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub total: u64,
    pub cached: u64,
    /// `cached / total * 100`, zero with no queries.
    pub cache_hit_rate: f64,
    pub durations: DurationStats,
    pub by_type: BTreeMap<QueryType, QueryTypeMetrics>,
    /// Most recent history entries, oldest first.
    pub recent: Vec<QueryRecord>,
}

/// Point-in-time performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub queries: QueryMetrics,
    pub cache: Option<CacheStats>,
    pub pool: Option<PoolStats>,
    pub pool_health: Option<PoolHealth>,
    pub memory: MemorySnapshot,
    pub uptime_secs: u64,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Totals {
    count: u64,
    cached: u64,
    total_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            count: 0,
            cached: 0,
            total_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: 0.0,
        }
    }
}

impl Totals {
    fn record(&mut self, duration_ms: f64, cached: bool) {
        self.count += 1;
        if cached {
            self.cached += 1;
        }
        self.total_ms += duration_ms;
        self.min_ms = self.min_ms.min(duration_ms);
        self.max_ms = self.max_ms.max(duration_ms);
    }

    fn durations(&self) -> DurationStats {
        if self.count == 0 {
            return DurationStats::default();
        }

        DurationStats {
            total_ms: self.total_ms,
            avg_ms: self.total_ms / self.count as f64,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
        }
    }

    fn summary(&self) -> QueryTypeMetrics {
        QueryTypeMetrics {
            count: self.count,
            cached: self.cached,
            durations: self.durations(),
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    overall: Totals,
    by_type: BTreeMap<QueryType, Totals>,
    history: VecDeque<QueryRecord>,
    cache: Option<CacheStats>,
    pool: Option<PoolStats>,
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(MAX_RECORDED_SQL_CHARS) {
        Some((cut, _)) => sql[..cut].to_string(),
        None => sql.to_string(),
    }
}

/// Aggregates query timings and the latest cache and pool stats.
///
/// The monitor only observes: it never calls into the cache or the pool, and reading
/// a report never changes a counter.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    sampler: Mutex<ProcessSampler>,
    started_at: Instant,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                history: VecDeque::with_capacity(config.history_size),
                ..MonitorState::default()
            }),
            config,
            sampler: Mutex::new(ProcessSampler::new()),
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Records one query; cache hits pass `cached = true`.
    pub fn record_query(&self, sql: &str, duration: Duration, cached: bool) {
        let query_type = QueryType::classify(sql);
        let duration_ms = duration.as_secs_f64() * 1000.0;

        facade::record_query(query_type, duration, cached);

        let record = QueryRecord {
            sql: truncate_sql(sql),
            duration_ms,
            cached,
            query_type,
            recorded_at: Utc::now(),
        };

        let mut state = self.state.lock();
        state.overall.record(duration_ms, cached);
        state
            .by_type
            .entry(query_type)
            .or_default()
            .record(duration_ms, cached);

        if state.history.len() == self.config.history_size {
            state.history.pop_front();
        }
        state.history.push_back(record);

        trace!(%query_type, duration_ms, cached, "Query recorded");
    }

    /// Replaces the stored cache snapshot.
    pub fn update_cache_metrics(&self, stats: CacheStats) {
        facade::set_cache_gauges(&stats);
        self.state.lock().cache = Some(stats);
    }

    /// Replaces the stored pool snapshot.
    pub fn update_pool_metrics(&self, stats: PoolStats) {
        facade::set_pool_gauges(&stats);
        self.state.lock().pool = Some(stats);
    }

    /// Builds a report from the current counters.
    pub fn metrics(&self) -> MetricsReport {
        let (queries, cache, pool) = {
            let state = self.state.lock();

            let by_type = QueryType::ALL
                .iter()
                .map(|query_type| {
                    let summary = state
                        .by_type
                        .get(query_type)
                        .map(Totals::summary)
                        .unwrap_or_default();
                    (*query_type, summary)
                })
                .collect();

            let skip = state.history.len().saturating_sub(self.config.recent_window);
            let recent = state.history.iter().skip(skip).cloned().collect();

            let overall = state.overall;
            let cache_hit_rate = if overall.count == 0 {
                0.0
            } else {
                overall.cached as f64 / overall.count as f64 * 100.0
            };

            let queries = QueryMetrics {
                total: overall.count,
                cached: overall.cached,
                cache_hit_rate,
                durations: overall.durations(),
                by_type,
                recent,
            };

            (queries, state.cache.clone(), state.pool.clone())
        };

        let memory = self.sampler.lock().sample();

        MetricsReport {
            queries,
            pool_health: pool.as_ref().map(PoolHealth::from_stats),
            cache,
            pool,
            memory,
            uptime_secs: self.started_at.elapsed().as_secs(),
            collected_at: Utc::now(),
        }
    }

    /// History entries slower than `threshold_ms`, slowest first, capped at the
    /// configured limit.
    pub fn slow_queries(&self, threshold_ms: f64) -> Vec<QueryRecord> {
        let mut slow: Vec<QueryRecord> = self
            .state
            .lock()
            .history
            .iter()
            .filter(|record| record.duration_ms > threshold_ms)
            .cloned()
            .collect();

        slow.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
        slow.truncate(self.config.slow_query_limit);
        slow
    }

    /// Slow queries above the configured default threshold.
    pub fn default_slow_queries(&self) -> Vec<QueryRecord> {
        self.slow_queries(self.config.slow_query_threshold_ms)
    }

    /// Zeroes query counters and clears the history. Stored cache and pool snapshots
    /// are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.overall = Totals::default();
        state.by_type.clear();
        state.history.clear();
    }
}
