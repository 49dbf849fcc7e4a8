#![allow(dead_code)]

use guildbot_cache::{Cache, CacheConfig};
use guildbot_metrics::PerformanceMonitor;
use guildbot_storage::{ConnectionPool, DataStore, PoolConfig, QueryMethod};
use sqlx::sqlite::SqliteConnectOptions;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Pool configuration with the idle sweep disabled.
pub fn pool_config(pool_size: usize, queue_timeout_ms: u64) -> PoolConfig {
    PoolConfig::builder()
        .pool_size(pool_size)
        .queue_timeout(Duration::from_millis(queue_timeout_ms))
        .idle_timeout(None)
        .build()
        .unwrap()
}

/// Opens a pool over a fresh database file inside `dir`.
pub async fn file_pool(dir: &TempDir, config: PoolConfig) -> ConnectionPool {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("guildbot.db"))
        .create_if_missing(true);

    ConnectionPool::with_options(options, config).await.unwrap()
}

/// Creates the quotes table and inserts `count` quotes for guild 1.
pub async fn seed_quotes(pool: &ConnectionPool, count: i64) {
    pool.exec_query(
        "CREATE TABLE quotes (id INTEGER PRIMARY KEY, guild_id INTEGER NOT NULL, body TEXT NOT NULL)",
        &[],
        QueryMethod::Run,
    )
    .await
    .unwrap();

    for i in 0..count {
        pool.exec_query(
            "INSERT INTO quotes (guild_id, body) VALUES (?, ?)",
            &[1i64.into(), format!("quote {}", i).into()],
            QueryMethod::Run,
        )
        .await
        .unwrap();
    }
}

/// Data store over a seeded database with a 100-entry cache.
pub async fn seeded_store(dir: &TempDir) -> DataStore {
    let pool = file_pool(dir, pool_config(2, 1_000)).await;
    seed_quotes(&pool, 3).await;

    let cache = Arc::new(Cache::new(CacheConfig::default()));
    let monitor = Arc::new(PerformanceMonitor::default());
    DataStore::new(pool, cache, monitor)
}

/// Polls until `depth` callers are waiting for a connection.
pub async fn wait_for_queue(pool: &ConnectionPool, depth: usize) {
    for _ in 0..400 {
        if pool.stats().queued_requests >= depth {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("wait queue never reached depth {}", depth);
}
