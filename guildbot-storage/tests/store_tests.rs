mod common;

use common::seeded_store;
use guildbot_cache::CacheKey;
use guildbot_core::GuildId;
use guildbot_storage::{PoolError, QueryMethod};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const LIST_SQL: &str = "SELECT id, body FROM quotes WHERE guild_id = ? ORDER BY id";

fn quote_list_key(guild: u64) -> String {
    CacheKey::QuoteList {
        guild_id: GuildId::new(guild),
        page: 1,
        limit: 10,
    }
    .to_string()
}

#[tokio::test]
async fn test_query_cached_miss_then_hit() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    store.monitor().reset();
    let key = quote_list_key(1);

    let first = store
        .query_cached(&key, LIST_SQL, &[1i64.into()], QueryMethod::All, None)
        .await
        .unwrap();
    let second = store
        .query_cached(&key, LIST_SQL, &[1i64.into()], QueryMethod::All, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.into_rows().len(), 3);

    let cache_stats = store.cache().stats();
    assert_eq!(cache_stats.hits, 1);
    assert_eq!(cache_stats.misses, 1);
    assert_eq!(cache_stats.sets, 1);

    let report = store.report();
    assert_eq!(report.queries.total, 2);
    assert_eq!(report.queries.cached, 1);
    assert_eq!(report.queries.cache_hit_rate, 50.0);
    assert_eq!(report.cache.unwrap().hits, 1);
    assert_eq!(report.pool.unwrap().available_connections, 2);
}

#[tokio::test]
async fn test_write_invalidates_only_the_touched_guild() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let guild_one = quote_list_key(1);
    let guild_ten = quote_list_key(10);

    store
        .query_cached(&guild_one, LIST_SQL, &[1i64.into()], QueryMethod::All, None)
        .await
        .unwrap();
    store
        .query_cached(&guild_ten, LIST_SQL, &[10i64.into()], QueryMethod::All, None)
        .await
        .unwrap();

    let pattern = CacheKey::guild_quotes_pattern(GuildId::new(1)).unwrap();
    let result = store
        .execute(
            "INSERT INTO quotes (guild_id, body) VALUES (?, ?)",
            &[1i64.into(), "fresh".into()],
            Some(&pattern),
        )
        .await
        .unwrap();

    assert_eq!(result.last_id, 4);
    assert_eq!(result.changes, 1);
    assert!(!store.cache().has(&guild_one));
    assert!(store.cache().has(&guild_ten));

    let refreshed = store
        .query_cached(&guild_one, LIST_SQL, &[1i64.into()], QueryMethod::All, None)
        .await
        .unwrap()
        .into_rows();
    assert_eq!(refreshed.len(), 4);
    assert_eq!(refreshed[3]["body"], json!("fresh"));
}

#[tokio::test]
async fn test_failed_query_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;

    let result = store
        .query_cached("custom:broken", "SELECT * FROM nope", &[], QueryMethod::All, None)
        .await;

    assert!(matches!(result, Err(PoolError::Query(_))));
    assert!(!store.cache().has("custom:broken"));
    assert_eq!(store.pool().stats().errors, 1);
    assert_eq!(store.pool().stats().available_connections, 2);
}

#[tokio::test]
async fn test_ttl_override_expires_entry() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    store.monitor().reset();
    let key = CacheKey::Quote {
        guild_id: GuildId::new(1),
        quote_id: 1,
    }
    .to_string();
    let sql = "SELECT body FROM quotes WHERE id = ?";

    store
        .query_cached(&key, sql, &[1i64.into()], QueryMethod::Get, Some(Duration::from_millis(30)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let output = store
        .query_cached(&key, sql, &[1i64.into()], QueryMethod::Get, None)
        .await
        .unwrap();

    assert_eq!(output.row().unwrap()["body"], json!("quote 0"));
    let metrics = store.monitor().metrics();
    assert_eq!(metrics.queries.total, 2);
    assert_eq!(metrics.queries.cached, 0);
}

#[tokio::test]
async fn test_uncached_query_is_recorded() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    store.monitor().reset();

    store
        .query("SELECT COUNT(*) AS n FROM quotes", &[], QueryMethod::Get)
        .await
        .unwrap();

    assert!(store.cache().is_empty());
    let metrics = store.monitor().metrics();
    assert_eq!(metrics.queries.total, 1);
    assert_eq!(metrics.queries.recent.len(), 1);
    assert_eq!(metrics.queries.recent[0].sql, "SELECT COUNT(*) AS n FROM quotes");
}
