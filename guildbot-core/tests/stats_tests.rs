use chrono::Utc;
use guildbot_core::{CacheStats, GuildId, PoolStats};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_empty_cache_stats_are_zeroed() {
    let stats = CacheStats::empty(100);

    assert_eq!(stats.size, 0);
    assert_eq!(stats.max_size, 100);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.sets, 0);
    assert_eq!(stats.evictions, 0);
    assert_eq!(stats.invalidations, 0);
    assert_eq!(stats.requests(), 0);
    assert_eq!(stats.hit_rate, 0.0);
}

#[test]
fn test_cache_stats_serialization_roundtrip() {
    let mut stats = CacheStats::empty(10);
    stats.hits = 4;
    stats.misses = 1;
    stats.hit_rate = CacheStats::compute_hit_rate(4, 1);

    let json = serde_json::to_string(&stats).unwrap();
    let restored: CacheStats = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, stats);
    assert_eq!(restored.hit_rate, 80.0);
}

#[rstest]
#[case(0, 0, "0.00")]
#[case(0, 5, "0.00")]
#[case(2, 5, "40.00")]
#[case(2, 3, "66.67")]
fn test_pool_utilization_formatting(
    #[case] in_use: usize,
    #[case] total: usize,
    #[case] expected: &str,
) {
    assert_eq!(PoolStats::format_utilization(in_use, total), expected);
}

#[test]
fn test_pool_stats_json_field_names() {
    let stats = PoolStats {
        pool_size: 2,
        total_connections: 2,
        available_connections: 1,
        in_use_connections: 1,
        queued_requests: 0,
        created: 2,
        acquired: 1,
        released: 0,
        queued: 0,
        timeouts: 0,
        errors: 0,
        utilization: PoolStats::format_utilization(1, 2),
        collected_at: Utc::now(),
    };

    let value = serde_json::to_value(&stats).unwrap();
    assert_eq!(value["utilization"], "50.00");
    assert_eq!(value["in_use_connections"], 1);
    assert_eq!(value["available_connections"], 1);
}

#[test]
fn test_guild_id_ordering() {
    let mut ids = vec![GuildId::new(3), GuildId::new(1), GuildId::new(2)];
    ids.sort();
    assert_eq!(ids, vec![GuildId::new(1), GuildId::new(2), GuildId::new(3)]);
}
