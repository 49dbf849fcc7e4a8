use guildbot_core::PoolStats;
use serde::{Deserialize, Serialize};

/// Utilization above which a pool is reported as degraded.
const DEGRADED_UTILIZATION: f64 = 70.0;

/// Coarse health of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl PoolHealth {
    /// Judges health from a pool snapshot.
    ///
    /// No live connections, or saturation with callers queued, is unhealthy. Heavy
    /// utilization or connections lost to idle retirement is degraded.
    pub fn from_stats(stats: &PoolStats) -> Self {
        if stats.total_connections == 0 || stats.is_under_pressure() {
            PoolHealth::Unhealthy
        } else if stats.utilization_percent() > DEGRADED_UTILIZATION || stats.is_depleted() {
            PoolHealth::Degraded
        } else {
            PoolHealth::Healthy
        }
    }
}
