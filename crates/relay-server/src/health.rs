//! `/health` endpoint.

use std::time::Instant;

use relay_core::RelayStats;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Non-empty groups.
    pub groups: usize,
    /// Areas with at least one registered vendor.
    pub areas: usize,
    /// Vendors registered in an area.
    pub area_entries: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, stats: RelayStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections,
        groups: stats.groups,
        areas: stats.areas,
        area_entries: stats.area_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), RelayStats::default());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, RelayStats::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let stats = RelayStats {
            connections: 3,
            groups: 2,
            areas: 1,
            area_entries: 1,
        };
        let json = serde_json::to_value(health_check(Instant::now(), stats)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 3);
        assert_eq!(json["groups"], 2);
        assert_eq!(json["areas"], 1);
        assert_eq!(json["area_entries"], 1);
        assert!(json["uptime_secs"].is_number());
    }
}
