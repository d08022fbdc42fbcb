//! Worker liveness classification

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::job::parse_timestamp;
use crate::domain::worker::{WorkerHealth, WorkerHeartbeat, WorkerStatus};

/// Age boundaries between healthy, stale and offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatThresholds {
    /// Heartbeats at least this old are stale
    pub stale_after: Duration,

    /// Heartbeats at least this old are offline
    pub offline_after: Duration,
}

impl Default for HeartbeatThresholds {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            offline_after: Duration::from_secs(120),
        }
    }
}

impl HeartbeatThresholds {
    /// Classify a heartbeat age in seconds
    pub fn classify_age(&self, age_seconds: i64) -> WorkerHealth {
        // Clock skew can put last_seen slightly in the future
        let age = age_seconds.max(0) as u64;
        if age < self.stale_after.as_secs() {
            WorkerHealth::Healthy
        } else if age < self.offline_after.as_secs() {
            WorkerHealth::Stale
        } else {
            WorkerHealth::Offline
        }
    }
}

/// Classify one heartbeat relative to `now`
pub fn classify(
    heartbeat: &WorkerHeartbeat,
    now: DateTime<Utc>,
    thresholds: &HeartbeatThresholds,
) -> WorkerStatus {
    let age_seconds = heartbeat
        .last_seen
        .as_deref()
        .and_then(parse_timestamp)
        .map(|seen| (now - seen).num_seconds());

    let health = match age_seconds {
        Some(age) => thresholds.classify_age(age),
        None => WorkerHealth::Unknown,
    };

    WorkerStatus {
        heartbeat: heartbeat.clone(),
        health,
        age_seconds,
    }
}

/// Classify every heartbeat, ordered by worker id
pub fn classify_all(
    heartbeats: &[WorkerHeartbeat],
    now: DateTime<Utc>,
    thresholds: &HeartbeatThresholds,
) -> Vec<WorkerStatus> {
    let mut statuses: Vec<_> = heartbeats
        .iter()
        .map(|hb| classify(hb, now, thresholds))
        .collect();
    statuses.sort_by(|a, b| a.heartbeat.worker_id.cmp(&b.heartbeat.worker_id));
    statuses
}
