//! Worker heartbeat types

use serde::{Deserialize, Serialize};

/// The liveness record a worker publishes periodically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    #[serde(default)]
    pub worker_id: String,
    #[serde(default = "unknown")]
    pub status: String,
    /// When the worker last reported; text so malformed values can be surfaced
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default = "unknown")]
    pub hostname: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub active_job_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Liveness classification derived from heartbeat age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerHealth {
    /// Reported recently
    Healthy,

    /// Missed a few beats
    Stale,

    /// Hasn't reported for a long time
    Offline,

    /// `last_seen` missing or unparseable
    Unknown,
}

impl std::fmt::Display for WorkerHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerHealth::Healthy => write!(f, "healthy"),
            WorkerHealth::Stale => write!(f, "stale"),
            WorkerHealth::Offline => write!(f, "offline"),
            WorkerHealth::Unknown => write!(f, "unknown"),
        }
    }
}

/// A heartbeat with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub heartbeat: WorkerHeartbeat,
    pub health: WorkerHealth,
    /// Seconds since `last_seen`, when it could be parsed
    pub age_seconds: Option<i64>,
}
