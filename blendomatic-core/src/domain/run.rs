//! Run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to render for one garment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarmentSelection {
    pub garment_id: String,
    #[serde(default)]
    pub fabrics: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub views: Vec<String>,
}

/// An operator's request to plan a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSelection {
    /// Operator note; required
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub garments: Vec<GarmentSelection>,
    #[serde(default)]
    pub save_debug_files: bool,
    /// Explicit run number instead of the next free one
    #[serde(default)]
    pub run_number: Option<i64>,
}

/// Contents of a run's `run.json`
///
/// Unknown keys (worker-maintained counters and the like) are preserved in
/// `extra` so metadata patches never drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub source_revision: Option<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub mode: String,
    /// Set when the run covers exactly one garment
    #[serde(default)]
    pub garment: Option<String>,
    #[serde(default)]
    pub garments: Vec<String>,
    #[serde(default)]
    pub fabrics: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub total_jobs: usize,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_workers: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Derived progress figures for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub running_jobs: usize,
    pub pending_jobs: usize,
    pub cancelled_jobs: usize,
    pub progress_percent: u8,
    pub last_activity: Option<DateTime<Utc>>,
}
