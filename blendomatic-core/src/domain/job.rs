//! Job domain types
//!
//! A plan item is one entry of the garment x fabric x asset x view cross
//! product; a job record wraps it with lifecycle bookkeeping once a run id has
//! been assigned.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current job record schema version
pub const JOB_VERSION: u32 = 1;

/// One concrete render configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub mode: String,
    pub garment: String,
    pub fabric: String,
    pub asset: String,
    pub view: String,
    pub view_output_prefix: String,
    pub asset_suffix: String,
    pub save_debug_files: bool,
}

/// Canonical job lifecycle state
///
/// Raw status strings written by workers are mapped onto these through the
/// alias table in [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted job record
///
/// `status` and the timestamps are kept as text: workers in other runtimes
/// write them and historical spellings must survive a read-modify-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub run_id: String,
    pub sequence: u32,
    pub status: String,
    #[serde(default)]
    pub worker: Option<String>,
    pub config: PlanItem,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_version() -> u32 {
    JOB_VERSION
}

impl JobRecord {
    /// Create a pending job record
    ///
    /// The id is `{run_id}-{sequence:04}-{8 hex chars}`; the random tail keeps
    /// ids distinct even if a run id is ever handed out twice.
    pub fn new(run_id: &str, sequence: u32, config: PlanItem, now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let stamp = format_timestamp(now);
        Self {
            job_id: format!("{}-{:04}-{}", run_id, sequence, &suffix[..8]),
            run_id: run_id.to_string(),
            sequence,
            status: JobState::Pending.as_str().to_string(),
            worker: None,
            config,
            created_at: stamp.clone(),
            updated_at: stamp,
            started_at: None,
            finished_at: None,
            result: None,
            version: JOB_VERSION,
            notes: None,
        }
    }

    /// Apply a worker-side status change
    ///
    /// `running` stamps `started_at` the first time; terminal states stamp
    /// `finished_at` and replace the result when one is given.
    pub fn transition(
        &mut self,
        state: JobState,
        worker: Option<&str>,
        result: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) {
        let stamp = format_timestamp(now);
        self.status = state.as_str().to_string();
        self.updated_at = stamp.clone();
        if let Some(worker) = worker {
            self.worker = Some(worker.to_string());
        }

        match state {
            JobState::Running => {
                if self.started_at.is_none() {
                    self.started_at = Some(stamp);
                }
            }
            s if s.is_terminal() => {
                self.finished_at = Some(stamp);
                if result.is_some() {
                    self.result = result;
                }
            }
            _ => {}
        }
    }

    /// Latest of finished/updated/started, ignoring absent or unparseable values
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        [
            self.finished_at.as_deref(),
            Some(self.updated_at.as_str()),
            self.started_at.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(parse_timestamp)
        .max()
    }
}

/// Render a timestamp the way every persisted document stores it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted timestamp
///
/// Accepts RFC 3339 and naive ISO-8601 (treated as UTC). Empty or malformed
/// input yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
