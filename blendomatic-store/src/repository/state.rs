//! Side-State Repository
//!
//! `state.json` holds per-run flags the planner may change after creation
//! (pause, allowed workers, priority). Workers read it to decide which run to
//! pull from next. It lives beside the runs, never inside `run.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use super::write_json;
use crate::backend::BlobStore;
use crate::error::Result;

pub const STATE_KEY: &str = "state.json";
pub const DEFAULT_PRIORITY: i64 = 100;

/// One run's entry in the side-state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub paused: bool,

    /// Workers allowed to take jobs from this run; `None` means any worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_workers: Option<Vec<String>>,

    /// Lower runs first; falls back to the document default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// Tie-break inside a priority, before the run number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,

    /// Fields written by other tools
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunState {
    /// Whether `worker` may take jobs from this run
    pub fn allows(&self, worker: &str) -> bool {
        match &self.allowed_workers {
            Some(list) if !list.is_empty() => list.iter().any(|w| w == worker),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefaults {
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// The whole side-state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideState {
    #[serde(default)]
    pub runs: BTreeMap<String, RunState>,
    #[serde(default)]
    pub default: StateDefaults,
}

impl SideState {
    pub fn entry(&self, run_id: &str) -> RunState {
        self.runs.get(run_id).cloned().unwrap_or_default()
    }

    pub fn is_paused(&self, run_id: &str) -> bool {
        self.runs.get(run_id).is_some_and(|s| s.paused)
    }

    fn priority_of(&self, run_id: &str) -> i64 {
        self.runs
            .get(run_id)
            .and_then(|s| s.priority)
            .unwrap_or(self.default.priority)
    }

    /// Order runs for a worker to pull from
    ///
    /// Paused runs are dropped. The rest sort by (priority, sequence, run
    /// number); non-numeric ids go last. A `preferred` run present in `run_ids`
    /// is moved to the front, even when paused.
    pub fn prioritize(&self, run_ids: &[String], preferred: Option<&str>) -> Vec<String> {
        let number = |id: &str| id.parse::<i64>().unwrap_or(i64::MAX);

        let mut ordered: Vec<&String> = run_ids.iter().filter(|id| !self.is_paused(id)).collect();
        ordered.sort_by_key(|id| {
            let n = number(id.as_str());
            let sequence = self.runs.get(id.as_str()).and_then(|s| s.sequence).unwrap_or(n);
            (self.priority_of(id), sequence, n)
        });

        let mut result: Vec<String> = Vec::with_capacity(ordered.len() + 1);
        if let Some(preferred) = preferred.filter(|p| run_ids.iter().any(|id| id == *p)) {
            result.push(preferred.to_string());
            result.extend(ordered.into_iter().filter(|id| *id != preferred).cloned());
        } else {
            result.extend(ordered.into_iter().cloned());
        }
        result
    }
}

/// Load the side-state; missing or corrupt documents read as the default
pub async fn load(store: &dyn BlobStore) -> Result<SideState> {
    let Some(raw) = store.get(STATE_KEY).await? else {
        return Ok(SideState::default());
    };
    match serde_json::from_slice(&raw) {
        Ok(state) => Ok(state),
        Err(e) => {
            warn!("Ignoring corrupt side-state in {}: {}", store.describe(), e);
            Ok(SideState::default())
        }
    }
}

pub async fn save(store: &dyn BlobStore, state: &SideState) -> Result<()> {
    write_json(store, STATE_KEY, state).await
}

/// Apply `change` to one run's entry and persist, returning the new entry
pub async fn update<F>(store: &dyn BlobStore, run_id: &str, change: F) -> Result<RunState>
where
    F: FnOnce(&mut RunState) + Send,
{
    let mut state = load(store).await?;
    let entry = state.runs.entry(run_id.to_string()).or_default();
    change(entry);
    let updated = entry.clone();
    save(store, &state).await?;
    Ok(updated)
}

pub async fn set_paused(store: &dyn BlobStore, run_id: &str, paused: bool) -> Result<RunState> {
    update(store, run_id, |entry| entry.paused = paused).await
}

pub async fn set_allowed_workers(
    store: &dyn BlobStore,
    run_id: &str,
    workers: Option<Vec<String>>,
) -> Result<RunState> {
    update(store, run_id, |entry| entry.allowed_workers = workers).await
}

pub async fn set_priority(store: &dyn BlobStore, run_id: &str, priority: i64) -> Result<RunState> {
    update(store, run_id, |entry| entry.priority = Some(priority)).await
}

/// Drop a run's entry; returns whether one existed
pub async fn remove(store: &dyn BlobStore, run_id: &str) -> Result<bool> {
    let mut state = load(store).await?;
    if state.runs.remove(run_id).is_none() {
        return Ok(false);
    }
    save(store, &state).await?;
    Ok(true)
}

/// Load the side-state and order `run_ids` for a worker
pub async fn prioritize_runs(
    store: &dyn BlobStore,
    run_ids: &[String],
    preferred: Option<&str>,
) -> Result<Vec<String>> {
    Ok(load(store).await?.prioritize(run_ids, preferred))
}
