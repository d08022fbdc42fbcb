//! Run Reader
//!
//! Listing, detail and status views of runs, plus the narrow set of
//! post-creation changes: pause, worker allowlist and deletion.
//!
//! Reads go to the active backend only; the two backends are never merged.
//! Nothing is cached, so status is as fresh as the last worker write.

use blendomatic_core::domain::job::{JobRecord, PlanItem};
use blendomatic_core::domain::run::{RunMetadata, RunSummary};
use blendomatic_core::status::{overall_status, summarize};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use super::Backends;
use crate::backend::{BlobStore, DeleteReport};
use crate::error::{Result, StoreError};
use crate::repository::state::RunState;
use crate::repository::{run_repository, state_repository};

/// One row of the run overview
#[derive(Debug, Clone, Serialize)]
pub struct RunOverview {
    pub metadata: RunMetadata,
    pub summary: RunSummary,
    pub status: String,
    pub paused: bool,
}

/// Everything known about one run
#[derive(Debug, Clone, Serialize)]
pub struct RunDetail {
    pub metadata: RunMetadata,
    pub plan: Vec<PlanItem>,
    pub jobs: Vec<JobRecord>,
    pub notes: Option<String>,
    pub summary: RunSummary,
    pub status: String,
    pub state: RunState,
}

/// What a deletion removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub local: DeleteReport,
    pub remote: Option<DeleteReport>,
    pub cache_removed: bool,
    pub state_removed: bool,
}

/// Most recent run ids first
///
/// # Arguments
/// * `runs` - Run namespace; only the active backend is listed
/// * `limit` - Maximum number of ids, all when `None`
pub async fn list_runs(runs: &Backends, limit: Option<usize>) -> Result<Vec<String>> {
    let mut ids = run_repository::list_run_ids(runs.active()).await?;
    if let Some(limit) = limit {
        ids.truncate(limit);
    }
    Ok(ids)
}

async fn require_metadata(store: &dyn BlobStore, run_id: &str) -> Result<RunMetadata> {
    run_repository::read_metadata(store, run_id)
        .await?
        .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
}

/// Load one run with its derived status
pub async fn load_detail(runs: &Backends, run_id: &str) -> Result<RunDetail> {
    let store = runs.active();
    let metadata = require_metadata(store, run_id).await?;
    let jobs = run_repository::read_jobs(store, run_id).await?;
    let plan = run_repository::read_plan(store, run_id).await?;
    let notes = run_repository::read_notes(store, run_id).await?;
    let state = state_repository::load(store).await?.entry(run_id);

    let summary = summarize(&jobs);
    let status = overall_status(metadata.status.as_deref(), &summary);

    Ok(RunDetail {
        metadata,
        plan,
        jobs,
        notes,
        summary,
        status,
        state,
    })
}

/// Summaries of the most recent runs
///
/// Runs whose metadata cannot be read are skipped with a warning.
pub async fn overview(runs: &Backends, limit: Option<usize>) -> Result<Vec<RunOverview>> {
    let store = runs.active();
    let state = state_repository::load(store).await?;
    let mut rows = Vec::new();

    for run_id in list_runs(runs, limit).await? {
        let metadata = match run_repository::read_metadata(store, &run_id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                warn!("Run {} has no metadata, skipping", run_id);
                continue;
            }
            Err(e) => {
                warn!("Skipping run {}: {}", run_id, e);
                continue;
            }
        };

        let jobs = run_repository::read_jobs(store, &run_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Jobs of run {} unreadable: {}", run_id, e);
                Vec::new()
            });
        let summary = summarize(&jobs);
        let status = overall_status(metadata.status.as_deref(), &summary);

        rows.push(RunOverview {
            paused: state.is_paused(&run_id),
            metadata,
            summary,
            status,
        });
    }

    Ok(rows)
}

/// Pause or resume a run
///
/// Only the side-state changes; `run.json` is left alone.
pub async fn set_paused(runs: &Backends, run_id: &str, paused: bool) -> Result<RunState> {
    let store = runs.active();
    require_metadata(store, run_id).await?;
    let entry = state_repository::set_paused(store, run_id, paused).await?;
    info!("Run {} {}", run_id, if paused { "paused" } else { "resumed" });
    Ok(entry)
}

/// Restrict a run to the given workers; an empty list lifts the restriction
///
/// The list goes into `run.json` on every backend holding the run and into
/// the side-state. Remote writes are best-effort.
pub async fn set_allowed_workers(
    runs: &Backends,
    run_id: &str,
    workers: &[String],
) -> Result<RunState> {
    let allowed = if workers.is_empty() {
        None
    } else {
        Some(workers.to_vec())
    };

    let active = runs.active();
    require_metadata(active, run_id).await?;

    patch_allowed_workers(runs.local.as_ref(), run_id, allowed.clone()).await?;
    if let Some(remote) = runs.remote.as_deref() {
        if let Err(e) = patch_allowed_workers(remote, run_id, allowed.clone()).await {
            warn!(
                "Allowed workers of run {} not updated in {}: {}",
                run_id,
                remote.describe(),
                e
            );
        }
    }

    let entry = state_repository::set_allowed_workers(active, run_id, allowed).await?;
    info!("Run {} allowed workers: {:?}", run_id, entry.allowed_workers);
    Ok(entry)
}

/// Rewrite `run.json` with a new allowlist; returns false when the run is absent there
async fn patch_allowed_workers(
    store: &dyn BlobStore,
    run_id: &str,
    allowed: Option<Vec<String>>,
) -> Result<bool> {
    let Some(mut metadata) = run_repository::read_metadata(store, run_id).await? else {
        return Ok(false);
    };
    metadata.allowed_workers = allowed;
    run_repository::write_metadata(store, &metadata).await?;
    Ok(true)
}

/// Remove a run from both backends, its cached artifacts and its side-state entry
///
/// Not transactional: a failure on one backend leaves whatever the other
/// already removed deleted. Failures are logged per step.
///
/// # Arguments
/// * `runs` - Run namespace on both backends
/// * `cache_dir` - Derived-artifact cache, one directory per run
/// * `run_id` - Run to remove
pub async fn delete_run(runs: &Backends, cache_dir: &Path, run_id: &str) -> Result<DeletionReport> {
    let mut present = false;
    for store in runs.all() {
        match run_repository::run_exists(store, run_id).await {
            Ok(exists) => present |= exists,
            Err(e) => warn!("Could not check {} for run {}: {}", store.describe(), run_id, e),
        }
    }
    if !present {
        return Err(StoreError::RunNotFound(run_id.to_string()));
    }

    let mut report = DeletionReport {
        local: run_repository::delete_run(runs.local.as_ref(), run_id).await?,
        ..Default::default()
    };

    if let Some(remote) = runs.remote.as_deref() {
        report.remote = match run_repository::delete_run(remote, run_id).await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                warn!("Remote deletion of run {} failed: {}", run_id, e);
                None
            }
        };
    }

    let cached = cache_dir.join(run_id);
    report.cache_removed = match tokio::fs::remove_dir_all(&cached).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove cache {}: {}", cached.display(), e);
            false
        }
    };

    report.state_removed = match state_repository::remove(runs.active(), run_id).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Side-state entry of run {} not removed: {}", run_id, e);
            false
        }
    };

    info!(
        "Run {} deleted ({} local objects, {:?} remote)",
        run_id,
        report.local.deleted,
        report.remote.map(|r| r.deleted)
    );
    Ok(report)
}
