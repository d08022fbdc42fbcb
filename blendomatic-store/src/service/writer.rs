//! Run Writer
//!
//! Materializes a validated, id-bearing run: metadata, plan, job records,
//! notes, the manifest header and copies of the catalog documents it was
//! planned from. The local tree must accept every write; the remote backend
//! receives an identical mirror on a best-effort basis.

use blendomatic_core::domain::catalog::ConfigCatalog;
use blendomatic_core::domain::job::{JobRecord, PlanItem, format_timestamp};
use blendomatic_core::domain::run::RunMetadata;
use blendomatic_core::plan::ResolvedRun;
use blendomatic_core::status::RUN_STATUS_PENDING;
use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::{info, warn};

use super::Backends;
use crate::backend::BlobStore;
use crate::error::Result;
use crate::repository::run_repository;

/// Who and what created a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub created_by: String,
    pub host: String,
    pub source_revision: Option<String>,
}

/// Everything written for one run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub metadata: RunMetadata,
    pub plan: Vec<PlanItem>,
    pub jobs: Vec<JobRecord>,
    pub note: String,
    /// `(path inside configs/, raw bytes)`
    pub configs: Vec<(String, Vec<u8>)>,
}

/// Result of [`write_run`]
#[derive(Debug, Clone)]
pub struct WrittenRun {
    pub artifacts: RunArtifacts,
    /// Whether the remote mirror received every artifact
    pub mirrored: bool,
}

impl WrittenRun {
    pub fn run_id(&self) -> &str {
        &self.artifacts.metadata.run_id
    }
}

/// Metadata for a freshly created run
pub fn build_metadata(
    run_id: &str,
    resolved: &ResolvedRun,
    provenance: &Provenance,
    now: DateTime<Utc>,
) -> RunMetadata {
    let garments = resolved.garment_ids();
    RunMetadata {
        run_id: run_id.to_string(),
        created_at: format_timestamp(now),
        created_by: provenance.created_by.clone(),
        host: provenance.host.clone(),
        source_revision: provenance.source_revision.clone(),
        note: resolved.note.clone(),
        mode: resolved.mode.clone(),
        garment: match garments.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        },
        garments,
        fabrics: resolved.fabrics(),
        assets: resolved.assets(),
        views: resolved.views(),
        total_jobs: resolved.plan.len(),
        status: Some(RUN_STATUS_PENDING.to_string()),
        allowed_workers: None,
        extra: Map::new(),
    }
}

/// Pending job records with contiguous sequence numbers starting at 1
pub fn build_jobs(run_id: &str, plan: &[PlanItem], now: DateTime<Utc>) -> Vec<JobRecord> {
    plan.iter()
        .zip(1u32..)
        .map(|(item, sequence)| JobRecord::new(run_id, sequence, item.clone(), now))
        .collect()
}

/// The catalog documents a run was planned from, keyed by their `configs/` path
pub fn config_documents(catalog: &ConfigCatalog, resolved: &ResolvedRun) -> Vec<(String, Vec<u8>)> {
    let mut documents = Vec::new();

    if let Some(render_config) = &catalog.render_config {
        documents.push((render_config.file_name.clone(), render_config.raw.clone()));
    }
    for garment_id in resolved.garment_ids() {
        if let Some(entry) = catalog.garments.get(&garment_id) {
            documents.push((
                format!("garments/{}", entry.document.file_name),
                entry.document.raw.clone(),
            ));
        }
    }
    for fabric_id in resolved.fabrics() {
        if let Some(entry) = catalog.fabrics.get(&fabric_id) {
            documents.push((
                format!("fabrics/{}", entry.document.file_name),
                entry.document.raw.clone(),
            ));
        }
    }

    documents
}

/// Assemble every artifact of a run without writing anything
pub fn prepare(
    catalog: &ConfigCatalog,
    resolved: &ResolvedRun,
    run_id: &str,
    provenance: &Provenance,
    now: DateTime<Utc>,
) -> RunArtifacts {
    RunArtifacts {
        metadata: build_metadata(run_id, resolved, provenance, now),
        plan: resolved.plan.clone(),
        jobs: build_jobs(run_id, &resolved.plan, now),
        note: resolved.note.clone(),
        configs: config_documents(catalog, resolved),
    }
}

/// Write one run's artifacts to a single backend
pub async fn write_artifacts(store: &dyn BlobStore, artifacts: &RunArtifacts) -> Result<()> {
    let run_id = artifacts.metadata.run_id.as_str();

    run_repository::write_metadata(store, &artifacts.metadata).await?;
    run_repository::write_plan(store, run_id, &artifacts.plan).await?;
    run_repository::write_jobs(store, run_id, &artifacts.jobs).await?;
    run_repository::write_notes(store, run_id, &artifacts.note).await?;
    run_repository::write_manifest_header(store, run_id).await?;
    for (relative, raw) in &artifacts.configs {
        run_repository::write_config_document(store, run_id, relative, raw).await?;
    }

    Ok(())
}

/// Write a run locally and mirror it remotely
///
/// # Arguments
/// * `runs` - Run namespace on both backends
/// * `artifacts` - Output of [`prepare`]
///
/// A mirror failure is logged and reported through [`WrittenRun::mirrored`];
/// the run still counts as created.
pub async fn write_run(runs: &Backends, artifacts: RunArtifacts) -> Result<WrittenRun> {
    write_artifacts(runs.local.as_ref(), &artifacts).await?;

    let mirrored = match runs.remote.as_deref() {
        Some(remote) => match write_artifacts(remote, &artifacts).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Run {} was not mirrored to {}: {}",
                    artifacts.metadata.run_id,
                    remote.describe(),
                    e
                );
                false
            }
        },
        None => false,
    };

    info!(
        "Run {} created with {} jobs",
        artifacts.metadata.run_id,
        artifacts.jobs.len()
    );

    Ok(WrittenRun {
        artifacts,
        mirrored,
    })
}
