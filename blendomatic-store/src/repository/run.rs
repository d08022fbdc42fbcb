//! Run Repository
//!
//! The documents of one run directory, plus the run counter and directory
//! listing of the run namespace.

use blendomatic_core::domain::job::{JobRecord, PlanItem};
use blendomatic_core::domain::run::RunMetadata;
use blendomatic_core::run_id::parse_run_number;
use tracing::warn;

use super::{CSV, MARKDOWN, TEXT, read_json, write_json};
use crate::backend::{BlobStore, DeleteReport, join_key};
use crate::error::Result;

pub const COUNTER_KEY: &str = ".counter";
pub const RUN_FILE: &str = "run.json";
pub const PLAN_FILE: &str = "plan.json";
pub const JOBS_FILE: &str = "jobs.json";
pub const NOTES_FILE: &str = "notes.md";
pub const MANIFEST_FILE: &str = "manifest.csv";
pub const CONFIGS_DIR: &str = "configs";

pub const MANIFEST_HEADER: &str = "timestamp,status,garment,fabric,asset,view,output,worker,notes\n";
pub const EMPTY_NOTE: &str = "(no notes provided)";

fn run_key(run_id: &str, file: &str) -> String {
    join_key(&[run_id, file])
}

/// Last number recorded in the counter, `None` when absent or unreadable
pub async fn read_counter(store: &dyn BlobStore) -> Result<Option<u64>> {
    let Some(raw) = store.get(COUNTER_KEY).await? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&raw);
    match text.trim().parse() {
        Ok(n) => Ok(Some(n)),
        Err(_) => {
            warn!("Ignoring malformed run counter in {}: {:?}", store.describe(), text.trim());
            Ok(None)
        }
    }
}

pub async fn write_counter(store: &dyn BlobStore, value: u64) -> Result<()> {
    store
        .put(COUNTER_KEY, format!("{value}\n").into_bytes(), TEXT)
        .await
}

/// Run ids present in the namespace, highest number first
pub async fn list_run_ids(store: &dyn BlobStore) -> Result<Vec<String>> {
    let mut numbered: Vec<(u64, String)> = store
        .list_top_level()
        .await?
        .into_iter()
        .filter_map(|name| parse_run_number(&name).map(|n| (n, name)))
        .collect();
    numbered.sort_by(|a, b| b.cmp(a));
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

/// Highest run number present in the namespace
pub async fn highest_run_number(store: &dyn BlobStore) -> Result<Option<u64>> {
    Ok(store
        .list_top_level()
        .await?
        .iter()
        .filter_map(|name| parse_run_number(name))
        .max())
}

/// Whether anything is stored under the run's directory
pub async fn run_exists(store: &dyn BlobStore, run_id: &str) -> Result<bool> {
    store.exists_prefix(&format!("{run_id}/")).await
}

pub async fn read_metadata(store: &dyn BlobStore, run_id: &str) -> Result<Option<RunMetadata>> {
    read_json(store, &run_key(run_id, RUN_FILE)).await
}

pub async fn write_metadata(store: &dyn BlobStore, metadata: &RunMetadata) -> Result<()> {
    write_json(store, &run_key(&metadata.run_id, RUN_FILE), metadata).await
}

pub async fn read_plan(store: &dyn BlobStore, run_id: &str) -> Result<Vec<PlanItem>> {
    Ok(read_json(store, &run_key(run_id, PLAN_FILE))
        .await?
        .unwrap_or_default())
}

pub async fn write_plan(store: &dyn BlobStore, run_id: &str, plan: &[PlanItem]) -> Result<()> {
    write_json(store, &run_key(run_id, PLAN_FILE), plan).await
}

pub async fn read_jobs(store: &dyn BlobStore, run_id: &str) -> Result<Vec<JobRecord>> {
    Ok(read_json(store, &run_key(run_id, JOBS_FILE))
        .await?
        .unwrap_or_default())
}

pub async fn write_jobs(store: &dyn BlobStore, run_id: &str, jobs: &[JobRecord]) -> Result<()> {
    write_json(store, &run_key(run_id, JOBS_FILE), jobs).await
}

/// The operator note, without the heading `write_notes` adds
pub async fn read_notes(store: &dyn BlobStore, run_id: &str) -> Result<Option<String>> {
    let Some(raw) = store.get(&run_key(run_id, NOTES_FILE)).await? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&raw);
    let heading = format!("# Run {run_id}");
    let body = text
        .trim_start()
        .strip_prefix(heading.as_str())
        .unwrap_or(&text)
        .trim();
    Ok(Some(body.to_string()))
}

pub async fn write_notes(store: &dyn BlobStore, run_id: &str, note: &str) -> Result<()> {
    let note = note.trim();
    let note = if note.is_empty() { EMPTY_NOTE } else { note };
    let body = format!("# Run {run_id}\n\n{note}\n");
    store
        .put(&run_key(run_id, NOTES_FILE), body.into_bytes(), MARKDOWN)
        .await
}

/// Seed the manifest with its header row; workers append the rest
pub async fn write_manifest_header(store: &dyn BlobStore, run_id: &str) -> Result<()> {
    store
        .put(
            &run_key(run_id, MANIFEST_FILE),
            MANIFEST_HEADER.as_bytes().to_vec(),
            CSV,
        )
        .await
}

/// Copy a configuration document into the run's `configs/` directory
///
/// # Arguments
/// * `relative` - Path inside `configs/`, e.g. `garments/shirt.json`
pub async fn write_config_document(
    store: &dyn BlobStore,
    run_id: &str,
    relative: &str,
    raw: &[u8],
) -> Result<()> {
    store
        .put(
            &join_key(&[run_id, CONFIGS_DIR, relative]),
            raw.to_vec(),
            super::JSON,
        )
        .await
}

pub async fn read_config_document(
    store: &dyn BlobStore,
    run_id: &str,
    relative: &str,
) -> Result<Option<Vec<u8>>> {
    store.get(&join_key(&[run_id, CONFIGS_DIR, relative])).await
}

/// Remove every document of a run
pub async fn delete_run(store: &dyn BlobStore, run_id: &str) -> Result<DeleteReport> {
    store.delete_prefix(&format!("{run_id}/")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBlobStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_counter_roundtrip_and_malformed() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert_eq!(read_counter(&store).await.unwrap(), None);
        write_counter(&store, 42).await.unwrap();
        assert_eq!(read_counter(&store).await.unwrap(), Some(42));

        store.put(COUNTER_KEY, b"forty".to_vec(), TEXT).await.unwrap();
        assert_eq!(read_counter(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_run_ids_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for id in ["0002", "0010", "10000", "_cache", "0001"] {
            store
                .put(&format!("{id}/run.json"), b"{}".to_vec(), super::super::JSON)
                .await
                .unwrap();
        }

        assert_eq!(
            list_run_ids(&store).await.unwrap(),
            vec!["10000", "0010", "0002", "0001"]
        );
        assert_eq!(highest_run_number(&store).await.unwrap(), Some(10000));
    }

    #[tokio::test]
    async fn test_notes_placeholder_and_heading() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        write_notes(&store, "0003", "  ").await.unwrap();
        let raw = store.get("0003/notes.md").await.unwrap().unwrap();
        assert_eq!(raw, b"# Run 0003\n\n(no notes provided)\n");

        write_notes(&store, "0003", "Spring lookbook").await.unwrap();
        assert_eq!(
            read_notes(&store, "0003").await.unwrap().as_deref(),
            Some("Spring lookbook")
        );
    }
}
