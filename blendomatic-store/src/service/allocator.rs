//! Run Id Allocator
//!
//! Reconciles the counters and run directories of both backends into one
//! floor and hands out the number above it.
//!
//! There is no lock: two concurrent allocations can observe the same floor
//! and write the same counter value. Run directories stay distinct only as
//! long as creation is infrequent, which it is (an operator triggers it).

use blendomatic_core::run_id::{
    AllocationCandidates, AllocationError, format_run_id, next_run_number,
};
use tracing::{debug, warn};

use super::Backends;
use crate::backend::BlobStore;
use crate::error::{Result, StoreError};
use crate::repository::run_repository;

/// Read the four places a used run number can show up
///
/// Local failures propagate; the remote backend is best-effort and a failing
/// read simply contributes nothing.
pub async fn gather_candidates(runs: &Backends) -> Result<AllocationCandidates> {
    let local = runs.local.as_ref();
    let mut candidates = AllocationCandidates {
        local_counter: run_repository::read_counter(local).await?,
        local_highest: run_repository::highest_run_number(local).await?,
        ..Default::default()
    };

    if let Some(remote) = runs.remote.as_deref() {
        candidates.remote_counter = best_effort(remote, "counter", run_repository::read_counter(remote).await);
        candidates.remote_highest = best_effort(
            remote,
            "run listing",
            run_repository::highest_run_number(remote).await,
        );
    }

    debug!("Run id candidates: {:?}", candidates);
    Ok(candidates)
}

fn best_effort(store: &dyn BlobStore, what: &str, result: Result<Option<u64>>) -> Option<u64> {
    result.unwrap_or_else(|e| {
        warn!("Could not read {} from {}: {}", what, store.describe(), e);
        None
    })
}

/// Allocate the next run id
///
/// # Arguments
/// * `runs` - Run namespace on both backends
/// * `explicit` - Requested run number; must be above every used number
/// * `width` - Zero-pad width of the formatted id
pub async fn allocate(runs: &Backends, explicit: Option<u64>, width: usize) -> Result<String> {
    let floor = gather_candidates(runs).await?.floor();

    let number = next_run_number(floor, explicit).map_err(|e| match e {
        AllocationError::Taken(requested) => {
            StoreError::RunAlreadyExists(format_run_id(requested, width))
        }
        AllocationError::Exhausted(_) => StoreError::Config(e.to_string()),
    })?;
    let run_id = format_run_id(number, width);

    if explicit.is_some() {
        for store in runs.all() {
            if run_repository::run_exists(store, &run_id).await? {
                return Err(StoreError::RunAlreadyExists(run_id));
            }
        }
    }

    run_repository::write_counter(runs.local.as_ref(), number).await?;
    if let Some(remote) = runs.remote.as_deref() {
        if let Err(e) = run_repository::write_counter(remote, number).await {
            warn!("Could not update run counter in {}: {}", remote.describe(), e);
        }
    }

    debug!("Allocated run {} (floor {})", run_id, floor);
    Ok(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBlobStore, MemoryObjectClient, ObjectBlobStore};
    use crate::config::ActiveBackend;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn backends(dir: &TempDir, client: Arc<MemoryObjectClient>) -> Backends {
        Backends {
            local: Arc::new(LocalBlobStore::new(dir.path())),
            remote: Some(Arc::new(ObjectBlobStore::runs(client, ""))),
            active: ActiveBackend::Local,
        }
    }

    #[tokio::test]
    async fn test_first_allocation_starts_at_one() {
        let dir = TempDir::new().unwrap();
        let runs = Backends::local_only(Arc::new(LocalBlobStore::new(dir.path())));

        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "0001");
        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "0002");
        assert_eq!(
            run_repository::read_counter(runs.local.as_ref()).await.unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_floor_takes_highest_of_both_backends() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(MemoryObjectClient::new());
        let runs = backends(&dir, client.clone());

        run_repository::write_counter(runs.local.as_ref(), 3).await.unwrap();
        let remote = runs.remote.as_deref().unwrap();
        remote
            .put("0017/run.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "0018");
        assert_eq!(run_repository::read_counter(remote).await.unwrap(), Some(18));
    }

    #[tokio::test]
    async fn test_explicit_number_must_exceed_floor() {
        let dir = TempDir::new().unwrap();
        let runs = Backends::local_only(Arc::new(LocalBlobStore::new(dir.path())));
        run_repository::write_counter(runs.local.as_ref(), 5).await.unwrap();

        let err = allocate(&runs, Some(5), 4).await.unwrap_err();
        assert!(matches!(err, StoreError::RunAlreadyExists(ref id) if id == "0005"));
        // A rejected request consumes nothing
        assert_eq!(
            run_repository::read_counter(runs.local.as_ref()).await.unwrap(),
            Some(5)
        );

        assert_eq!(allocate(&runs, Some(40), 4).await.unwrap(), "0040");
        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "0041");
    }

    #[tokio::test]
    async fn test_remote_failures_do_not_block_allocation() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(MemoryObjectClient::new());
        let runs = backends(&dir, client.clone());

        client.fail_writes(true);
        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "0001");
        assert!(client.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_width_grows_past_capacity() {
        let dir = TempDir::new().unwrap();
        let runs = Backends::local_only(Arc::new(LocalBlobStore::new(dir.path())));
        run_repository::write_counter(runs.local.as_ref(), 9999).await.unwrap();
        assert_eq!(allocate(&runs, None, 4).await.unwrap(), "10000");
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_an_error() {
        let dir = TempDir::new().unwrap();
        let runs = Backends::local_only(Arc::new(LocalBlobStore::new(dir.path())));
        run_repository::write_counter(runs.local.as_ref(), u64::MAX).await.unwrap();

        let err = allocate(&runs, None, 4).await.unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert_eq!(
            run_repository::read_counter(runs.local.as_ref()).await.unwrap(),
            Some(u64::MAX)
        );
    }
}
