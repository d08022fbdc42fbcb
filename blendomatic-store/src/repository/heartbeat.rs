//! Heartbeat Repository
//!
//! One `{worker_id}.json` document per worker in a flat namespace.

use blendomatic_core::domain::worker::WorkerHeartbeat;
use tracing::warn;

use super::write_json;
use crate::backend::BlobStore;
use crate::error::Result;

fn heartbeat_key(worker_id: &str) -> String {
    format!("{worker_id}.json")
}

/// Write (or replace) a worker's heartbeat
pub async fn record(store: &dyn BlobStore, heartbeat: &WorkerHeartbeat) -> Result<()> {
    write_json(store, &heartbeat_key(&heartbeat.worker_id), heartbeat).await
}

/// Every readable heartbeat in the namespace
///
/// Documents that cannot be read or decoded are skipped with a warning. A
/// document without a worker id takes the key's file stem.
pub async fn read_all(store: &dyn BlobStore) -> Result<Vec<WorkerHeartbeat>> {
    let keys = store.list_all("").await?;
    let mut heartbeats = Vec::with_capacity(keys.len());

    for key in keys {
        // Flat namespace: nested keys belong to something else
        let Some(stem) = key.strip_suffix(".json").filter(|s| !s.contains('/')) else {
            continue;
        };

        let raw = match store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping heartbeat {}: {}", key, e);
                continue;
            }
        };

        match serde_json::from_slice::<WorkerHeartbeat>(&raw) {
            Ok(mut heartbeat) => {
                if heartbeat.worker_id.trim().is_empty() {
                    heartbeat.worker_id = stem.to_string();
                }
                heartbeats.push(heartbeat);
            }
            Err(e) => warn!("Skipping malformed heartbeat {}: {}", key, e),
        }
    }

    Ok(heartbeats)
}

pub async fn remove(store: &dyn BlobStore, worker_id: &str) -> Result<()> {
    store.delete_batch(&[heartbeat_key(worker_id)]).await
}
