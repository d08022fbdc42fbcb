//! Worker heartbeats
//!
//! Workers publish a heartbeat document on an interval; the monitor turns the
//! namespace into a liveness table.

use blendomatic_core::domain::job::format_timestamp;
use blendomatic_core::domain::worker::{WorkerHeartbeat, WorkerStatus};
use blendomatic_core::heartbeat::{HeartbeatThresholds, classify_all};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::Backends;
use crate::error::Result;
use crate::repository::heartbeat_repository;

/// Worker-side writer of heartbeat documents
#[derive(Debug, Clone)]
pub struct HeartbeatPublisher {
    workers: Backends,
}

impl HeartbeatPublisher {
    pub fn new(workers: Backends) -> Self {
        Self { workers }
    }

    /// Stamp `last_seen` with `now` and write the heartbeat
    ///
    /// The local namespace must accept it; the remote copy is best-effort.
    pub async fn record(&self, mut heartbeat: WorkerHeartbeat, now: DateTime<Utc>) -> Result<()> {
        heartbeat.last_seen = Some(format_timestamp(now));

        heartbeat_repository::record(self.workers.local.as_ref(), &heartbeat).await?;
        if let Some(remote) = self.workers.remote.as_deref() {
            if let Err(e) = heartbeat_repository::record(remote, &heartbeat).await {
                warn!(
                    "Heartbeat of {} not published to {}: {}",
                    heartbeat.worker_id,
                    remote.describe(),
                    e
                );
            }
        }

        debug!("Heartbeat recorded for {}", heartbeat.worker_id);
        Ok(())
    }
}

/// Reader side: classifies every worker in the active heartbeat namespace
#[derive(Debug, Clone)]
pub struct WorkerHeartbeatMonitor {
    workers: Backends,
    thresholds: HeartbeatThresholds,
}

impl WorkerHeartbeatMonitor {
    pub fn new(workers: Backends, thresholds: HeartbeatThresholds) -> Self {
        Self {
            workers,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &HeartbeatThresholds {
        &self.thresholds
    }

    /// Liveness of every worker relative to `now`, ordered by worker id
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<Vec<WorkerStatus>> {
        let heartbeats = heartbeat_repository::read_all(self.workers.active()).await?;
        Ok(classify_all(&heartbeats, now, &self.thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalBlobStore, MemoryObjectClient, ObjectBlobStore};
    use crate::config::ActiveBackend;
    use blendomatic_core::domain::worker::WorkerHealth;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn heartbeat(worker_id: &str) -> WorkerHeartbeat {
        WorkerHeartbeat {
            worker_id: worker_id.to_string(),
            status: "idle".to_string(),
            last_seen: None,
            hostname: "rack1".to_string(),
            mode: None,
            active_job_id: None,
            run_id: None,
        }
    }

    #[tokio::test]
    async fn test_snapshot_classifies_by_age() {
        let dir = TempDir::new().unwrap();
        let workers = Backends::local_only(Arc::new(LocalBlobStore::new(dir.path())));
        let publisher = HeartbeatPublisher::new(workers.clone());
        let monitor = WorkerHeartbeatMonitor::new(workers.clone(), HeartbeatThresholds::default());
        let now = Utc::now();

        publisher.record(heartbeat("d-offline"), now - Duration::seconds(300)).await.unwrap();
        publisher.record(heartbeat("b-stale"), now - Duration::seconds(90)).await.unwrap();
        publisher.record(heartbeat("a-healthy"), now - Duration::seconds(10)).await.unwrap();
        workers
            .local
            .put("c-unknown.json", br#"{"last_seen": "yesterday"}"#.to_vec(), "")
            .await
            .unwrap();

        let statuses = monitor.snapshot(now).await.unwrap();
        let table: Vec<(&str, WorkerHealth)> = statuses
            .iter()
            .map(|s| (s.heartbeat.worker_id.as_str(), s.health))
            .collect();
        assert_eq!(
            table,
            vec![
                ("a-healthy", WorkerHealth::Healthy),
                ("b-stale", WorkerHealth::Stale),
                ("c-unknown", WorkerHealth::Unknown),
                ("d-offline", WorkerHealth::Offline),
            ]
        );
    }

    #[tokio::test]
    async fn test_monitor_reads_remote_when_active() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(MemoryObjectClient::new());
        let workers = Backends {
            local: Arc::new(LocalBlobStore::new(dir.path())),
            remote: Some(Arc::new(ObjectBlobStore::workers(client.clone(), "farm"))),
            active: ActiveBackend::Remote,
        };
        let now = Utc::now();
        HeartbeatPublisher::new(workers.clone())
            .record(heartbeat("gpu-01"), now)
            .await
            .unwrap();

        assert!(client.keys().await.contains(&"farm/workers/gpu-01.json".to_string()));
        let monitor = WorkerHeartbeatMonitor::new(workers, HeartbeatThresholds::default());
        let statuses = monitor.snapshot(now).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].health, WorkerHealth::Healthy);
        assert_eq!(statuses[0].age_seconds, Some(0));
    }
}
