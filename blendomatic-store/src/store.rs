//! Run store facade
//!
//! Opens the configured backends once and exposes every run operation over
//! them.

use blendomatic_core::domain::catalog::ConfigCatalog;
use blendomatic_core::domain::run::RunSelection;
use blendomatic_core::domain::worker::WorkerStatus;
use blendomatic_core::plan::{ResolvedRun, resolve_selection};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{BlobStore, LocalBlobStore, ObjectBlobStore, RemoteUrl, join_key};
use crate::catalog::load_catalog;
use crate::config::{StoreConfig, detect_hostname, detect_source_revision};
use crate::error::Result;
use crate::repository::state::RunState;
use crate::repository::state_repository;
use crate::service::gallery::{GalleryQuery, GalleryService, GalleryView};
use crate::service::heartbeat::{HeartbeatPublisher, WorkerHeartbeatMonitor};
use crate::service::reader::{DeletionReport, RunDetail, RunOverview};
use crate::service::writer::{Provenance, WrittenRun};
use crate::service::{Backends, allocator_service, reader_service, writer_service};

/// Configured access to runs and heartbeats
#[derive(Debug, Clone)]
pub struct RunStore {
    config: StoreConfig,
    runs: Backends,
    workers: Backends,
}

impl RunStore {
    /// Validate the configuration and open its backends
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let (remote_runs, remote_workers) = match &config.remote_url {
            Some(url) => {
                let remote = RemoteUrl::parse(url)?;
                let prefix = join_key(&[remote.key_prefix(), config.remote_prefix.as_str()]);
                let client = remote.connect();
                info!("Remote run store: {} (prefix '{}')", client.describe(), prefix);
                (
                    Some(Arc::new(ObjectBlobStore::runs(client.clone(), &prefix))
                        as Arc<dyn BlobStore>),
                    Some(Arc::new(ObjectBlobStore::workers(client, &prefix))
                        as Arc<dyn BlobStore>),
                )
            }
            None => (None, None),
        };

        let runs = Backends {
            local: Arc::new(LocalBlobStore::new(&config.runs_dir)),
            remote: remote_runs,
            active: config.active_backend,
        };
        let workers = Backends {
            local: Arc::new(LocalBlobStore::new(&config.workers_dir)),
            remote: remote_workers,
            active: config.active_backend,
        };

        debug!("Run store opened: {:?}", runs);
        Ok(Self::with_backends(config, runs, workers))
    }

    /// Use backends built by the caller
    pub fn with_backends(config: StoreConfig, runs: Backends, workers: Backends) -> Self {
        Self {
            config,
            runs,
            workers,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn runs(&self) -> &Backends {
        &self.runs
    }

    pub fn workers(&self) -> &Backends {
        &self.workers
    }

    /// Load the catalog from the configured locations
    pub async fn load_catalog(&self) -> ConfigCatalog {
        load_catalog(
            &self.config.render_config_path,
            &self.config.garments_dir,
            &self.config.fabrics_dir,
        )
        .await
    }

    /// Validate a selection and expand its plan without allocating anything
    pub fn plan(&self, catalog: &ConfigCatalog, selection: &RunSelection) -> Result<ResolvedRun> {
        Ok(resolve_selection(catalog, selection, self.config.view_policy)?)
    }

    /// Who is creating runs from this process
    pub async fn provenance(&self) -> Provenance {
        let source_revision = match &self.config.source_revision {
            Some(revision) => Some(revision.clone()),
            None => detect_source_revision().await,
        };
        Provenance {
            created_by: self.config.created_by.clone(),
            host: detect_hostname(),
            source_revision,
        }
    }

    /// Validate, allocate an id and write a new run
    ///
    /// Validation runs first, so a rejected selection allocates nothing.
    pub async fn create_run(
        &self,
        catalog: &ConfigCatalog,
        selection: &RunSelection,
    ) -> Result<WrittenRun> {
        let resolved = self.plan(catalog, selection)?;
        let run_id = allocator_service::allocate(
            &self.runs,
            resolved.run_number,
            self.config.run_id_width,
        )
        .await?;

        let provenance = self.provenance().await;
        let artifacts = writer_service::prepare(catalog, &resolved, &run_id, &provenance, Utc::now());
        writer_service::write_run(&self.runs, artifacts).await
    }

    pub async fn list_runs(&self, limit: Option<usize>) -> Result<Vec<String>> {
        reader_service::list_runs(&self.runs, limit).await
    }

    pub async fn overview(&self, limit: Option<usize>) -> Result<Vec<RunOverview>> {
        reader_service::overview(&self.runs, limit).await
    }

    pub async fn run_detail(&self, run_id: &str) -> Result<RunDetail> {
        reader_service::load_detail(&self.runs, run_id).await
    }

    pub async fn pause(&self, run_id: &str) -> Result<RunState> {
        reader_service::set_paused(&self.runs, run_id, true).await
    }

    pub async fn resume(&self, run_id: &str) -> Result<RunState> {
        reader_service::set_paused(&self.runs, run_id, false).await
    }

    pub async fn set_allowed_workers(&self, run_id: &str, workers: &[String]) -> Result<RunState> {
        reader_service::set_allowed_workers(&self.runs, run_id, workers).await
    }

    pub async fn set_priority(&self, run_id: &str, priority: i64) -> Result<RunState> {
        state_repository::set_priority(self.runs.active(), run_id, priority).await
    }

    /// Order runs the way a worker should pull from them
    pub async fn prioritize_runs(
        &self,
        run_ids: &[String],
        preferred: Option<&str>,
    ) -> Result<Vec<String>> {
        state_repository::prioritize_runs(self.runs.active(), run_ids, preferred).await
    }

    pub async fn delete_run(&self, run_id: &str) -> Result<DeletionReport> {
        reader_service::delete_run(&self.runs, &self.config.cache_dir, run_id).await
    }

    pub fn heartbeat_publisher(&self) -> HeartbeatPublisher {
        HeartbeatPublisher::new(self.workers.clone())
    }

    pub fn heartbeat_monitor(&self) -> WorkerHeartbeatMonitor {
        WorkerHeartbeatMonitor::new(self.workers.clone(), self.config.heartbeat)
    }

    /// Liveness of every worker right now
    pub async fn worker_statuses(&self) -> Result<Vec<WorkerStatus>> {
        self.heartbeat_monitor().snapshot(Utc::now()).await
    }

    pub async fn gallery(
        &self,
        catalog: ConfigCatalog,
        run_id: &str,
        query: &GalleryQuery,
    ) -> Result<GalleryView> {
        GalleryService::new(self.runs.clone(), catalog)
            .resolve(run_id, query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::repository::run_repository;
    use blendomatic_core::PlanError;
    use blendomatic_core::domain::job::JobState;
    use blendomatic_core::domain::run::GarmentSelection;
    use tempfile::TempDir;
    use tokio::fs;

    async fn fixture(root: &std::path::Path) {
        fs::create_dir_all(root.join("garments")).await.unwrap();
        fs::create_dir_all(root.join("fabrics")).await.unwrap();
        fs::write(
            root.join("render_config.json"),
            r#"{"modes": {"preview": {"label": "Preview"}}}"#,
        )
        .await
        .unwrap();
        fs::write(
            root.join("garments/shirt.json"),
            r#"{"name": "Shirt",
                "views": [{"code": "front", "label": "Front", "output_prefix": "F"},
                          {"code": "back", "label": "Back", "output_prefix": "B"}],
                "assets": [{"name": "Body"}, {"name": "Pocket", "allowed_views": ["front"]}]}"#,
        )
        .await
        .unwrap();
        fs::write(root.join("fabrics/denim.json"), r#"{"name": "Denim"}"#)
            .await
            .unwrap();
    }

    fn config(root: &std::path::Path) -> StoreConfig {
        let mut config = StoreConfig::new(root.join("runs")).with_remote("memory://test", "farm");
        config.render_config_path = root.join("render_config.json");
        config.garments_dir = root.join("garments");
        config.fabrics_dir = root.join("fabrics");
        config.created_by = "ana".to_string();
        config.source_revision = Some("abc123".to_string());
        config
    }

    fn selection(run_number: Option<i64>) -> RunSelection {
        RunSelection {
            note: "Spring drop".to_string(),
            mode: "preview".to_string(),
            garments: vec![GarmentSelection {
                garment_id: "shirt".to_string(),
                fabrics: vec!["denim".to_string()],
                assets: vec!["Body".to_string(), "Pocket".to_string()],
                views: vec!["front".to_string(), "back".to_string()],
            }],
            save_debug_files: false,
            run_number,
        }
    }

    #[tokio::test]
    async fn test_create_run_end_to_end() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path()).await;
        let store = RunStore::open(config(dir.path())).unwrap();
        let catalog = store.load_catalog().await;

        let written = store.create_run(&catalog, &selection(None)).await.unwrap();
        assert_eq!(written.run_id(), "0001");
        assert!(written.mirrored);
        // Body: 2 views, Pocket: front only
        assert_eq!(written.artifacts.jobs.len(), 3);
        assert_eq!(written.artifacts.metadata.source_revision.as_deref(), Some("abc123"));

        let copies = dir.path().join("runs/0001/configs");
        assert!(copies.join("render_config.json").exists());
        assert!(copies.join("garments/shirt.json").exists());
        assert!(copies.join("fabrics/denim.json").exists());

        let detail = store.run_detail("0001").await.unwrap();
        assert_eq!(detail.summary.total_jobs, 3);
        assert_eq!(detail.metadata.created_by, "ana");
    }

    #[tokio::test]
    async fn test_created_run_status_follows_worker_progress() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path()).await;
        let views: Vec<String> = (0..10)
            .map(|i| format!(r#"{{"code": "v{i}", "label": "V{i}", "output_prefix": "V{i}"}}"#))
            .collect();
        fs::write(
            dir.path().join("garments/tee.json"),
            format!(r#"{{"name": "Tee", "views": [{}], "assets": [{{"name": "Body"}}]}}"#, views.join(",")),
        )
        .await
        .unwrap();
        let store = RunStore::open(config(dir.path())).unwrap();
        let catalog = store.load_catalog().await;

        let mut tee = selection(None);
        tee.garments = vec![GarmentSelection {
            garment_id: "tee".to_string(),
            fabrics: vec!["denim".to_string()],
            assets: vec!["Body".to_string()],
            views: (0..10).map(|i| format!("v{i}")).collect(),
        }];
        let written = store.create_run(&catalog, &tee).await.unwrap();
        assert_eq!(written.artifacts.metadata.status.as_deref(), Some("pending"));

        let fresh = store.run_detail("0001").await.unwrap();
        assert_eq!(fresh.summary.total_jobs, 10);
        assert_eq!(fresh.status, "pending");

        let local = store.runs().local.as_ref();
        let mut jobs = run_repository::read_jobs(local, "0001").await.unwrap();
        let now = Utc::now();
        for (i, job) in jobs.iter_mut().enumerate() {
            let state = match i {
                0..5 => JobState::Completed,
                5..7 => JobState::Failed,
                7 => JobState::Running,
                _ => continue,
            };
            job.transition(state, Some("w1"), None, now);
        }
        run_repository::write_jobs(local, "0001", &jobs).await.unwrap();

        let detail = store.run_detail("0001").await.unwrap();
        assert_eq!(detail.summary.progress_percent, 50);
        assert_eq!(detail.summary.pending_jobs, 2);
        assert_eq!(detail.status, "attention");
    }

    #[tokio::test]
    async fn test_explicit_run_number_then_default_follows() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path()).await;
        let store = RunStore::open(config(dir.path())).unwrap();
        let catalog = store.load_catalog().await;

        store.create_run(&catalog, &selection(None)).await.unwrap();
        let explicit = store.create_run(&catalog, &selection(Some(25))).await.unwrap();
        assert_eq!(explicit.run_id(), "0025");
        let next = store.create_run(&catalog, &selection(None)).await.unwrap();
        assert_eq!(next.run_id(), "0026");

        let err = store.create_run(&catalog, &selection(Some(10))).await.unwrap_err();
        assert!(matches!(err, StoreError::RunAlreadyExists(_)));
        assert_eq!(store.list_runs(None).await.unwrap(), vec!["0026", "0025", "0001"]);
    }

    #[tokio::test]
    async fn test_validation_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path()).await;
        let store = RunStore::open(config(dir.path())).unwrap();
        let catalog = store.load_catalog().await;

        let mut bad = selection(None);
        bad.note = "  ".to_string();
        let err = store.create_run(&catalog, &bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Plan(PlanError::MissingNote)));
        assert!(!dir.path().join("runs").exists());
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path()).await;
        let store = RunStore::open(config(dir.path())).unwrap();
        let catalog = store.load_catalog().await;

        store.create_run(&catalog, &selection(None)).await.unwrap();
        store.pause("0001").await.unwrap();
        let report = store.delete_run("0001").await.unwrap();
        assert!(report.local.deleted > 0);
        assert!(report.state_removed);
        assert!(store.run_detail("0001").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let mut config = StoreConfig::default();
        config.remote_url = Some("ftp://bucket".to_string());
        assert!(matches!(RunStore::open(config), Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_s3_store_joins_prefixes() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("runs")).with_remote("s3://renders/farm", "studio");
        let store = RunStore::open(config).unwrap();

        let runs = store.runs().remote.as_deref().unwrap();
        assert_eq!(runs.describe(), "s3://renders/farm/studio/runs");
        let workers = store.workers().remote.as_deref().unwrap();
        assert_eq!(workers.describe(), "s3://renders/farm/studio/workers");
    }
}
