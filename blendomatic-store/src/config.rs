//! Store configuration
//!
//! Where runs, catalog documents and heartbeats live, which backend serves
//! reads, and the tunables of planning and health classification.

use blendomatic_core::heartbeat::HeartbeatThresholds;
use blendomatic_core::plan::ViewPolicy;
use blendomatic_core::run_id::DEFAULT_RUN_ID_WIDTH;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Backend that serves listing and detail reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveBackend {
    #[default]
    Local,
    Remote,
}

impl FromStr for ActiveBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ActiveBackend::Local),
            "remote" | "s3" | "object" => Ok(ActiveBackend::Remote),
            other => Err(StoreError::Config(format!(
                "unknown backend '{other}' (expected local or remote)"
            ))),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root of the local run tree
    pub runs_dir: PathBuf,

    /// Remote backend URL (`s3://<bucket>[/<prefix>]`, `file://<dir>` or `memory://<bucket>`)
    pub remote_url: Option<String>,

    /// Key prefix inside the remote bucket
    pub remote_prefix: String,

    pub active_backend: ActiveBackend,

    /// Render config document declaring the modes
    pub render_config_path: PathBuf,

    pub garments_dir: PathBuf,

    pub fabrics_dir: PathBuf,

    /// Local heartbeat namespace
    pub workers_dir: PathBuf,

    /// Derived artifacts (gallery composites, worker caches) keyed by run id
    pub cache_dir: PathBuf,

    /// Recorded as `created_by` on new runs
    pub created_by: String,

    /// Recorded as `source_revision`; detected from git when absent
    pub source_revision: Option<String>,

    pub view_policy: ViewPolicy,

    /// Zero-pad width of run ids
    pub run_id_width: usize,

    pub heartbeat: HeartbeatThresholds,
}

impl StoreConfig {
    /// Creates a configuration rooted at `runs_dir` with defaults for everything else
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        let runs_dir = runs_dir.into();
        let parent = runs_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            workers_dir: parent.join("workers"),
            cache_dir: runs_dir.join("_cache"),
            runs_dir,
            remote_url: None,
            remote_prefix: String::new(),
            active_backend: ActiveBackend::Local,
            render_config_path: PathBuf::from("render_config.json"),
            garments_dir: PathBuf::from("garments"),
            fabrics_dir: PathBuf::from("fabrics"),
            created_by: "unknown".to_string(),
            source_revision: None,
            view_policy: ViewPolicy::Lenient,
            run_id_width: DEFAULT_RUN_ID_WIDTH,
            heartbeat: HeartbeatThresholds::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - BLENDOMATIC_RUNS_DIR (default: ./runs)
    /// - BLENDOMATIC_RUN_STORE, BLENDOMATIC_REMOTE_PREFIX
    /// - BLENDOMATIC_ACTIVE_BACKEND (local | remote, default: local)
    /// - BLENDOMATIC_RENDER_CONFIG, BLENDOMATIC_GARMENTS_DIR, BLENDOMATIC_FABRICS_DIR
    /// - BLENDOMATIC_WORKERS_DIR, BLENDOMATIC_CACHE_DIR
    /// - BLENDOMATIC_RUN_USER (falls back to USER / USERNAME)
    /// - BLENDOMATIC_SOURCE_REVISION
    /// - BLENDOMATIC_VIEW_POLICY (lenient | strict)
    /// - BLENDOMATIC_RUN_ID_WIDTH (default: 4)
    /// - BLENDOMATIC_HEARTBEAT_STALE_SECS, BLENDOMATIC_HEARTBEAT_OFFLINE_SECS
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let runs_dir = var("BLENDOMATIC_RUNS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("runs"));
        let mut config = Self::new(runs_dir);

        config.remote_url = var("BLENDOMATIC_RUN_STORE");
        if let Some(prefix) = var("BLENDOMATIC_REMOTE_PREFIX") {
            config.remote_prefix = prefix.trim_matches('/').to_string();
        }
        if let Some(active) = var("BLENDOMATIC_ACTIVE_BACKEND") {
            config.active_backend = active.parse()?;
        }
        if let Some(path) = var("BLENDOMATIC_RENDER_CONFIG") {
            config.render_config_path = PathBuf::from(path);
        }
        if let Some(path) = var("BLENDOMATIC_GARMENTS_DIR") {
            config.garments_dir = PathBuf::from(path);
        }
        if let Some(path) = var("BLENDOMATIC_FABRICS_DIR") {
            config.fabrics_dir = PathBuf::from(path);
        }
        if let Some(path) = var("BLENDOMATIC_WORKERS_DIR") {
            config.workers_dir = PathBuf::from(path);
        }
        if let Some(path) = var("BLENDOMATIC_CACHE_DIR") {
            config.cache_dir = PathBuf::from(path);
        }
        if let Some(user) = var("BLENDOMATIC_RUN_USER")
            .or_else(|| var("USER"))
            .or_else(|| var("USERNAME"))
        {
            config.created_by = user;
        }
        config.source_revision = var("BLENDOMATIC_SOURCE_REVISION");
        if let Some(policy) = var("BLENDOMATIC_VIEW_POLICY") {
            config.view_policy = policy.parse().map_err(StoreError::Config)?;
        }
        if let Some(width) = var("BLENDOMATIC_RUN_ID_WIDTH") {
            config.run_id_width = width.trim().parse().map_err(|_| {
                StoreError::Config(format!("BLENDOMATIC_RUN_ID_WIDTH is not a number: {width}"))
            })?;
        }
        if let Some(secs) = var("BLENDOMATIC_HEARTBEAT_STALE_SECS") {
            config.heartbeat.stale_after = parse_secs("BLENDOMATIC_HEARTBEAT_STALE_SECS", &secs)?;
        }
        if let Some(secs) = var("BLENDOMATIC_HEARTBEAT_OFFLINE_SECS") {
            config.heartbeat.offline_after =
                parse_secs("BLENDOMATIC_HEARTBEAT_OFFLINE_SECS", &secs)?;
        }

        Ok(config)
    }

    /// Use a remote backend
    pub fn with_remote(mut self, url: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self.remote_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.runs_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("runs_dir cannot be empty".to_string()));
        }

        if !(1..=12).contains(&self.run_id_width) {
            return Err(StoreError::Config(format!(
                "run_id_width must be between 1 and 12, got {}",
                self.run_id_width
            )));
        }

        if self.active_backend == ActiveBackend::Remote && self.remote_url.is_none() {
            return Err(StoreError::Config(
                "the remote backend is active but no remote URL is configured".to_string(),
            ));
        }

        if self.heartbeat.stale_after >= self.heartbeat.offline_after {
            return Err(StoreError::Config(
                "heartbeat stale threshold must be below the offline threshold".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a whole number of seconds from a named setting
pub fn parse_secs(name: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|_| StoreError::Config(format!("{name} is not a number of seconds: {raw}")))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("runs")
    }
}

/// Best-effort host name for run metadata
pub fn detect_hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Commit hash of the working directory, when git is available
pub async fn detect_source_revision() -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if revision.is_empty() { None } else { Some(revision) }
}
