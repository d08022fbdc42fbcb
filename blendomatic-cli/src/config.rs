//! Configuration module
//!
//! Store settings accepted as flags. Every flag also reads its environment
//! variable.

use anyhow::{Context, Result};
use blendomatic_store::{ActiveBackend, StoreConfig};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Store location flags shared by every command
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Local run tree
    #[arg(long, global = true, env = "BLENDOMATIC_RUNS_DIR")]
    pub runs_dir: Option<PathBuf>,

    /// Remote run store (s3://<bucket>[/<prefix>], file://<dir> or memory://<bucket>)
    #[arg(long, global = true, env = "BLENDOMATIC_RUN_STORE")]
    pub run_store: Option<String>,

    /// Key prefix inside the remote bucket
    #[arg(long, global = true, env = "BLENDOMATIC_REMOTE_PREFIX")]
    pub remote_prefix: Option<String>,

    /// Backend to read from: local or remote
    #[arg(long, global = true, env = "BLENDOMATIC_ACTIVE_BACKEND")]
    pub backend: Option<String>,

    /// Render config document declaring the modes
    #[arg(long, global = true, env = "BLENDOMATIC_RENDER_CONFIG")]
    pub render_config: Option<PathBuf>,

    #[arg(long, global = true, env = "BLENDOMATIC_GARMENTS_DIR")]
    pub garments_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "BLENDOMATIC_FABRICS_DIR")]
    pub fabrics_dir: Option<PathBuf>,

    /// Local heartbeat directory
    #[arg(long, global = true, env = "BLENDOMATIC_WORKERS_DIR")]
    pub workers_dir: Option<PathBuf>,

    /// Derived-artifact cache, cleared when a run is deleted
    #[arg(long, global = true, env = "BLENDOMATIC_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Recorded as the creator of new runs
    #[arg(long, global = true, env = "BLENDOMATIC_RUN_USER")]
    pub run_user: Option<String>,

    /// Recorded source revision; detected from git when absent
    #[arg(long, global = true, env = "BLENDOMATIC_SOURCE_REVISION")]
    pub source_revision: Option<String>,

    /// Unknown view codes: lenient (drop) or strict (reject)
    #[arg(long, global = true, env = "BLENDOMATIC_VIEW_POLICY")]
    pub view_policy: Option<String>,

    /// Zero-pad width of run ids
    #[arg(long, global = true, env = "BLENDOMATIC_RUN_ID_WIDTH")]
    pub run_id_width: Option<usize>,

    /// Seconds without a heartbeat before a worker is stale
    #[arg(long, global = true, env = "BLENDOMATIC_HEARTBEAT_STALE_SECS")]
    pub heartbeat_stale_secs: Option<u64>,

    /// Seconds without a heartbeat before a worker is offline
    #[arg(long, global = true, env = "BLENDOMATIC_HEARTBEAT_OFFLINE_SECS")]
    pub heartbeat_offline_secs: Option<u64>,
}

impl StoreArgs {
    /// Environment configuration with flags applied on top
    pub fn into_store_config(self) -> Result<StoreConfig> {
        let mut config = StoreConfig::from_env().context("Invalid store environment")?;

        if let Some(runs_dir) = self.runs_dir {
            // Derived locations follow the runs directory unless set explicitly
            let relocated = StoreConfig::new(runs_dir);
            if std::env::var_os("BLENDOMATIC_WORKERS_DIR").is_none() {
                config.workers_dir = relocated.workers_dir;
            }
            if std::env::var_os("BLENDOMATIC_CACHE_DIR").is_none() {
                config.cache_dir = relocated.cache_dir;
            }
            config.runs_dir = relocated.runs_dir;
        }
        if let Some(url) = self.run_store {
            config.remote_url = Some(url);
        }
        if let Some(prefix) = self.remote_prefix {
            config.remote_prefix = prefix.trim_matches('/').to_string();
        }
        if let Some(backend) = self.backend {
            config.active_backend = backend.parse::<ActiveBackend>()?;
        }
        if let Some(path) = self.render_config {
            config.render_config_path = path;
        }
        if let Some(path) = self.garments_dir {
            config.garments_dir = path;
        }
        if let Some(path) = self.fabrics_dir {
            config.fabrics_dir = path;
        }
        if let Some(path) = self.workers_dir {
            config.workers_dir = path;
        }
        if let Some(path) = self.cache_dir {
            config.cache_dir = path;
        }
        if let Some(user) = self.run_user {
            config.created_by = user;
        }
        if let Some(revision) = self.source_revision {
            config.source_revision = Some(revision);
        }
        if let Some(policy) = self.view_policy {
            config.view_policy = policy.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(width) = self.run_id_width {
            config.run_id_width = width;
        }
        if let Some(secs) = self.heartbeat_stale_secs {
            config.heartbeat.stale_after = Duration::from_secs(secs);
        }
        if let Some(secs) = self.heartbeat_offline_secs {
            config.heartbeat.offline_after = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        store: StoreArgs,
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = TestCli::try_parse_from([
            "blendomatic",
            "--runs-dir",
            "/srv/farm/runs",
            "--cache-dir",
            "/tmp/blendomatic-cache",
            "--run-user",
            "ana",
            "--source-revision",
            "abc123",
            "--run-id-width",
            "6",
            "--heartbeat-stale-secs",
            "45",
            "--heartbeat-offline-secs",
            "600",
        ])
        .unwrap();

        let config = cli.store.into_store_config().unwrap();
        assert_eq!(config.runs_dir, PathBuf::from("/srv/farm/runs"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/blendomatic-cache"));
        assert_eq!(config.created_by, "ana");
        assert_eq!(config.source_revision.as_deref(), Some("abc123"));
        assert_eq!(config.run_id_width, 6);
        assert_eq!(config.heartbeat.stale_after, Duration::from_secs(45));
        assert_eq!(config.heartbeat.offline_after, Duration::from_secs(600));
    }

    #[test]
    fn test_numeric_flags_reject_text() {
        assert!(TestCli::try_parse_from(["blendomatic", "--run-id-width", "four"]).is_err());
        assert!(TestCli::try_parse_from(["blendomatic", "--heartbeat-stale-secs", "30s"]).is_err());
    }
}
