//! Service Module
//!
//! Run-level operations. Services combine repositories over the local and
//! remote backends and hold the rules about which backend is authoritative
//! for what.

pub mod allocator;
pub mod gallery;
pub mod heartbeat;
pub mod reader;
pub mod writer;

// Re-export for convenience
pub use allocator as allocator_service;
pub use gallery as gallery_service;
pub use heartbeat as heartbeat_service;
pub use reader as reader_service;
pub use writer as writer_service;

use std::sync::Arc;

use crate::backend::BlobStore;
use crate::config::ActiveBackend;

/// One namespace (runs or heartbeats) on both backends
#[derive(Clone)]
pub struct Backends {
    pub local: Arc<dyn BlobStore>,
    pub remote: Option<Arc<dyn BlobStore>>,
    pub active: ActiveBackend,
}

impl Backends {
    pub fn local_only(local: Arc<dyn BlobStore>) -> Self {
        Self {
            local,
            remote: None,
            active: ActiveBackend::Local,
        }
    }

    /// The backend reads are served from
    ///
    /// Falls back to local when the remote one is active but not configured.
    pub fn active(&self) -> &dyn BlobStore {
        match (self.active, &self.remote) {
            (ActiveBackend::Remote, Some(remote)) => remote.as_ref(),
            _ => self.local.as_ref(),
        }
    }

    /// Every configured backend, local first
    pub fn all(&self) -> impl Iterator<Item = &dyn BlobStore> {
        std::iter::once(self.local.as_ref()).chain(self.remote.as_deref())
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("local", &self.local.describe())
            .field("remote", &self.remote.as_ref().map(|r| r.describe()))
            .field("active", &self.active)
            .finish()
    }
}
