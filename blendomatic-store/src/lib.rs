//! Blendomatic Store
//!
//! Persistence for render runs over two interchangeable backends: a local
//! directory tree and an object store.
//!
//! Architecture:
//! - Backends: a flat key namespace per backend ([`backend::BlobStore`])
//! - Repositories: document-level reads and writes (run files, side-state, heartbeats)
//! - Services: run-id allocation, run writing, reading and mutation, worker health, gallery
//! - [`RunStore`]: wires the configured backends together for callers
//!
//! The local tree is authoritative for writes; the remote backend is mirrored
//! on a best-effort basis. Reads go to whichever backend is configured active.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod repository;
pub mod service;
mod store;

pub use config::{ActiveBackend, StoreConfig};
pub use error::{Result, StoreError};
pub use store::RunStore;
