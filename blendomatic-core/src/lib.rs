//! Blendomatic Core
//!
//! Core types and pure logic for planning and tracking render runs.
//!
//! This crate contains:
//! - Domain types: catalog definitions, selections, plan items, job records, run metadata
//! - Plan building: expansion of a selection into ordered job configurations
//! - Status aggregation, heartbeat classification and gallery layer resolution
//!
//! Nothing in here touches the filesystem or the network; persistence lives in
//! `blendomatic-store`.

pub mod domain;
pub mod error;
pub mod gallery;
pub mod heartbeat;
pub mod plan;
pub mod run_id;
pub mod status;

pub use error::PlanError;
