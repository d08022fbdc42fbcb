//! Core domain types
//!
//! These types describe the catalog a run is planned from, the documents a run
//! persists, and the records external workers publish. They are shared between
//! the store (which persists them) and any worker embedding this crate (which
//! updates them).

pub mod catalog;
pub mod job;
pub mod run;
pub mod worker;
