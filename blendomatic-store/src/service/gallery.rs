//! Gallery service
//!
//! Feeds a run's completed renders into the layer resolver. The garment
//! definition comes from the copy stored with the run, so a later catalog edit
//! does not change how an old run composites; the live catalog is the
//! fallback for runs written without copies.

use blendomatic_core::PlanError;
use blendomatic_core::domain::catalog::{ConfigCatalog, GarmentDefinition};
use blendomatic_core::gallery::{GalleryLayer, gallery_candidates, resolve_layers};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::Backends;
use crate::error::{Result, StoreError};
use crate::repository::run_repository;

/// What to composite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryQuery {
    /// Garment to show; defaults to the run's first garment
    pub garment: Option<String>,
    pub fabric: String,
    /// Restrict to one view
    pub view: Option<String>,
    /// Chosen option per category
    pub selection: HashMap<String, String>,
}

/// A resolved preview stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryView {
    pub run_id: String,
    pub garment: String,
    pub fabric: String,
    pub view: Option<String>,
    pub candidates: Vec<GalleryLayer>,
    pub layers: Vec<GalleryLayer>,
}

#[derive(Debug, Clone)]
pub struct GalleryService {
    runs: Backends,
    catalog: ConfigCatalog,
}

impl GalleryService {
    /// # Arguments
    /// * `runs` - Run namespace; the active backend is read
    /// * `catalog` - Live catalog, used when a run has no garment copy
    pub fn new(runs: Backends, catalog: ConfigCatalog) -> Self {
        Self { runs, catalog }
    }

    /// Resolve the visible layers of one fabric in a run
    pub async fn resolve(&self, run_id: &str, query: &GalleryQuery) -> Result<GalleryView> {
        let store = self.runs.active();
        let metadata = run_repository::read_metadata(store, run_id)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;

        let garment_id = query
            .garment
            .clone()
            .or_else(|| metadata.garment.clone())
            .or_else(|| metadata.garments.first().cloned())
            .ok_or_else(|| StoreError::Config(format!("run {run_id} has no garment")))?;

        let garment = self.garment_definition(run_id, &garment_id).await?;
        let jobs = run_repository::read_jobs(store, run_id).await?;

        let candidates = gallery_candidates(&garment, &jobs, &query.fabric, query.view.as_deref());
        let layers = resolve_layers(&candidates, &query.selection);
        debug!(
            "Gallery for run {} {}/{}: {} of {} layers visible",
            run_id,
            garment_id,
            query.fabric,
            layers.len(),
            candidates.len()
        );

        Ok(GalleryView {
            run_id: run_id.to_string(),
            garment: garment_id,
            fabric: query.fabric.clone(),
            view: query.view.clone(),
            candidates,
            layers,
        })
    }

    /// The run's copy of a garment definition, else the live catalog's
    async fn garment_definition(&self, run_id: &str, garment_id: &str) -> Result<GarmentDefinition> {
        let relative = format!("garments/{garment_id}.json");
        let store = self.runs.active();

        if let Some(raw) = run_repository::read_config_document(store, run_id, &relative).await? {
            match serde_json::from_slice::<GarmentDefinition>(&raw) {
                Ok(mut garment) => {
                    garment.id = garment_id.to_string();
                    return Ok(garment);
                }
                Err(e) => warn!(
                    "Garment copy {} of run {} is unreadable, using the catalog: {}",
                    relative, run_id, e
                ),
            }
        }

        self.catalog
            .garment(garment_id)
            .cloned()
            .ok_or_else(|| PlanError::UnknownGarment(garment_id.to_string()).into())
    }
}
