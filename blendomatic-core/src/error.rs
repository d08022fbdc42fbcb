//! Error types for run planning

use thiserror::Error;

/// Validation failures raised before any run id is allocated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The operator note is empty
    #[error("a run note is required")]
    MissingNote,

    /// No mode was selected
    #[error("a render mode is required")]
    MissingMode,

    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    /// The selection names no garment at all
    #[error("select at least one garment")]
    NoGarments,

    #[error("garment '{0}' is selected more than once")]
    DuplicateGarment(String),

    #[error("unknown garment '{0}'")]
    UnknownGarment(String),

    #[error("unknown fabric '{fabric}' selected for garment '{garment}'")]
    UnknownFabric { garment: String, fabric: String },

    #[error("unknown asset '{asset}' for garment '{garment}'")]
    UnknownAsset { garment: String, asset: String },

    /// Only raised under the strict view policy
    #[error("unknown view '{view}' for garment '{garment}'")]
    UnknownView { garment: String, view: String },

    /// One of fabrics/assets/views resolved to nothing
    #[error("no {field} selected for garment '{garment}'")]
    EmptySelection {
        garment: String,
        field: &'static str,
    },

    #[error("garment '{0}' declares no assets")]
    GarmentHasNoAssets(String),

    #[error("asset '{asset}' of garment '{garment}' is not configured for the selected views")]
    AssetNotConfiguredForViews { garment: String, asset: String },

    #[error("run number must be a positive integer, got {0}")]
    InvalidRunNumber(i64),
}
