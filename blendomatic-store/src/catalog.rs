//! Catalog loading
//!
//! Reads the render config (modes), one document per garment and one per
//! fabric. A missing or malformed document only removes that option; it never
//! fails the load.

use blendomatic_core::domain::catalog::{
    CatalogDocument, CatalogEntry, ConfigCatalog, FabricDefinition, GarmentDefinition,
    ModeDefinition,
};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Load the catalog from its three locations
///
/// # Arguments
/// * `render_config` - Document declaring `{"modes": {id: {...}}}`
/// * `garments_dir` - Directory of garment documents, one `*.json` each
/// * `fabrics_dir` - Directory of fabric documents, one `*.json` each
pub async fn load_catalog(
    render_config: &Path,
    garments_dir: &Path,
    fabrics_dir: &Path,
) -> ConfigCatalog {
    let mut catalog = ConfigCatalog::default();

    match fs::read(render_config).await {
        Ok(raw) => match serde_json::from_slice::<Value>(&raw) {
            Ok(doc) => {
                for mode in parse_modes(&doc) {
                    catalog.modes.insert(mode.id.clone(), mode);
                }
                catalog.render_config = Some(CatalogDocument {
                    file_name: "render_config.json".to_string(),
                    raw,
                });
            }
            Err(e) => warn!("Skipping render config {}: {}", render_config.display(), e),
        },
        Err(e) => warn!("Render config {} unavailable: {}", render_config.display(), e),
    }

    for (id, path, raw) in read_documents(garments_dir).await {
        match serde_json::from_slice::<GarmentDefinition>(&raw) {
            Ok(mut garment) => {
                garment.id = id.clone();
                catalog.garments.insert(
                    id.clone(),
                    CatalogEntry {
                        definition: garment,
                        document: CatalogDocument {
                            file_name: format!("{id}.json"),
                            raw,
                        },
                    },
                );
            }
            Err(e) => warn!("Skipping garment document {}: {}", path.display(), e),
        }
    }

    for (id, path, raw) in read_documents(fabrics_dir).await {
        match serde_json::from_slice::<FabricDefinition>(&raw) {
            Ok(mut fabric) => {
                fabric.id = id.clone();
                if fabric.name.trim().is_empty() {
                    fabric.name = id.clone();
                }
                catalog.fabrics.insert(
                    id.clone(),
                    CatalogEntry {
                        definition: fabric,
                        document: CatalogDocument {
                            file_name: format!("{id}.json"),
                            raw,
                        },
                    },
                );
            }
            Err(e) => warn!("Skipping fabric document {}: {}", path.display(), e),
        }
    }

    debug!(
        "Catalog loaded: {} modes, {} garments, {} fabrics",
        catalog.modes.len(),
        catalog.garments.len(),
        catalog.fabrics.len()
    );

    catalog
}

/// Modes declared by a render config document, display name from `label` or `name`
fn parse_modes(doc: &Value) -> Vec<ModeDefinition> {
    let Some(modes) = doc.get("modes").and_then(Value::as_object) else {
        return Vec::new();
    };

    modes
        .iter()
        .map(|(id, body)| {
            let name = ["label", "name"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(id.as_str());
            ModeDefinition {
                id: id.clone(),
                name: name.to_string(),
            }
        })
        .collect()
}

/// Every `*.json` file in `dir` as (file stem, path, bytes), sorted by stem
async fn read_documents(dir: &Path) -> Vec<(String, PathBuf, Vec<u8>)> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() == ErrorKind::NotFound {
                warn!("Catalog directory {} does not exist", dir.display());
            } else {
                warn!("Cannot read catalog directory {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error while listing {}: {}", dir.display(), e);
                break;
            }
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match fs::read(&path).await {
            Ok(raw) => documents.push((stem, path, raw)),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    documents
}
