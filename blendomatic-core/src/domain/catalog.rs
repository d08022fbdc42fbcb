//! Catalog definitions
//!
//! Garments, fabrics and render modes as declared in the configuration
//! documents. Documents are loaded by the store; this module only holds the
//! parsed shapes plus the raw bytes needed to snapshot them into a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One camera view a garment can be rendered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub output_prefix: String,
}

/// Gallery slot an asset's render fills when composited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTag {
    pub category: String,
    pub option: String,
}

/// A renderable asset (garment variant) of a garment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,

    /// Output filename suffix; derived from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    /// View codes this asset may be rendered from. Empty means every view.
    #[serde(default)]
    pub allowed_views: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<LayerTag>,
}

impl Asset {
    /// Suffix used in output filenames
    pub fn effective_suffix(&self) -> String {
        match &self.suffix {
            Some(suffix) if !suffix.trim().is_empty() => suffix.trim().to_string(),
            _ => self.name.trim().to_lowercase().replace(' ', "_"),
        }
    }

    /// Whether this asset declares no view restriction
    pub fn allows_all_views(&self) -> bool {
        self.allowed_views.is_empty()
    }
}

/// A garment with its views and assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarmentDefinition {
    /// Catalog id, taken from the document's file stem
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl GarmentDefinition {
    pub fn view(&self, code: &str) -> Option<&View> {
        self.views.iter().find(|v| v.code == code)
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDefinition {
    pub id: String,
    pub name: String,
}

/// A configuration document as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDocument {
    /// File name the document is stored under inside a run's `configs/`
    pub file_name: String,
    pub raw: Vec<u8>,
}

/// A parsed definition together with the document it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry<T> {
    pub definition: T,
    pub document: CatalogDocument,
}

/// Every garment, fabric and mode a run can be planned from
#[derive(Debug, Clone, Default)]
pub struct ConfigCatalog {
    pub modes: BTreeMap<String, ModeDefinition>,
    /// The render config document that declares the modes
    pub render_config: Option<CatalogDocument>,
    pub garments: BTreeMap<String, CatalogEntry<GarmentDefinition>>,
    pub fabrics: BTreeMap<String, CatalogEntry<FabricDefinition>>,
}

impl ConfigCatalog {
    pub fn garment(&self, id: &str) -> Option<&GarmentDefinition> {
        self.garments.get(id).map(|entry| &entry.definition)
    }

    pub fn fabric(&self, id: &str) -> Option<&FabricDefinition> {
        self.fabrics.get(id).map(|entry| &entry.definition)
    }

    pub fn mode(&self, id: &str) -> Option<&ModeDefinition> {
        self.modes.get(id)
    }

    /// Insert a garment definition built in code, serializing it as its document
    pub fn insert_garment(&mut self, garment: GarmentDefinition) {
        let raw = serde_json::to_vec_pretty(&garment).unwrap_or_default();
        let document = CatalogDocument {
            file_name: format!("{}.json", garment.id),
            raw,
        };
        self.garments.insert(
            garment.id.clone(),
            CatalogEntry {
                definition: garment,
                document,
            },
        );
    }

    /// Insert a fabric definition built in code
    pub fn insert_fabric(&mut self, id: &str, name: &str) {
        let fabric = FabricDefinition {
            id: id.to_string(),
            name: name.to_string(),
        };
        let raw = serde_json::to_vec_pretty(&fabric).unwrap_or_default();
        self.fabrics.insert(
            id.to_string(),
            CatalogEntry {
                definition: fabric,
                document: CatalogDocument {
                    file_name: format!("{id}.json"),
                    raw,
                },
            },
        );
    }

    pub fn insert_mode(&mut self, id: &str, name: &str) {
        self.modes.insert(
            id.to_string(),
            ModeDefinition {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_suffix_falls_back_to_name() {
        let asset = Asset {
            name: "Band Collar".to_string(),
            suffix: None,
            allowed_views: vec![],
            gallery: None,
        };
        assert_eq!(asset.effective_suffix(), "band_collar");

        let asset = Asset {
            suffix: Some("bc".to_string()),
            ..asset
        };
        assert_eq!(asset.effective_suffix(), "bc");
    }

    #[test]
    fn test_garment_document_parses() {
        let doc = r#"{
            "name": "Oxford Shirt",
            "views": [{"code": "front", "label": "Front", "output_prefix": "F"}],
            "assets": [{"name": "body", "allowed_views": ["front"],
                        "gallery": {"category": "collar", "option": "Band"}}]
        }"#;
        let garment: GarmentDefinition = serde_json::from_str(doc).unwrap();
        assert_eq!(garment.display_name(), "Oxford Shirt");
        assert_eq!(garment.view("front").unwrap().output_prefix, "F");
        let asset = garment.asset("body").unwrap();
        assert_eq!(asset.gallery.as_ref().unwrap().category, "collar");
        assert!(!asset.allows_all_views());
    }
}
