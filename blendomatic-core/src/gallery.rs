//! Gallery layer resolution
//!
//! A fabric's gallery preview is a stack of per-asset renders. Untagged
//! renders are base layers and always show; tagged renders fill a category
//! slot (collar style, sleeve length, ...) and show when they match the
//! operator's choice for that slot.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::catalog::{GarmentDefinition, LayerTag};
use crate::domain::job::{JobRecord, JobState};
use crate::status::classify;

/// Draw order of known categories; anything else goes on top
const CATEGORY_PRIORITY: &[&str] = &["base", "sleeves", "placket", "collar"];

/// One candidate image for compositing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryLayer {
    pub label: String,
    #[serde(default)]
    pub image: Option<String>,
    /// `None` for base layers
    #[serde(default)]
    pub tag: Option<LayerTag>,
}

impl GalleryLayer {
    pub fn base(label: &str) -> Self {
        Self {
            label: label.to_string(),
            image: None,
            tag: None,
        }
    }

    pub fn tagged(category: &str, option: &str, label: &str) -> Self {
        Self {
            label: label.to_string(),
            image: None,
            tag: Some(LayerTag {
                category: category.to_string(),
                option: option.to_string(),
            }),
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.tag.as_ref().map(|t| t.category.as_str())
    }
}

/// Sort key of a category in the final stack
pub fn category_priority(category: Option<&str>) -> usize {
    let category = category.unwrap_or("base").to_ascii_lowercase();
    CATEGORY_PRIORITY
        .iter()
        .position(|known| *known == category)
        .unwrap_or(CATEGORY_PRIORITY.len())
}

/// Compute the visible, ordered layer stack
///
/// # Arguments
/// * `candidates` - Every layer available for one fabric, in catalog order
/// * `selection` - Chosen option per category; missing categories show all options
pub fn resolve_layers(
    candidates: &[GalleryLayer],
    selection: &HashMap<String, String>,
) -> Vec<GalleryLayer> {
    let mut visible = vec![false; candidates.len()];
    let mut filled: HashSet<&str> = HashSet::new();

    // Pass 1: base layers, unselected categories, and the first match per selected category
    for (index, layer) in candidates.iter().enumerate() {
        visible[index] = match &layer.tag {
            None => true,
            Some(tag) => match selection.get(&tag.category) {
                None => true,
                Some(chosen) => *chosen == tag.option && filled.insert(tag.category.as_str()),
            },
        };
    }

    // Pass 2: every category that ended up empty falls back to its first candidate
    let mut categories: Vec<&str> = Vec::new();
    for layer in candidates {
        if let Some(category) = layer.category() {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    for category in categories {
        let shown = candidates
            .iter()
            .zip(&visible)
            .any(|(layer, shown)| *shown && layer.category() == Some(category));
        if !shown {
            if let Some(first) = candidates
                .iter()
                .position(|layer| layer.category() == Some(category))
            {
                visible[first] = true;
            }
        }
    }

    let mut resolved: Vec<GalleryLayer> = candidates
        .iter()
        .zip(&visible)
        .filter(|(_, shown)| **shown)
        .map(|(layer, _)| layer.clone())
        .collect();

    if resolved.is_empty() {
        resolved = candidates
            .iter()
            .filter(|layer| layer.tag.is_none())
            .cloned()
            .collect();
    }

    resolved.sort_by(|a, b| {
        category_priority(a.category())
            .cmp(&category_priority(b.category()))
            .then_with(|| a.label.cmp(&b.label))
    });
    resolved
}

/// Candidate layers for one fabric from a run's completed jobs
///
/// The asset's gallery tag (from the garment definition) decides the
/// category; the job result supplies the image. Jobs are taken in sequence
/// order and each asset contributes once.
pub fn gallery_candidates(
    garment: &GarmentDefinition,
    jobs: &[JobRecord],
    fabric: &str,
    view: Option<&str>,
) -> Vec<GalleryLayer> {
    let mut ordered: Vec<&JobRecord> = jobs
        .iter()
        .filter(|job| job.config.garment == garment.id && job.config.fabric == fabric)
        .filter(|job| view.is_none_or(|v| job.config.view == v))
        .filter(|job| classify(&job.status) == JobState::Completed)
        .collect();
    ordered.sort_by_key(|job| job.sequence);

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|job| seen.insert(job.config.asset.clone()))
        .map(|job| GalleryLayer {
            label: job.config.asset.clone(),
            image: result_image(job),
            tag: garment
                .asset(&job.config.asset)
                .and_then(|asset| asset.gallery.clone()),
        })
        .collect()
}

fn result_image(job: &JobRecord) -> Option<String> {
    let result = job.result.as_ref()?;
    ["thumbnail", "uploaded", "output_path"]
        .iter()
        .find_map(|key| result.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Asset, View};
    use crate::domain::job::PlanItem;
    use chrono::Utc;

    fn labels(layers: &[GalleryLayer]) -> Vec<&str> {
        layers.iter().map(|l| l.label.as_str()).collect()
    }

    fn select(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_selected_option_replaces_alternatives() {
        let candidates = vec![
            GalleryLayer::base("Body"),
            GalleryLayer::tagged("collar", "Band", "Band Collar"),
            GalleryLayer::tagged("collar", "Regular", "Regular Collar"),
        ];
        let visible = resolve_layers(&candidates, &select(&[("collar", "Regular")]));
        assert_eq!(labels(&visible), vec!["Body", "Regular Collar"]);
    }

    #[test]
    fn test_unmatched_selection_falls_back_to_first_candidate() {
        let candidates = vec![
            GalleryLayer::tagged("collar", "Band", "Band Collar"),
            GalleryLayer::tagged("collar", "Regular", "Regular Collar"),
            GalleryLayer::base("Body"),
        ];
        let visible = resolve_layers(&candidates, &select(&[("collar", "Mandarin")]));
        assert_eq!(labels(&visible), vec!["Body", "Band Collar"]);
    }

    #[test]
    fn test_unselected_category_shows_every_option() {
        let candidates = vec![
            GalleryLayer::base("Body"),
            GalleryLayer::tagged("sleeves", "Long", "Long Sleeves"),
            GalleryLayer::tagged("sleeves", "Short", "Short Sleeves"),
        ];
        let visible = resolve_layers(&candidates, &HashMap::new());
        assert_eq!(labels(&visible), vec!["Body", "Long Sleeves", "Short Sleeves"]);
    }

    #[test]
    fn test_one_layer_per_selected_category() {
        let candidates = vec![
            GalleryLayer::tagged("collar", "Band", "Band A"),
            GalleryLayer::tagged("collar", "Band", "Band B"),
        ];
        let visible = resolve_layers(&candidates, &select(&[("collar", "Band")]));
        assert_eq!(labels(&visible), vec!["Band A"]);
    }

    #[test]
    fn test_priority_ordering() {
        let candidates = vec![
            GalleryLayer::tagged("pocket", "Patch", "Patch Pocket"),
            GalleryLayer::tagged("collar", "Band", "Band Collar"),
            GalleryLayer::tagged("placket", "Hidden", "Hidden Placket"),
            GalleryLayer::tagged("sleeves", "Long", "Long Sleeves"),
            GalleryLayer::base("Lining"),
            GalleryLayer::base("Body"),
        ];
        let visible = resolve_layers(&candidates, &HashMap::new());
        assert_eq!(
            labels(&visible),
            vec![
                "Body",
                "Lining",
                "Long Sleeves",
                "Hidden Placket",
                "Band Collar",
                "Patch Pocket",
            ]
        );
    }

    #[test]
    fn test_no_candidates_resolves_empty() {
        assert!(resolve_layers(&[], &select(&[("collar", "Band")])).is_empty());
    }

    #[test]
    fn test_candidates_from_completed_jobs() {
        let garment = GarmentDefinition {
            id: "shirt".to_string(),
            name: "Shirt".to_string(),
            output_prefix: None,
            views: vec![View {
                code: "front".to_string(),
                label: "Front".to_string(),
                output_prefix: "F".to_string(),
            }],
            assets: vec![
                Asset {
                    name: "body".to_string(),
                    suffix: None,
                    allowed_views: vec![],
                    gallery: None,
                },
                Asset {
                    name: "band".to_string(),
                    suffix: None,
                    allowed_views: vec![],
                    gallery: Some(LayerTag {
                        category: "collar".to_string(),
                        option: "Band".to_string(),
                    }),
                },
            ],
        };
        let job = |seq: u32, asset: &str, fabric: &str, status: &str| {
            let mut record = JobRecord::new(
                "0001",
                seq,
                PlanItem {
                    mode: "m".to_string(),
                    garment: "shirt".to_string(),
                    fabric: fabric.to_string(),
                    asset: asset.to_string(),
                    view: "front".to_string(),
                    view_output_prefix: "F".to_string(),
                    asset_suffix: asset.to_string(),
                    save_debug_files: false,
                },
                Utc::now(),
            );
            record.status = status.to_string();
            record.result = Some(serde_json::json!({"output_path": format!("/out/{asset}.png")}));
            record
        };
        let jobs = vec![
            job(3, "band", "denim", "completed"),
            job(1, "body", "denim", "done"),
            job(2, "body", "linen", "completed"),
            job(4, "band", "denim", "pending"),
        ];

        let layers = gallery_candidates(&garment, &jobs, "denim", Some("front"));
        assert_eq!(labels(&layers), vec!["body", "band"]);
        assert_eq!(layers[0].tag, None);
        assert_eq!(layers[1].category(), Some("collar"));
        assert_eq!(layers[1].image.as_deref(), Some("/out/band.png"));
    }
}
