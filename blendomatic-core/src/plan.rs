//! Plan building
//!
//! Expands an operator selection into the ordered list of job configurations
//! a run will execute. Iteration is fabric-major, then asset, then view; that
//! order fixes the job sequence numbers assigned later.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use crate::domain::catalog::{Asset, ConfigCatalog, GarmentDefinition};
use crate::domain::job::PlanItem;
use crate::domain::run::RunSelection;
use crate::error::PlanError;

/// How view codes the garment doesn't declare are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewPolicy {
    /// Drop unknown view codes silently
    #[default]
    Lenient,

    /// Reject the selection
    Strict,
}

impl FromStr for ViewPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ViewPolicy::Lenient),
            "strict" => Ok(ViewPolicy::Strict),
            other => Err(format!(
                "unknown view policy '{other}' (expected lenient or strict)"
            )),
        }
    }
}

/// A garment selection after trimming and deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGarmentSelection {
    pub garment_id: String,
    pub fabrics: Vec<String>,
    pub assets: Vec<String>,
    pub views: Vec<String>,
}

/// A fully validated selection together with its plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRun {
    pub note: String,
    pub mode: String,
    pub save_debug_files: bool,
    pub run_number: Option<u64>,
    pub garments: Vec<ResolvedGarmentSelection>,
    pub plan: Vec<PlanItem>,
}

impl ResolvedRun {
    pub fn garment_ids(&self) -> Vec<String> {
        self.garments.iter().map(|g| g.garment_id.clone()).collect()
    }

    pub fn fabrics(&self) -> Vec<String> {
        self.union(|g| &g.fabrics)
    }

    pub fn assets(&self) -> Vec<String> {
        self.union(|g| &g.assets)
    }

    pub fn views(&self) -> Vec<String> {
        self.union(|g| &g.views)
    }

    fn union<F>(&self, pick: F) -> Vec<String>
    where
        F: Fn(&ResolvedGarmentSelection) -> &Vec<String>,
    {
        self.garments
            .iter()
            .flat_map(|g| pick(g).iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Expands one garment's selection into plan items
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanBuilder {
    policy: ViewPolicy,
}

impl PlanBuilder {
    pub fn new(policy: ViewPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ViewPolicy {
        self.policy
    }

    /// Build the plan for one garment
    ///
    /// # Arguments
    /// * `mode` - Render mode id stamped on every item
    /// * `garment` - The garment definition
    /// * `selection` - Deduplicated, trimmed fabrics/assets/views
    /// * `save_debug_files` - Debug-artifact flag stamped on every item
    pub fn build(
        &self,
        mode: &str,
        garment: &GarmentDefinition,
        selection: &ResolvedGarmentSelection,
        save_debug_files: bool,
    ) -> Result<Vec<PlanItem>, PlanError> {
        if garment.assets.is_empty() {
            return Err(PlanError::GarmentHasNoAssets(garment.id.clone()));
        }

        let views = self.known_views(garment, &selection.views)?;

        require_non_empty(&garment.id, "fabrics", &selection.fabrics)?;
        require_non_empty(&garment.id, "assets", &selection.assets)?;
        require_non_empty(&garment.id, "views", &views)?;

        let assets = selection
            .assets
            .iter()
            .map(|name| {
                garment
                    .asset(name)
                    .ok_or_else(|| PlanError::UnknownAsset {
                        garment: garment.id.clone(),
                        asset: name.clone(),
                    })
            })
            .collect::<Result<Vec<&Asset>, _>>()?;

        let mut items = Vec::new();
        for fabric in &selection.fabrics {
            for asset in &assets {
                let effective = effective_views(asset, &views);
                if effective.is_empty() {
                    return Err(PlanError::AssetNotConfiguredForViews {
                        garment: garment.id.clone(),
                        asset: asset.name.clone(),
                    });
                }

                for view in effective {
                    let view_output_prefix = garment
                        .view(&view)
                        .map(|v| v.output_prefix.clone())
                        .unwrap_or_default();
                    items.push(PlanItem {
                        mode: mode.to_string(),
                        garment: garment.id.clone(),
                        fabric: fabric.clone(),
                        asset: asset.name.clone(),
                        view,
                        view_output_prefix,
                        asset_suffix: asset.effective_suffix(),
                        save_debug_files,
                    });
                }
            }
        }

        Ok(items)
    }

    fn known_views(
        &self,
        garment: &GarmentDefinition,
        requested: &[String],
    ) -> Result<Vec<String>, PlanError> {
        let mut known = Vec::with_capacity(requested.len());
        for code in requested {
            if garment.view(code).is_some() {
                known.push(code.clone());
                continue;
            }
            match self.policy {
                ViewPolicy::Lenient => {}
                ViewPolicy::Strict => {
                    return Err(PlanError::UnknownView {
                        garment: garment.id.clone(),
                        view: code.clone(),
                    });
                }
            }
        }
        Ok(known)
    }
}

/// Views of `requested` this asset may be rendered from, in request order
pub fn effective_views(asset: &Asset, requested: &[String]) -> Vec<String> {
    if asset.allows_all_views() {
        return requested.to_vec();
    }
    requested
        .iter()
        .filter(|code| asset.allowed_views.iter().any(|allowed| allowed == *code))
        .cloned()
        .collect()
}

/// Validate a selection against the catalog and build its plan
///
/// Every check runs here, before a run id exists, so a rejected selection
/// never leaves anything behind.
pub fn resolve_selection(
    catalog: &ConfigCatalog,
    selection: &RunSelection,
    policy: ViewPolicy,
) -> Result<ResolvedRun, PlanError> {
    let note = selection.note.trim();
    if note.is_empty() {
        return Err(PlanError::MissingNote);
    }

    let mode = selection.mode.trim();
    if mode.is_empty() {
        return Err(PlanError::MissingMode);
    }
    if catalog.mode(mode).is_none() {
        return Err(PlanError::UnknownMode(mode.to_string()));
    }

    let run_number = match selection.run_number {
        Some(n) if n <= 0 => return Err(PlanError::InvalidRunNumber(n)),
        Some(n) => Some(n as u64),
        None => None,
    };

    if selection.garments.is_empty() {
        return Err(PlanError::NoGarments);
    }

    let builder = PlanBuilder::new(policy);
    let mut seen = HashSet::new();
    let mut garments = Vec::with_capacity(selection.garments.len());
    let mut plan = Vec::new();

    for requested in &selection.garments {
        let garment_id = requested.garment_id.trim().to_string();
        if !seen.insert(garment_id.clone()) {
            return Err(PlanError::DuplicateGarment(garment_id));
        }

        let garment = catalog
            .garment(&garment_id)
            .ok_or_else(|| PlanError::UnknownGarment(garment_id.clone()))?;

        let fabrics = normalize(&requested.fabrics);
        if let Some(unknown) = fabrics.iter().find(|f| catalog.fabric(f).is_none()) {
            return Err(PlanError::UnknownFabric {
                garment: garment_id,
                fabric: unknown.clone(),
            });
        }

        let resolved = ResolvedGarmentSelection {
            garment_id: garment_id.clone(),
            fabrics,
            assets: normalize(&requested.assets),
            views: normalize(&requested.views),
        };

        plan.extend(builder.build(mode, garment, &resolved, selection.save_debug_files)?);

        // Record only the views that made it past the policy
        let views = resolved
            .views
            .iter()
            .filter(|v| garment.view(v).is_some())
            .cloned()
            .collect();
        garments.push(ResolvedGarmentSelection { views, ..resolved });
    }

    Ok(ResolvedRun {
        note: note.to_string(),
        mode: mode.to_string(),
        save_debug_files: selection.save_debug_files,
        run_number,
        garments,
        plan,
    })
}

/// Trim entries, drop blanks, deduplicate keeping first occurrence
pub fn normalize(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

fn require_non_empty(garment: &str, field: &'static str, values: &[String]) -> Result<(), PlanError> {
    if values.is_empty() {
        return Err(PlanError::EmptySelection {
            garment: garment.to_string(),
            field,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::View;
    use crate::domain::run::GarmentSelection;

    fn view(code: &str) -> View {
        View {
            code: code.to_string(),
            label: code.to_uppercase(),
            output_prefix: format!("{code}_"),
        }
    }

    fn asset(name: &str, allowed: &[&str]) -> Asset {
        Asset {
            name: name.to_string(),
            suffix: None,
            allowed_views: allowed.iter().map(|s| s.to_string()).collect(),
            gallery: None,
        }
    }

    fn shirt() -> GarmentDefinition {
        GarmentDefinition {
            id: "shirt".to_string(),
            name: "Shirt".to_string(),
            output_prefix: None,
            views: vec![view("front"), view("back"), view("side")],
            assets: vec![
                asset("body", &[]),
                asset("collar", &["front", "side"]),
                asset("cuff", &["back"]),
            ],
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> ConfigCatalog {
        let mut catalog = ConfigCatalog::default();
        catalog.insert_garment(shirt());
        catalog.insert_fabric("denim", "Denim");
        catalog.insert_fabric("linen", "Linen");
        catalog.insert_mode("preview", "Preview");
        catalog
    }

    fn selection(fabrics: &[&str], assets: &[&str], views: &[&str]) -> RunSelection {
        RunSelection {
            note: "test run".to_string(),
            mode: "preview".to_string(),
            garments: vec![GarmentSelection {
                garment_id: "shirt".to_string(),
                fabrics: strings(fabrics),
                assets: strings(assets),
                views: strings(views),
            }],
            save_debug_files: false,
            run_number: None,
        }
    }

    #[test]
    fn test_plan_size_matches_effective_views() {
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["denim", "linen"]),
            assets: strings(&["body", "collar", "cuff"]),
            views: strings(&["front", "back"]),
        };
        let plan = PlanBuilder::default()
            .build("preview", &shirt(), &resolved, true)
            .unwrap();

        // body: 2 views, collar: front only, cuff: back only => 4 per fabric
        assert_eq!(plan.len(), 2 * (2 + 1 + 1));
        assert!(plan.iter().all(|item| item.save_debug_files));
    }

    #[test]
    fn test_plan_order_is_fabric_major() {
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["linen", "denim"]),
            assets: strings(&["body", "collar"]),
            views: strings(&["front", "back"]),
        };
        let plan = PlanBuilder::default()
            .build("preview", &shirt(), &resolved, false)
            .unwrap();
        let order: Vec<_> = plan
            .iter()
            .map(|i| format!("{}/{}/{}", i.fabric, i.asset, i.view))
            .collect();

        assert_eq!(
            order,
            vec![
                "linen/body/front",
                "linen/body/back",
                "linen/collar/front",
                "denim/body/front",
                "denim/body/back",
                "denim/collar/front",
            ]
        );
        assert_eq!(plan[0].view_output_prefix, "front_");
        assert_eq!(plan[0].asset_suffix, "body");
    }

    #[test]
    fn test_asset_without_matching_view_is_rejected() {
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["denim"]),
            assets: strings(&["cuff"]),
            views: strings(&["front"]),
        };
        let err = PlanBuilder::default()
            .build("preview", &shirt(), &resolved, false)
            .unwrap_err();
        assert!(matches!(err, PlanError::AssetNotConfiguredForViews { .. }));
        assert!(err.to_string().contains("not configured for the selected views"));
    }

    #[test]
    fn test_unknown_views_follow_policy() {
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["denim"]),
            assets: strings(&["body"]),
            views: strings(&["front", "top"]),
        };

        let lenient = PlanBuilder::new(ViewPolicy::Lenient)
            .build("preview", &shirt(), &resolved, false)
            .unwrap();
        assert_eq!(lenient.len(), 1);

        let strict = PlanBuilder::new(ViewPolicy::Strict).build("preview", &shirt(), &resolved, false);
        assert!(matches!(strict, Err(PlanError::UnknownView { .. })));
    }

    #[test]
    fn test_only_unknown_views_is_an_empty_selection() {
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["denim"]),
            assets: strings(&["body"]),
            views: strings(&["top"]),
        };
        let err = PlanBuilder::default()
            .build("preview", &shirt(), &resolved, false)
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::EmptySelection {
                garment: "shirt".to_string(),
                field: "views"
            }
        );
    }

    #[test]
    fn test_garment_without_assets() {
        let mut garment = shirt();
        garment.assets.clear();
        let resolved = ResolvedGarmentSelection {
            garment_id: "shirt".to_string(),
            fabrics: strings(&["denim"]),
            assets: strings(&["body"]),
            views: strings(&["front"]),
        };
        let err = PlanBuilder::default()
            .build("preview", &garment, &resolved, false)
            .unwrap_err();
        assert_eq!(err, PlanError::GarmentHasNoAssets("shirt".to_string()));
    }

    #[test]
    fn test_resolve_normalizes_lists() {
        let sel = selection(&[" denim", "denim", ""], &["body", "body "], &["front", "front"]);
        let resolved = resolve_selection(&catalog(), &sel, ViewPolicy::Lenient).unwrap();
        assert_eq!(resolved.plan.len(), 1);
        assert_eq!(resolved.fabrics(), vec!["denim"]);
        assert_eq!(resolved.note, "test run");
    }

    #[test]
    fn test_resolve_rejects_bad_selections() {
        let cat = catalog();

        let mut sel = selection(&["denim"], &["body"], &["front"]);
        sel.note = "   ".to_string();
        assert_eq!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::MissingNote)
        );

        let mut sel = selection(&["denim"], &["body"], &["front"]);
        sel.mode.clear();
        assert_eq!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::MissingMode)
        );

        let sel = selection(&["silk"], &["body"], &["front"]);
        assert!(matches!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::UnknownFabric { .. })
        ));

        let sel = selection(&["denim"], &["pocket"], &["front"]);
        assert!(matches!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::UnknownAsset { .. })
        ));

        let mut sel = selection(&["denim"], &["body"], &["front"]);
        sel.garments.push(sel.garments[0].clone());
        assert_eq!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::DuplicateGarment("shirt".to_string()))
        );

        let mut sel = selection(&["denim"], &["body"], &["front"]);
        sel.run_number = Some(0);
        assert_eq!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::InvalidRunNumber(0))
        );

        let mut sel = selection(&["denim"], &["body"], &["front"]);
        sel.garments[0].garment_id = "coat".to_string();
        assert_eq!(
            resolve_selection(&cat, &sel, ViewPolicy::Lenient),
            Err(PlanError::UnknownGarment("coat".to_string()))
        );
    }

    #[test]
    fn test_resolved_views_exclude_dropped_codes() {
        let sel = selection(&["denim"], &["body"], &["front", "top"]);
        let resolved = resolve_selection(&catalog(), &sel, ViewPolicy::Lenient).unwrap();
        assert_eq!(resolved.views(), vec!["front"]);
    }

    #[test]
    fn test_view_policy_from_str() {
        assert_eq!("Strict".parse::<ViewPolicy>(), Ok(ViewPolicy::Strict));
        assert_eq!("lenient".parse::<ViewPolicy>(), Ok(ViewPolicy::Lenient));
        assert!("loose".parse::<ViewPolicy>().is_err());
    }
}
