//! Selection flags
//!
//! A run selection comes either from flags (one garment) or from a JSON
//! selection file (any number of garments). Flags given alongside a file
//! override its note, mode, debug flag and run number.

use anyhow::{Context, Result, bail};
use blendomatic_core::domain::run::{GarmentSelection, RunSelection};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Args)]
pub struct SelectionArgs {
    /// JSON selection file for multi-garment runs
    #[arg(long, conflicts_with = "garment")]
    pub selection: Option<PathBuf>,

    /// Garment id
    #[arg(long, short = 'g')]
    pub garment: Option<String>,

    /// Fabric ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pub fabrics: Vec<String>,

    /// Asset names, comma separated
    #[arg(long, value_delimiter = ',')]
    pub assets: Vec<String>,

    /// View codes, comma separated
    #[arg(long, value_delimiter = ',')]
    pub views: Vec<String>,

    /// Render mode
    #[arg(long, short = 'm')]
    pub mode: Option<String>,

    /// Operator note
    #[arg(long, short = 'n')]
    pub note: Option<String>,

    /// Keep debug artifacts
    #[arg(long)]
    pub save_debug_files: bool,

    /// Explicit run number instead of the next free one
    #[arg(long)]
    pub run_number: Option<i64>,
}

impl SelectionArgs {
    /// Build the selection these flags describe
    pub async fn load(self) -> Result<RunSelection> {
        let mut selection = match &self.selection {
            Some(path) => {
                let raw = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read selection file {}", path.display()))?;
                serde_json::from_slice::<RunSelection>(&raw)
                    .with_context(|| format!("Invalid selection file {}", path.display()))?
            }
            None => {
                let Some(garment_id) = self.garment.clone() else {
                    bail!("Pass --garment with --fabrics/--assets/--views, or --selection <file>");
                };
                RunSelection {
                    garments: vec![GarmentSelection {
                        garment_id,
                        fabrics: self.fabrics.clone(),
                        assets: self.assets.clone(),
                        views: self.views.clone(),
                    }],
                    ..Default::default()
                }
            }
        };

        if let Some(note) = self.note {
            selection.note = note;
        }
        if let Some(mode) = self.mode {
            selection.mode = mode;
        }
        if self.save_debug_files {
            selection.save_debug_files = true;
        }
        if self.run_number.is_some() {
            selection.run_number = self.run_number;
        }

        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_flags_build_single_garment_selection() {
        let args = SelectionArgs {
            garment: Some("shirt".to_string()),
            fabrics: vec!["denim".to_string()],
            views: vec!["front".to_string(), "back".to_string()],
            mode: Some("preview".to_string()),
            note: Some("test".to_string()),
            ..Default::default()
        };
        let selection = args.load().await.unwrap();
        assert_eq!(selection.garments.len(), 1);
        assert_eq!(selection.garments[0].views, vec!["front", "back"]);
        assert_eq!(selection.mode, "preview");
    }

    #[tokio::test]
    async fn test_file_with_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(
            &path,
            r#"{"note": "from file", "mode": "preview",
                "garments": [{"garment_id": "shirt"}, {"garment_id": "pants", "fabrics": ["denim"]}]}"#,
        )
        .unwrap();

        let args = SelectionArgs {
            selection: Some(path),
            note: Some("from flag".to_string()),
            run_number: Some(12),
            ..Default::default()
        };
        let selection = args.load().await.unwrap();
        assert_eq!(selection.garments.len(), 2);
        assert_eq!(selection.note, "from flag");
        assert_eq!(selection.run_number, Some(12));
    }

    #[tokio::test]
    async fn test_requires_garment_or_file() {
        assert!(SelectionArgs::default().load().await.is_err());
    }
}
