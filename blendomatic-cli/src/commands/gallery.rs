//! Gallery command handler
//!
//! Prints the layer stack a preview composite would be built from.

use anyhow::{Result, anyhow};
use blendomatic_store::RunStore;
use blendomatic_store::service::gallery::GalleryQuery;
use clap::Args;
use colored::*;
use std::collections::HashMap;

use crate::id_resolver::resolve_run_id;

#[derive(Debug, Clone, Args)]
pub struct GalleryArgs {
    /// Run id or number
    pub run: String,

    /// Fabric to show
    #[arg(long, short = 'f')]
    pub fabric: String,

    /// Garment to show; defaults to the run's first garment
    #[arg(long, short = 'g')]
    pub garment: Option<String>,

    /// Restrict to one view
    #[arg(long)]
    pub view: Option<String>,

    /// Category choice as category=option; repeatable
    #[arg(long = "select", short = 's', value_parser = parse_choice)]
    pub choices: Vec<(String, String)>,

    #[arg(long)]
    pub json: bool,
}

fn parse_choice(raw: &str) -> Result<(String, String)> {
    let (category, option) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected category=option, got '{}'", raw))?;
    Ok((category.trim().to_string(), option.trim().to_string()))
}

pub async fn handle_gallery_command(args: GalleryArgs, store: &RunStore) -> Result<()> {
    let run_ids = store.list_runs(None).await?;
    let run_id = resolve_run_id(&run_ids, &args.run)?;

    let query = GalleryQuery {
        garment: args.garment,
        fabric: args.fabric,
        view: args.view,
        selection: args.choices.into_iter().collect::<HashMap<_, _>>(),
    };
    let catalog = store.load_catalog().await;
    let gallery = store.gallery(catalog, &run_id, &query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&gallery)?);
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "Gallery for run {} · {} · {}",
            gallery.run_id, gallery.garment, gallery.fabric
        )
        .bold()
    );
    if gallery.layers.is_empty() {
        println!("{}", "No completed renders to show.".yellow());
        return Ok(());
    }

    for layer in &gallery.layers {
        let slot = match &layer.tag {
            Some(tag) => format!("{}={}", tag.category, tag.option),
            None => "base".to_string(),
        };
        println!(
            "  {} {:<24} {:<20} {}",
            "▸".cyan(),
            layer.label,
            slot.dimmed(),
            layer.image.as_deref().unwrap_or("(no image)").dimmed()
        );
    }
    println!(
        "{}",
        format!("{} of {} candidate layer(s) visible", gallery.layers.len(), gallery.candidates.len())
            .dimmed()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            parse_choice("collar = Regular").unwrap(),
            ("collar".to_string(), "Regular".to_string())
        );
        assert!(parse_choice("collar").is_err());
    }
}
