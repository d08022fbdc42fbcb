//! Plan command handler
//!
//! Dry run: validates a selection against the catalog and prints the jobs
//! it would create. Nothing is allocated or written.

use anyhow::Result;
use blendomatic_store::RunStore;
use colored::*;

use super::SelectionArgs;

pub async fn handle_plan_command(args: SelectionArgs, store: &RunStore) -> Result<()> {
    let selection = args.load().await?;
    let catalog = store.load_catalog().await;
    let resolved = store.plan(&catalog, &selection)?;

    println!(
        "{}",
        format!(
            "Plan for mode {}: {} job(s) across {} garment(s)",
            resolved.mode,
            resolved.plan.len(),
            resolved.garments.len()
        )
        .bold()
    );
    println!();

    for (index, item) in resolved.plan.iter().enumerate() {
        println!(
            "  {} {:>4}  {} / {} / {} / {}",
            "▸".cyan(),
            index + 1,
            item.garment,
            item.fabric.cyan(),
            item.asset,
            item.view.dimmed()
        );
    }

    if let Some(number) = resolved.run_number {
        println!();
        println!("{}", format!("Requested run number: {}", number).dimmed());
    }

    Ok(())
}
