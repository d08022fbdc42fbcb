//! Run command handlers
//!
//! Creating, listing and inspecting runs, and the post-creation changes the
//! planner is allowed to make.

use anyhow::{Context, Result, bail};
use blendomatic_core::domain::job::{JobRecord, parse_timestamp};
use blendomatic_core::domain::run::RunSummary;
use blendomatic_store::RunStore;
use blendomatic_store::service::reader::RunDetail;
use clap::Subcommand;
use colored::*;

use super::{SelectionArgs, colorize_status};
use crate::id_resolver::resolve_run_id;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Create a run from a selection
    Create(SelectionArgs),
    /// List recent runs
    List {
        /// Number of runs to show
        #[arg(long, short = 'l', default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one run
    Show {
        /// Run id or number
        id: String,

        /// Also list every job
        #[arg(long)]
        jobs: bool,

        #[arg(long)]
        json: bool,
    },
    /// Stop workers from taking jobs of a run
    Pause { id: String },
    /// Let workers take jobs of a paused run again
    Resume { id: String },
    /// Restrict a run to some workers; no workers lifts the restriction
    Allow {
        id: String,
        workers: Vec<String>,
    },
    /// Set a run's priority (lower runs first)
    Priority { id: String, priority: i64 },
    /// Show the order workers pull runs in
    Queue {
        /// Run to put first
        #[arg(long)]
        prefer: Option<String>,
    },
    /// Delete a run from every backend
    Delete {
        id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Handle run commands
///
/// # Arguments
/// * `command` - The run command to execute
/// * `store` - The opened run store
pub async fn handle_run_command(command: RunCommands, store: &RunStore) -> Result<()> {
    match command {
        RunCommands::Create(args) => create_run(store, args).await,
        RunCommands::List { limit, json } => list_runs(store, limit, json).await,
        RunCommands::Show { id, jobs, json } => show_run(store, &id, jobs, json).await,
        RunCommands::Pause { id } => set_paused(store, &id, true).await,
        RunCommands::Resume { id } => set_paused(store, &id, false).await,
        RunCommands::Allow { id, workers } => allow_workers(store, &id, &workers).await,
        RunCommands::Priority { id, priority } => set_priority(store, &id, priority).await,
        RunCommands::Queue { prefer } => show_queue(store, prefer).await,
        RunCommands::Delete { id, yes } => delete_run(store, &id, yes).await,
    }
}

async fn resolve(store: &RunStore, input: &str) -> Result<String> {
    let run_ids = store.list_runs(None).await?;
    resolve_run_id(&run_ids, input)
}

async fn create_run(store: &RunStore, args: SelectionArgs) -> Result<()> {
    let selection = args.load().await?;
    let catalog = store.load_catalog().await;
    let written = store
        .create_run(&catalog, &selection)
        .await
        .context("Run was not created")?;

    println!(
        "{} Run {} created with {} job(s)",
        "✓".green(),
        written.run_id().cyan().bold(),
        written.artifacts.jobs.len()
    );
    if store.runs().remote.is_some() && !written.mirrored {
        println!(
            "{}",
            "⚠ The remote mirror was not updated; the local copy is authoritative".yellow()
        );
    }

    Ok(())
}

async fn list_runs(store: &RunStore, limit: usize, json: bool) -> Result<()> {
    let rows = store.overview(Some(limit)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", "No runs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} run(s):", rows.len()).bold());
    println!();
    for row in rows {
        let paused = if row.paused {
            " paused".magenta().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} Run {}  {}{}",
            "▸".cyan(),
            row.metadata.run_id.cyan(),
            colorize_status(&row.status),
            paused
        );
        println!(
            "    Mode:     {}  Garments: {}",
            row.metadata.mode,
            row.metadata.garments.join(", ")
        );
        println!("    Progress: {}", progress_line(&row.summary));
        if !row.metadata.note.is_empty() {
            println!("    Note:     {}", row.metadata.note.dimmed());
        }
        println!();
    }

    Ok(())
}

async fn show_run(store: &RunStore, input: &str, with_jobs: bool, json: bool) -> Result<()> {
    let run_id = resolve(store, input).await?;
    let detail = store.run_detail(&run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    print_run_details(&detail);

    if with_jobs {
        println!("\n{}", "Jobs:".bold());
        for job in &detail.jobs {
            print_job_line(job);
        }
    }

    Ok(())
}

async fn set_paused(store: &RunStore, input: &str, paused: bool) -> Result<()> {
    let run_id = resolve(store, input).await?;
    if paused {
        store.pause(&run_id).await?;
        println!("{} Run {} paused", "✓".green(), run_id.cyan());
    } else {
        store.resume(&run_id).await?;
        println!("{} Run {} resumed", "✓".green(), run_id.cyan());
    }
    Ok(())
}

async fn allow_workers(store: &RunStore, input: &str, workers: &[String]) -> Result<()> {
    let run_id = resolve(store, input).await?;
    store.set_allowed_workers(&run_id, workers).await?;

    if workers.is_empty() {
        println!("{} Run {} is open to every worker", "✓".green(), run_id.cyan());
    } else {
        println!(
            "{} Run {} limited to {}",
            "✓".green(),
            run_id.cyan(),
            workers.join(", ")
        );
    }
    Ok(())
}

async fn set_priority(store: &RunStore, input: &str, priority: i64) -> Result<()> {
    let run_id = resolve(store, input).await?;
    store.set_priority(&run_id, priority).await?;
    println!("{} Run {} priority set to {}", "✓".green(), run_id.cyan(), priority);
    Ok(())
}

async fn show_queue(store: &RunStore, prefer: Option<String>) -> Result<()> {
    let run_ids = store.list_runs(None).await?;
    let preferred = match prefer {
        Some(input) => Some(resolve_run_id(&run_ids, &input)?),
        None => None,
    };
    let ordered = store.prioritize_runs(&run_ids, preferred.as_deref()).await?;

    if ordered.is_empty() {
        println!("{}", "No runs are available to workers.".yellow());
        return Ok(());
    }

    println!("{}", "Worker pull order:".bold());
    for (position, run_id) in ordered.iter().enumerate() {
        println!("  {:>3}. {}", position + 1, run_id.cyan());
    }
    Ok(())
}

async fn delete_run(store: &RunStore, input: &str, yes: bool) -> Result<()> {
    let run_id = resolve(store, input).await?;
    if !yes {
        bail!("Refusing to delete run {} without --yes", run_id);
    }

    let report = store.delete_run(&run_id).await?;
    println!(
        "{} Run {} deleted ({} local object(s))",
        "✓".green(),
        run_id.cyan(),
        report.local.deleted
    );
    if let Some(remote) = report.remote {
        println!("  Remote: {} object(s) deleted", remote.deleted);
        if remote.failed > 0 {
            println!(
                "{}",
                format!("  ⚠ {} remote object(s) could not be deleted", remote.failed).yellow()
            );
        }
    }
    if report.local.failed > 0 {
        println!(
            "{}",
            format!("  ⚠ {} local file(s) could not be deleted", report.local.failed).yellow()
        );
    }
    Ok(())
}

fn progress_line(summary: &RunSummary) -> String {
    format!(
        "{}% ({}/{} done, {} failed, {} running)",
        summary.progress_percent,
        summary.completed_jobs,
        summary.total_jobs,
        summary.failed_jobs,
        summary.running_jobs
    )
}

/// Print detailed run information
fn print_run_details(detail: &RunDetail) {
    let metadata = &detail.metadata;

    println!("{}", "Run Details:".bold());
    println!("  ID:         {}", metadata.run_id.cyan());
    println!("  Status:     {}", colorize_status(&detail.status));
    if detail.state.paused {
        println!("  Paused:     {}", "yes".magenta());
    }
    println!("  Created:    {} by {} on {}", metadata.created_at, metadata.created_by, metadata.host);
    if let Some(revision) = &metadata.source_revision {
        println!("  Revision:   {}", revision.dimmed());
    }
    println!("  Mode:       {}", metadata.mode);
    println!("  Garments:   {}", metadata.garments.join(", "));
    println!("  Fabrics:    {}", metadata.fabrics.join(", "));
    println!("  Assets:     {}", metadata.assets.join(", "));
    println!("  Views:      {}", metadata.views.join(", "));
    if let Some(workers) = &metadata.allowed_workers {
        println!("  Workers:    {}", workers.join(", "));
    }
    println!("  Progress:   {}", progress_line(&detail.summary));
    if let Some(last) = detail.summary.last_activity {
        println!("  Activity:   {}", last.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(notes) = &detail.notes {
        println!("\n{}", "Notes:".bold());
        println!("  {}", notes);
    }
}

fn print_job_line(job: &JobRecord) {
    let finished = job
        .finished_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    println!(
        "  {:>4}  {:<10} {} / {} / {}  {}  {}",
        job.sequence,
        colorize_status(&job.status),
        job.config.fabric,
        job.config.asset,
        job.config.view,
        job.worker.as_deref().unwrap_or("-").dimmed(),
        finished.dimmed()
    );
}
