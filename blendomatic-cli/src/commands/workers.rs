//! Workers command handler

use anyhow::Result;
use blendomatic_core::domain::worker::{WorkerHealth, WorkerStatus};
use blendomatic_store::RunStore;
use clap::Args;
use colored::*;

#[derive(Debug, Clone, Args)]
pub struct WorkersArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_workers_command(args: WorkersArgs, store: &RunStore) -> Result<()> {
    let statuses = store.worker_statuses().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("{}", "No worker heartbeats found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} worker(s):", statuses.len()).bold());
    println!();
    for status in &statuses {
        print_worker(status);
    }

    Ok(())
}

fn print_worker(status: &WorkerStatus) {
    let heartbeat = &status.heartbeat;
    let age = status
        .age_seconds
        .map(|age| format!("{}s ago", age.max(0)))
        .unwrap_or_else(|| "never".to_string());

    println!(
        "  {} {}  {}  {}",
        "▸".cyan(),
        heartbeat.worker_id.bold(),
        colorize_health(status.health),
        age.dimmed()
    );
    println!("    Host:   {}  Status: {}", heartbeat.hostname, heartbeat.status);
    if let Some(job) = &heartbeat.active_job_id {
        println!("    Job:    {}", job.cyan());
    }
    if let Some(mode) = &heartbeat.mode {
        println!("    Mode:   {}", mode);
    }
}

fn colorize_health(health: WorkerHealth) -> ColoredString {
    let label = health.to_string();
    match health {
        WorkerHealth::Healthy => label.green(),
        WorkerHealth::Stale => label.yellow(),
        WorkerHealth::Offline => label.red(),
        WorkerHealth::Unknown => label.dimmed(),
    }
}
