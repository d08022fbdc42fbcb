//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod gallery;
mod plan;
mod run;
mod selection;
mod workers;

pub use gallery::GalleryArgs;
pub use run::RunCommands;
pub use selection::SelectionArgs;
pub use workers::WorkersArgs;

use anyhow::Result;
use blendomatic_store::RunStore;
use clap::Subcommand;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a selection and print its plan without creating a run
    Plan(SelectionArgs),
    /// Run management
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Worker liveness
    Workers(WorkersArgs),
    /// Resolve the gallery layers of a run
    Gallery(GalleryArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `store` - The opened run store
pub async fn handle_command(command: Commands, store: &RunStore) -> Result<()> {
    match command {
        Commands::Plan(args) => plan::handle_plan_command(args, store).await,
        Commands::Run { command } => run::handle_run_command(command, store).await,
        Commands::Workers(args) => workers::handle_workers_command(args, store).await,
        Commands::Gallery(args) => gallery::handle_gallery_command(args, store).await,
    }
}

/// Colorize a run or job status for display
pub(crate) fn colorize_status(status: &str) -> colored::ColoredString {
    use blendomatic_core::domain::job::JobState;
    use blendomatic_core::status::{RUN_STATUS_ATTENTION, classify};
    use colored::Colorize;

    if status.eq_ignore_ascii_case(RUN_STATUS_ATTENTION) {
        return status.red().bold();
    }
    match classify(status) {
        JobState::Completed => status.green(),
        JobState::Running => status.cyan(),
        JobState::Failed => status.red(),
        JobState::Cancelled => status.dimmed(),
        JobState::Pending => status.yellow(),
    }
}
