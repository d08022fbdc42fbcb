//! Job status aggregation
//!
//! Workers have written several spellings for the same state over time. Raw
//! strings are folded onto [`JobState`] through a static alias table; anything
//! the table doesn't know counts as pending.

use crate::domain::job::{JobRecord, JobState};
use crate::domain::run::RunSummary;

/// Lower-case raw status -> canonical state
const STATUS_ALIASES: &[(&str, JobState)] = &[
    ("completed", JobState::Completed),
    ("complete", JobState::Completed),
    ("done", JobState::Completed),
    ("success", JobState::Completed),
    ("succeeded", JobState::Completed),
    ("finished", JobState::Completed),
    ("failed", JobState::Failed),
    ("failure", JobState::Failed),
    ("error", JobState::Failed),
    ("errored", JobState::Failed),
    ("running", JobState::Running),
    ("in-progress", JobState::Running),
    ("in_progress", JobState::Running),
    ("inprogress", JobState::Running),
    ("processing", JobState::Running),
    ("rendering", JobState::Running),
    ("started", JobState::Running),
    ("claimed", JobState::Running),
    ("cancelled", JobState::Cancelled),
    ("canceled", JobState::Cancelled),
    ("aborted", JobState::Cancelled),
];

/// Overall run status values produced by inference
pub const RUN_STATUS_ATTENTION: &str = "attention";
pub const RUN_STATUS_RUNNING: &str = "running";
pub const RUN_STATUS_COMPLETED: &str = "completed";
pub const RUN_STATUS_PENDING: &str = "pending";

/// Map a raw status string to its canonical state
pub fn classify(raw: &str) -> JobState {
    let needle = raw.trim().to_ascii_lowercase();
    STATUS_ALIASES
        .iter()
        .find(|(alias, _)| *alias == needle)
        .map(|(_, state)| *state)
        .unwrap_or(JobState::Pending)
}

/// Count jobs per state and derive progress
pub fn summarize(jobs: &[JobRecord]) -> RunSummary {
    let mut summary = RunSummary {
        total_jobs: jobs.len(),
        ..RunSummary::default()
    };

    for job in jobs {
        match classify(&job.status) {
            JobState::Completed => summary.completed_jobs += 1,
            JobState::Failed => summary.failed_jobs += 1,
            JobState::Running => summary.running_jobs += 1,
            JobState::Cancelled => summary.cancelled_jobs += 1,
            JobState::Pending => summary.pending_jobs += 1,
        }
    }

    summary.progress_percent = progress_percent(summary.completed_jobs, summary.total_jobs);
    summary.last_activity = jobs.iter().filter_map(JobRecord::last_activity).max();
    summary
}

/// `floor(100 * completed / total)`, clamped to 0..=100
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (completed.saturating_mul(100)) / total;
    percent.min(100) as u8
}

/// Status to display for a run
///
/// An explicit status in the run metadata wins, except the `pending` seeded
/// at creation. Otherwise: any failure needs attention, then any
/// running job means running, then all-complete means completed, else
/// pending.
pub fn overall_status(explicit: Option<&str>, summary: &RunSummary) -> String {
    match explicit.map(str::trim) {
        Some(status) if !status.is_empty() && !status.eq_ignore_ascii_case(RUN_STATUS_PENDING) => {
            status.to_string()
        }
        _ => infer_run_status(summary).to_string(),
    }
}

pub fn infer_run_status(summary: &RunSummary) -> &'static str {
    if summary.failed_jobs > 0 {
        RUN_STATUS_ATTENTION
    } else if summary.running_jobs > 0 {
        RUN_STATUS_RUNNING
    } else if summary.total_jobs > 0 && summary.completed_jobs == summary.total_jobs {
        RUN_STATUS_COMPLETED
    } else {
        RUN_STATUS_PENDING
    }
}
