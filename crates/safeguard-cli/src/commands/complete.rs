use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use safeguard_engine::{RunLogSink, RunTracker};
use safeguard_types::state::{RunId, RunStatus};

fn parse_terminal_status(status: &str) -> Result<RunStatus> {
    let status: RunStatus = status.trim().to_lowercase().parse().map_err(|e| anyhow!("{e}"))?;
    if status == RunStatus::Running {
        bail!("A run can only be completed as 'completed' or 'failed'");
    }
    Ok(status)
}

/// Execute the `complete` command: mark a run finished.
///
/// Events raised while completing are copied into the run's own logs.
pub fn execute(db: &Path, run_id: i64, status: &str, log_sink: &RunLogSink) -> Result<()> {
    let status = parse_terminal_status(status)?;
    let run_id = RunId::new(run_id);
    let tracker = RunTracker::new(super::open_store(db)?);

    if tracker.store().get_run(run_id)?.is_some() {
        log_sink.attach(Arc::clone(tracker.store()), run_id);
    }
    let found = tracker.complete(run_id, status);
    log_sink.detach();

    if !found? {
        bail!("Run {run_id} not found");
    }
    println!("Run {run_id} marked {status}");
    Ok(())
}
