use std::path::Path;

use anyhow::{bail, Result};
use safeguard_types::state::RunId;

/// Execute the `show` command: print one run with results and logs as JSON.
pub fn execute(db: &Path, run_id: i64) -> Result<()> {
    let store = super::open_store(db)?;
    match store.fetch_run_details(RunId::new(run_id))? {
        Some(details) => super::print_json(&details),
        None => bail!("Run {run_id} not found"),
    }
}
