use std::path::Path;

use anyhow::Result;

/// Execute the `runs` command: print recent runs with statistics as JSON.
pub fn execute(db: &Path, limit: u32) -> Result<()> {
    let store = super::open_store(db)?;
    let runs = store.list_runs(limit)?;
    super::print_json(&runs)
}
