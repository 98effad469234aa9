pub mod check;
pub mod complete;
pub mod init;
pub mod review;
pub mod runs;
pub mod show;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use safeguard_state::{ModerationStore, SqliteModerationStore};

/// Open (creating if needed) the run database at `db`.
pub(crate) fn open_store(db: &Path) -> Result<Arc<dyn ModerationStore>> {
    let store = SqliteModerationStore::open(db)
        .with_context(|| format!("Failed to open run database: {}", db.display()))?;
    Ok(Arc::new(store))
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
