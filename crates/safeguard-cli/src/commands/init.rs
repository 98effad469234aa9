use std::path::Path;

use anyhow::Result;

/// Execute the `init` command: create the database file and schema.
pub fn execute(db: &Path) -> Result<()> {
    super::open_store(db)?;
    println!("Initialized run database at {}", db.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state/safeguard.db");
        execute(&db).unwrap();
        assert!(db.exists());
        // Re-running on an existing database is fine.
        execute(&db).unwrap();
    }
}
