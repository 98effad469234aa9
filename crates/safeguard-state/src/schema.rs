//! Relational schema for runs, results, flags, and logs (`SQLite` dialect).

/// Enables cascading deletes; `SQLite` turns foreign keys off per connection.
pub const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Idempotent DDL.
///
/// `results.flagged` / `results.raw_response` are the legacy columns. They
/// always hold the input stage's values; see `records::ResultRow`.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT,
    dataset_id TEXT NOT NULL,
    dataset_split TEXT NOT NULL,
    model TEXT NOT NULL,
    prompt_limit INTEGER NOT NULL,
    output_path TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    extra_args TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    prompt_text TEXT NOT NULL,
    prompt_metadata TEXT NOT NULL DEFAULT '{}',
    prompt_payload TEXT NOT NULL DEFAULT '{}',

    input_flagged INTEGER NOT NULL DEFAULT 0,
    input_raw_response TEXT NOT NULL DEFAULT '{}',

    answer_text TEXT,
    answer_model TEXT,
    answer_raw_response TEXT,

    output_flagged INTEGER,
    output_raw_response TEXT,

    human_label TEXT,
    human_label_type TEXT,
    human_notes TEXT,
    human_reviewed_at TEXT,

    flagged INTEGER NOT NULL DEFAULT 0,
    raw_response TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS flags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER NOT NULL REFERENCES results(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    score REAL NOT NULL,
    violated INTEGER NOT NULL DEFAULT 0,
    flag_type TEXT NOT NULL DEFAULT 'input'
);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_results_run ON results (run_id);
CREATE INDEX IF NOT EXISTS idx_flags_result ON flags (result_id);
CREATE INDEX IF NOT EXISTS idx_logs_run ON logs (run_id);
";
