//! `SQLite`-backed implementation of [`ModerationStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. No tracing event is
//! emitted while the lock is held, so a log layer that writes back into this
//! store cannot deadlock on it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use safeguard_types::state::{
    FlagType, HumanReview, NewRun, ResultId, RunId, RunRecord, RunStatus,
};
use safeguard_types::view::{LogView, ResultView, RunStats, RunView};
use safeguard_types::StageResult;
use serde_json::{Map, Value};

use crate::backend::ModerationStore;
use crate::error::{self, StateError};
use crate::records::ResultRow;
use crate::schema::{CONNECTION_PRAGMAS, CREATE_TABLES};
use crate::serialize::{serialize_result, StoredFlag, StoredResult};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const RUN_COLUMNS: &str = "id, created_at, completed_at, dataset_id, dataset_split, model, \
                           prompt_limit, output_path, status, extra_args";

const RESULT_COLUMNS: &str = "id, prompt_text, prompt_metadata, prompt_payload, \
     input_flagged, input_raw_response, answer_text, answer_model, answer_raw_response, \
     output_flagged, output_raw_response, human_label, human_label_type, human_notes, \
     human_reviewed_at, flagged, raw_response";

const INSERT_RESULT: &str = "INSERT INTO results \
     (run_id, prompt_text, prompt_metadata, prompt_payload, \
      input_flagged, input_raw_response, \
      answer_text, answer_model, answer_raw_response, \
      output_flagged, output_raw_response, \
      flagged, raw_response) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const INSERT_FLAG: &str = "INSERT INTO flags (result_id, category, score, violated, flag_type) \
                           VALUES (?1, ?2, ?3, ?4, ?5)";

/// `SQLite`-backed moderation storage.
///
/// Create with [`SqliteModerationStore::open`] for file-backed persistence
/// or [`SqliteModerationStore::in_memory`] for tests.
pub struct SqliteModerationStore {
    conn: Mutex<Connection>,
}

/// Raw `runs` columns before JSON/enum decoding.
struct RunRow {
    id: i64,
    created_at: String,
    completed_at: Option<String>,
    dataset_id: String,
    dataset_split: String,
    model: String,
    prompt_limit: u32,
    output_path: Option<String>,
    status: String,
    extra_args: String,
}

impl RunRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            completed_at: row.get(2)?,
            dataset_id: row.get(3)?,
            dataset_split: row.get(4)?,
            model: row.get(5)?,
            prompt_limit: row.get(6)?,
            output_path: row.get(7)?,
            status: row.get(8)?,
            extra_args: row.get(9)?,
        })
    }

    fn decode(self) -> error::Result<RunRecord> {
        let status = self
            .status
            .parse::<RunStatus>()
            .map_err(|message| StateError::InvalidColumn {
                column: "runs.status",
                message,
            })?;
        let extra_args: Map<String, Value> = serde_json::from_str(&self.extra_args)?;
        Ok(RunRecord {
            id: RunId::new(self.id),
            created_at: SqliteModerationStore::sqlite_to_iso8601(&self.created_at),
            completed_at: self
                .completed_at
                .as_deref()
                .map(SqliteModerationStore::sqlite_to_iso8601),
            dataset_id: self.dataset_id,
            dataset_split: self.dataset_split,
            model: self.model,
            prompt_limit: self.prompt_limit,
            output_path: self.output_path,
            status,
            extra_args,
        })
    }
}

/// Raw `results` columns before JSON decoding.
struct ResultRowRaw {
    id: i64,
    prompt_text: String,
    prompt_metadata: Option<String>,
    prompt_payload: Option<String>,
    input_flagged: Option<bool>,
    input_raw_response: Option<String>,
    answer_text: Option<String>,
    answer_model: Option<String>,
    answer_raw_response: Option<String>,
    output_flagged: Option<bool>,
    output_raw_response: Option<String>,
    human_label: Option<String>,
    human_label_type: Option<String>,
    human_notes: Option<String>,
    human_reviewed_at: Option<String>,
    flagged: Option<bool>,
    raw_response: Option<String>,
}

fn decode_json(raw: Option<String>) -> error::Result<Option<Value>> {
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(StateError::from)
}

impl ResultRowRaw {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            prompt_text: row.get(1)?,
            prompt_metadata: row.get(2)?,
            prompt_payload: row.get(3)?,
            input_flagged: row.get(4)?,
            input_raw_response: row.get(5)?,
            answer_text: row.get(6)?,
            answer_model: row.get(7)?,
            answer_raw_response: row.get(8)?,
            output_flagged: row.get(9)?,
            output_raw_response: row.get(10)?,
            human_label: row.get(11)?,
            human_label_type: row.get(12)?,
            human_notes: row.get(13)?,
            human_reviewed_at: row.get(14)?,
            flagged: row.get(15)?,
            raw_response: row.get(16)?,
        })
    }

    fn decode(self) -> error::Result<StoredResult> {
        Ok(StoredResult {
            id: ResultId::new(self.id),
            prompt_text: self.prompt_text,
            prompt_metadata: decode_json(self.prompt_metadata)?,
            prompt_payload: decode_json(self.prompt_payload)?,
            input_flagged: self.input_flagged.unwrap_or(false),
            input_raw_response: decode_json(self.input_raw_response)?,
            answer_text: self.answer_text,
            answer_model: self.answer_model,
            answer_raw_response: decode_json(self.answer_raw_response)?,
            output_flagged: self.output_flagged,
            output_raw_response: decode_json(self.output_raw_response)?,
            human_label: self.human_label,
            human_label_type: self.human_label_type,
            human_notes: self.human_notes,
            human_reviewed_at: self
                .human_reviewed_at
                .as_deref()
                .map(SqliteModerationStore::sqlite_to_iso8601),
            flagged: self.flagged.unwrap_or(false),
            raw_response: decode_json(self.raw_response)?,
        })
    }
}

impl SqliteModerationStore {
    /// Open or create a `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Backend`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| StateError::backend_context("open database", e))?;
        Self::init(conn)
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Backend`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StateError::backend_context("open in-memory database", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> error::Result<Self> {
        conn.execute_batch(CONNECTION_PRAGMAS)
            .map_err(|e| StateError::backend_context("configure connection", e))?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StateError::backend_context("create schema", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    fn load_run(conn: &Connection, run_id: RunId) -> error::Result<Option<RunRecord>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1");
        conn.query_row(&sql, [run_id.get()], RunRow::read)
            .optional()
            .map_err(|e| StateError::backend_context("load run", e))?
            .map(RunRow::decode)
            .transpose()
    }

    fn load_results(conn: &Connection, run_id: RunId) -> error::Result<Vec<ResultView>> {
        let mut flags_by_result: HashMap<i64, Vec<StoredFlag>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT f.result_id, f.category, f.score, f.violated, f.flag_type \
                     FROM flags f JOIN results r ON r.id = f.result_id \
                     WHERE r.run_id = ?1 ORDER BY f.id",
                )
                .map_err(|e| StateError::backend_context("load flags: prepare", e))?;
            let rows = stmt
                .query_map([run_id.get()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(|e| StateError::backend_context("load flags: query", e))?;
            for row in rows {
                let (result_id, category, score, violated, flag_type) = row?;
                let flag_type = flag_type.parse::<FlagType>().map_err(|message| {
                    StateError::InvalidColumn {
                        column: "flags.flag_type",
                        message,
                    }
                })?;
                flags_by_result.entry(result_id).or_default().push(StoredFlag {
                    category,
                    score,
                    violated,
                    flag_type,
                });
            }
        }

        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE run_id = ?1 ORDER BY id");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StateError::backend_context("load results: prepare", e))?;
        let rows = stmt
            .query_map([run_id.get()], ResultRowRaw::read)
            .map_err(|e| StateError::backend_context("load results: query", e))?;

        let mut views = Vec::new();
        for row in rows {
            let stored = row?.decode()?;
            let flags = flags_by_result
                .get(&stored.id.get())
                .map_or(&[][..], Vec::as_slice);
            views.push(serialize_result(&stored, flags));
        }
        Ok(views)
    }

    fn load_logs(conn: &Connection, run_id: RunId) -> error::Result<Vec<LogView>> {
        let mut stmt = conn
            .prepare("SELECT level, message, created_at FROM logs WHERE run_id = ?1 ORDER BY id")
            .map_err(|e| StateError::backend_context("load logs: prepare", e))?;
        let rows = stmt
            .query_map([run_id.get()], |row| {
                Ok(LogView {
                    level: row.get(0)?,
                    message: row.get(1)?,
                    created_at: row
                        .get::<_, Option<String>>(2)?
                        .as_deref()
                        .map(Self::sqlite_to_iso8601),
                })
            })
            .map_err(|e| StateError::backend_context("load logs: query", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StateError::from)
    }

    fn load_run_view(
        conn: &Connection,
        run_id: RunId,
        include_details: bool,
    ) -> error::Result<Option<RunView>> {
        let Some(run) = Self::load_run(conn, run_id)? else {
            return Ok(None);
        };
        let results = Self::load_results(conn, run_id)?;
        let stats = RunStats::tally(&results);
        let (results, logs) = if include_details {
            (Some(results), Some(Self::load_logs(conn, run_id)?))
        } else {
            (None, None)
        };
        Ok(Some(RunView {
            run,
            stats,
            results,
            logs,
        }))
    }

    #[cfg(test)]
    fn count_rows(&self, table: &str) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(StateError::from)
    }

    #[cfg(test)]
    fn legacy_columns(&self, result_id: ResultId) -> error::Result<(bool, String, bool, String)> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT flagged, raw_response, input_flagged, input_raw_response \
             FROM results WHERE id = ?1",
            [result_id.get()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .map_err(StateError::from)
    }

    /// Administrative deletion; the pipeline itself never deletes runs.
    #[cfg(test)]
    fn delete_run(&self, run_id: RunId) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM runs WHERE id = ?1", [run_id.get()])?;
        Ok(())
    }
}

impl ModerationStore for SqliteModerationStore {
    fn start_run(&self, run: &NewRun) -> error::Result<RunRecord> {
        let extra_args = serde_json::to_string(&run.extra_args)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO runs \
             (created_at, dataset_id, dataset_split, model, prompt_limit, output_path, status, extra_args) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Self::now_sqlite(),
                run.dataset_id,
                run.dataset_split,
                run.model,
                run.prompt_limit,
                run.output_path,
                RunStatus::Running.as_str(),
                extra_args,
            ],
        )
        .map_err(|e| StateError::backend_context("start_run: insert", e))?;
        let run_id = RunId::new(conn.last_insert_rowid());
        Self::load_run(&conn, run_id)?.ok_or(StateError::Backend {
            context: "start_run: reload",
            source: rusqlite::Error::QueryReturnedNoRows,
        })
    }

    fn complete_run(&self, run_id: RunId, status: RunStatus) -> error::Result<bool> {
        let previous = {
            let conn = self.lock_conn()?;
            let previous: Option<Option<String>> = conn
                .query_row(
                    "SELECT completed_at FROM runs WHERE id = ?1",
                    [run_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StateError::backend_context("complete_run: lookup", e))?;
            if previous.is_some() {
                conn.execute(
                    "UPDATE runs SET status = ?1, completed_at = COALESCE(completed_at, ?2) \
                     WHERE id = ?3",
                    params![status.as_str(), Self::now_sqlite(), run_id.get()],
                )
                .map_err(|e| StateError::backend_context("complete_run: update", e))?;
            }
            previous
        };

        match previous {
            None => {
                tracing::warn!(run_id = %run_id, "run not found when attempting to complete");
                Ok(false)
            }
            Some(Some(completed_at)) => {
                tracing::warn!(
                    run_id = %run_id,
                    status = %status,
                    completed_at = %Self::sqlite_to_iso8601(&completed_at),
                    "run already completed; keeping first completion time"
                );
                Ok(true)
            }
            Some(None) => {
                tracing::debug!(run_id = %run_id, status = %status, "run completed");
                Ok(true)
            }
        }
    }

    fn save_results(&self, run_id: RunId, results: &[StageResult]) -> error::Result<Vec<ResultId>> {
        if results.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StateError::backend_context("save_results: begin tx", e))?;
        let mut result_stmt = tx
            .prepare(INSERT_RESULT)
            .map_err(|e| StateError::backend_context("save_results: prepare result", e))?;
        let mut flag_stmt = tx
            .prepare(INSERT_FLAG)
            .map_err(|e| StateError::backend_context("save_results: prepare flag", e))?;

        let mut ids = Vec::with_capacity(results.len());
        for result in results {
            let row = ResultRow::from_stage(result);
            let prompt_metadata = serde_json::to_string(&row.prompt.metadata)?;
            let prompt_payload = serde_json::to_string(row.prompt)?;
            let input_raw = serde_json::to_string(row.input_raw_response)?;
            let answer_raw = row
                .answer
                .map(|answer| serde_json::to_string(&answer.raw_response))
                .transpose()?;
            let output_raw = row.output_raw_response.map(serde_json::to_string).transpose()?;
            let legacy_raw = serde_json::to_string(row.legacy_raw_response)?;

            result_stmt
                .execute(params![
                    run_id.get(),
                    row.prompt.text,
                    prompt_metadata,
                    prompt_payload,
                    row.input_flagged,
                    input_raw,
                    row.answer.map(|answer| answer.text.as_str()),
                    row.answer.map(|answer| answer.model.as_str()),
                    answer_raw,
                    row.output_flagged,
                    output_raw,
                    row.legacy_flagged,
                    legacy_raw,
                ])
                .map_err(|e| StateError::backend_context("save_results: insert result", e))?;
            let result_id = tx.last_insert_rowid();

            for flag in &row.flags {
                flag_stmt
                    .execute(params![
                        result_id,
                        flag.category,
                        flag.score,
                        flag.violated,
                        flag.flag_type.as_str(),
                    ])
                    .map_err(|e| StateError::backend_context("save_results: insert flag", e))?;
            }
            ids.push(ResultId::new(result_id));
        }
        drop(flag_stmt);
        drop(result_stmt);
        tx.commit()
            .map_err(|e| StateError::backend_context("save_results: commit", e))?;

        Ok(ids)
    }

    fn record_human_review(
        &self,
        result_id: ResultId,
        review: &HumanReview,
    ) -> error::Result<bool> {
        let updated = {
            let conn = self.lock_conn()?;
            conn.execute(
                "UPDATE results SET human_label = ?1, \
                 human_label_type = COALESCE(?2, human_label_type), \
                 human_notes = ?3, human_reviewed_at = ?4 WHERE id = ?5",
                params![
                    review.label,
                    review.scope.map(|scope| scope.as_str()),
                    review.normalized_notes(),
                    Self::now_sqlite(),
                    result_id.get(),
                ],
            )
            .map_err(|e| StateError::backend_context("record_human_review: update", e))?
        };

        if updated == 0 {
            tracing::warn!(result_id = %result_id, "result not found when recording human review");
            return Ok(false);
        }
        Ok(true)
    }

    fn persist_log(&self, run_id: RunId, level: &str, message: &str) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO logs (run_id, level, message, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id.get(), level, message, Self::now_sqlite()],
        )
        .map_err(|e| StateError::backend_context("persist_log: insert", e))?;
        Ok(())
    }

    fn get_run(&self, run_id: RunId) -> error::Result<Option<RunRecord>> {
        let conn = self.lock_conn()?;
        Self::load_run(&conn, run_id)
    }

    fn list_runs(&self, limit: u32) -> error::Result<Vec<RunView>> {
        let conn = self.lock_conn()?;
        let ids = {
            let mut stmt = conn
                .prepare("SELECT id FROM runs ORDER BY created_at DESC, id DESC LIMIT ?1")
                .map_err(|e| StateError::backend_context("list_runs: prepare", e))?;
            let rows = stmt
                .query_map([limit], |row| row.get::<_, i64>(0))
                .map_err(|e| StateError::backend_context("list_runs: query", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(view) = Self::load_run_view(&conn, RunId::new(id), false)? {
                runs.push(view);
            }
        }
        Ok(runs)
    }

    fn fetch_run_details(&self, run_id: RunId) -> error::Result<Option<RunView>> {
        let conn = self.lock_conn()?;
        Self::load_run_view(&conn, run_id, true)
    }
}
