//! Store trait definition.
//!
//! [`ModerationStore`] defines the storage contract for runs, their result
//! records (with per-stage flags), and run logs. Model types live in
//! [`safeguard_types::state`] and [`safeguard_types::view`].

use safeguard_types::state::{HumanReview, NewRun, ResultId, RunId, RunRecord, RunStatus};
use safeguard_types::view::RunView;
use safeguard_types::StageResult;

use crate::error;

/// Storage contract for pipeline runs.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn ModerationStore>`.
pub trait ModerationStore: Send + Sync {
    /// Create a run in the `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn start_run(&self, run: &NewRun) -> error::Result<RunRecord>;

    /// Set a run's terminal status and stamp `completed_at`.
    ///
    /// Returns `false` (and logs a warning) when the run does not exist.
    /// A run that already has `completed_at` keeps its first timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn complete_run(&self, run_id: RunId, status: RunStatus) -> error::Result<bool>;

    /// Persist a batch of results under `run_id` in one transaction.
    ///
    /// Returns the new result ids in input order. On any failure nothing
    /// from the batch is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn save_results(&self, run_id: RunId, results: &[StageResult]) -> error::Result<Vec<ResultId>>;

    /// Record a human verdict on one result.
    ///
    /// Returns `false` (and logs a warning) when the result does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn record_human_review(&self, result_id: ResultId, review: &HumanReview)
        -> error::Result<bool>;

    /// Append one log line to a run.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn persist_log(&self, run_id: RunId, level: &str, message: &str) -> error::Result<()>;

    /// Read a single run record.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_run(&self, run_id: RunId) -> error::Result<Option<RunRecord>>;

    /// Most recent runs first, each with its statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn list_runs(&self, limit: u32) -> error::Result<Vec<RunView>>;

    /// One run with statistics, serialized results, and logs.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn fetch_run_details(&self, run_id: RunId) -> error::Result<Option<RunView>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn ModerationStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn ModerationStore) {}
    }
}
