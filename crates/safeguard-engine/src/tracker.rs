//! Run lifecycle tracking on top of a [`ModerationStore`].

use std::sync::Arc;

use safeguard_state::ModerationStore;
use safeguard_types::state::{HumanReview, NewRun, ResultId, RunId, RunRecord, RunStatus};
use safeguard_types::StageResult;
use tracing::info;

use crate::errors::Result;

/// Starts, completes, and annotates runs.
///
/// Store calls return before any event is emitted here, so a
/// [`RunLogLayer`](crate::log_layer::RunLogLayer) writing to the same store
/// never contends with the call that produced the event.
#[derive(Clone)]
pub struct RunTracker {
    store: Arc<dyn ModerationStore>,
}

impl RunTracker {
    pub fn new(store: Arc<dyn ModerationStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ModerationStore> {
        &self.store
    }

    /// Create a run in the `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`](crate::PipelineError::State) on storage failure.
    pub fn start(&self, run: &NewRun) -> Result<RunRecord> {
        let record = self.store.start_run(run)?;
        info!(
            run_id = %record.id,
            dataset = %record.dataset_id,
            split = %record.dataset_split,
            model = %record.model,
            "run started"
        );
        Ok(record)
    }

    /// Mark a run finished. Returns `false` when the run does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`](crate::PipelineError::State) on storage failure.
    pub fn complete(&self, run_id: RunId, status: RunStatus) -> Result<bool> {
        let found = self.store.complete_run(run_id, status)?;
        if found {
            info!(run_id = %run_id, status = %status, "run finished");
        }
        Ok(found)
    }

    /// Persist one batch of results for a run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`](crate::PipelineError::State); the
    /// batch is rolled back.
    pub fn save_results(&self, run_id: RunId, results: &[StageResult]) -> Result<Vec<ResultId>> {
        let ids = self.store.save_results(run_id, results)?;
        info!(run_id = %run_id, count = ids.len(), "results saved");
        Ok(ids)
    }

    /// Record a human verdict. Returns `false` when the result does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`](crate::PipelineError::State) on storage failure.
    pub fn record_human_review(&self, result_id: ResultId, review: &HumanReview) -> Result<bool> {
        let found = self.store.record_human_review(result_id, review)?;
        if found {
            info!(result_id = %result_id, label = %review.label, "human review recorded");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeguard_state::SqliteModerationStore;
    use safeguard_types::{ClassificationResult, PipelineResult, Prompt};
    use serde_json::{json, Map};

    fn tracker() -> RunTracker {
        RunTracker::new(Arc::new(SqliteModerationStore::in_memory().unwrap()))
    }

    fn new_run() -> NewRun {
        NewRun {
            dataset_id: "custom_cli".into(),
            dataset_split: "custom".into(),
            model: "input:omni-moderation-latest".into(),
            prompt_limit: 1,
            output_path: None,
            extra_args: Map::new(),
        }
    }

    #[test]
    fn start_then_complete() {
        let tracker = tracker();
        let run = tracker.start(&new_run()).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(tracker.complete(run.id, RunStatus::Completed).unwrap());
        let stored = tracker.store().get_run(run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
    }

    #[test]
    fn completing_unknown_run_is_not_an_error() {
        assert!(!tracker().complete(RunId::new(77), RunStatus::Completed).unwrap());
    }

    #[test]
    fn review_after_save() {
        let tracker = tracker();
        let run = tracker.start(&new_run()).unwrap();
        let result = PipelineResult::input_only(
            Prompt::new("q"),
            ClassificationResult {
                flagged: false,
                flags: vec![],
                raw_response: json!({}),
            },
        );
        let ids = tracker.save_results(run.id, &[result.into()]).unwrap();
        let review = HumanReview::new("safe", Some("looks fine".into()));
        assert!(tracker.record_human_review(ids[0], &review).unwrap());
        assert!(!tracker
            .record_human_review(ResultId::new(ids[0].get() + 100), &review)
            .unwrap());
    }
}
