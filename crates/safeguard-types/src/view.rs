//! Read-optimized views of stored runs and results.
//!
//! These are the JSON shapes dashboards and exports consume. Field names are
//! part of the contract: the legacy `flagged`, `raw_response`, `flags` and
//! `flagged_count` keys must keep their input-stage meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{ResultId, RunRecord};

/// One stored flag, without its stage tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagView {
    pub category: String,
    pub score: f64,
    pub violated: bool,
}

/// One stored result, partitioned by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    pub id: ResultId,
    pub prompt_text: String,
    pub prompt_metadata: Value,
    pub prompt_payload: Value,

    pub input_flagged: bool,
    pub input_raw_response: Value,
    pub input_flags: Vec<FlagView>,

    pub answer_text: Option<String>,
    pub answer_model: Option<String>,
    pub answer_raw_response: Value,

    pub output_flagged: Option<bool>,
    pub output_raw_response: Value,
    pub output_flags: Vec<FlagView>,

    pub human_label: Option<String>,
    pub human_label_type: Option<String>,
    pub human_notes: Option<String>,
    pub human_reviewed_at: Option<String>,

    pub flagged: bool,
    pub raw_response: Value,
    /// Always the input-stage flags.
    pub flags: Vec<FlagView>,
}

/// One persisted log line of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogView {
    pub level: String,
    pub message: String,
    pub created_at: Option<String>,
}

/// Aggregate counts over a run's results. Never stored; always recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub input_flagged_count: u64,
    pub output_flagged_count: u64,
    /// Legacy name for `input_flagged_count`.
    pub flagged_count: u64,
    pub reviewed_count: u64,
    pub answers_generated: u64,
}

impl RunStats {
    /// Tally counts by scanning result views.
    #[must_use]
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a ResultView>) -> Self {
        let mut stats = Self::default();
        for result in results {
            if result.input_flagged {
                stats.input_flagged_count += 1;
            }
            if result.output_flagged == Some(true) {
                stats.output_flagged_count += 1;
            }
            if result.human_label.as_deref().is_some_and(|l| !l.is_empty()) {
                stats.reviewed_count += 1;
            }
            if result.answer_text.as_deref().is_some_and(|t| !t.is_empty()) {
                stats.answers_generated += 1;
            }
        }
        stats.flagged_count = stats.input_flagged_count;
        stats
    }
}

/// A run plus its statistics, optionally with results and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: RunRecord,
    #[serde(flatten)]
    pub stats: RunStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogView>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunId, RunStatus};
    use serde_json::{json, Map};

    fn view(id: i64) -> ResultView {
        ResultView {
            id: ResultId::new(id),
            prompt_text: "p".into(),
            prompt_metadata: json!({}),
            prompt_payload: json!({}),
            input_flagged: false,
            input_raw_response: json!({}),
            input_flags: vec![],
            answer_text: None,
            answer_model: None,
            answer_raw_response: json!({}),
            output_flagged: None,
            output_raw_response: json!({}),
            output_flags: vec![],
            human_label: None,
            human_label_type: None,
            human_notes: None,
            human_reviewed_at: None,
            flagged: false,
            raw_response: json!({}),
            flags: vec![],
        }
    }

    #[test]
    fn tally_counts_each_dimension() {
        let mut flagged = view(1);
        flagged.input_flagged = true;
        flagged.flagged = true;

        let mut answered = view(2);
        answered.answer_text = Some("hi".into());
        answered.output_flagged = Some(true);
        answered.human_label = Some("toxic".into());

        let mut empty_answer = view(3);
        empty_answer.answer_text = Some(String::new());
        empty_answer.output_flagged = Some(false);
        empty_answer.human_label = Some(String::new());

        let stats = RunStats::tally([&flagged, &answered, &empty_answer]);
        assert_eq!(stats.input_flagged_count, 1);
        assert_eq!(stats.flagged_count, 1);
        assert_eq!(stats.output_flagged_count, 1);
        assert_eq!(stats.reviewed_count, 1);
        assert_eq!(stats.answers_generated, 1);
    }

    #[test]
    fn run_view_flattens_record_and_stats() {
        let run_view = RunView {
            run: RunRecord {
                id: RunId::new(4),
                created_at: "2026-01-15T10:00:00Z".into(),
                completed_at: None,
                dataset_id: "d".into(),
                dataset_split: "train".into(),
                model: "input:m".into(),
                prompt_limit: 10,
                output_path: None,
                status: RunStatus::Running,
                extra_args: Map::new(),
            },
            stats: RunStats::default(),
            results: None,
            logs: None,
        };
        let json = serde_json::to_value(&run_view).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["status"], "running");
        assert_eq!(json["flagged_count"], 0);
        assert!(json.get("results").is_none());
        assert!(json.get("logs").is_none());
    }
}
