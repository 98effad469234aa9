//! Read-side reconstruction of stored records into [`ResultView`]s.

use safeguard_types::state::{FlagType, ResultId};
use safeguard_types::view::{FlagView, ResultView};
use serde_json::{Map, Value};

/// A `results` row as read back, JSON columns already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: ResultId,
    pub prompt_text: String,
    pub prompt_metadata: Option<Value>,
    pub prompt_payload: Option<Value>,
    pub input_flagged: bool,
    pub input_raw_response: Option<Value>,
    pub answer_text: Option<String>,
    pub answer_model: Option<String>,
    pub answer_raw_response: Option<Value>,
    pub output_flagged: Option<bool>,
    pub output_raw_response: Option<Value>,
    pub human_label: Option<String>,
    pub human_label_type: Option<String>,
    pub human_notes: Option<String>,
    pub human_reviewed_at: Option<String>,
    pub flagged: bool,
    pub raw_response: Option<Value>,
}

/// A `flags` row as read back.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFlag {
    pub category: String,
    pub score: f64,
    pub violated: bool,
    pub flag_type: FlagType,
}

impl From<&StoredFlag> for FlagView {
    fn from(flag: &StoredFlag) -> Self {
        Self {
            category: flag.category.clone(),
            score: flag.score,
            violated: flag.violated,
        }
    }
}

/// Missing and null JSON both read as `{}`.
fn or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(other) => other.clone(),
    }
}

fn flags_of(flags: &[StoredFlag], flag_type: FlagType) -> Vec<FlagView> {
    flags
        .iter()
        .filter(|flag| flag.flag_type == flag_type)
        .map(FlagView::from)
        .collect()
}

/// Build the dual-compatible view of one stored result.
///
/// `flags` is every flag row linked to the record; they are partitioned by
/// stage and the legacy `flags` key gets the input partition.
#[must_use]
pub fn serialize_result(record: &StoredResult, flags: &[StoredFlag]) -> ResultView {
    let input_flags = flags_of(flags, FlagType::Input);
    let output_flags = flags_of(flags, FlagType::Output);

    ResultView {
        id: record.id,
        prompt_text: record.prompt_text.clone(),
        prompt_metadata: or_empty(record.prompt_metadata.as_ref()),
        prompt_payload: or_empty(record.prompt_payload.as_ref()),
        input_flagged: record.input_flagged,
        input_raw_response: or_empty(record.input_raw_response.as_ref()),
        flags: input_flags.clone(),
        input_flags,
        answer_text: record.answer_text.clone(),
        answer_model: record.answer_model.clone(),
        answer_raw_response: or_empty(record.answer_raw_response.as_ref()),
        output_flagged: record.output_flagged,
        output_raw_response: or_empty(record.output_raw_response.as_ref()),
        output_flags,
        human_label: record.human_label.clone(),
        human_label_type: record.human_label_type.clone(),
        human_notes: record.human_notes.clone(),
        human_reviewed_at: record.human_reviewed_at.clone(),
        flagged: record.flagged,
        raw_response: or_empty(record.raw_response.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> StoredResult {
        StoredResult {
            id: ResultId::new(1),
            prompt_text: "Hello".into(),
            prompt_metadata: None,
            prompt_payload: Some(json!({"text": "Hello"})),
            input_flagged: false,
            input_raw_response: Some(json!({"results": []})),
            answer_text: None,
            answer_model: None,
            answer_raw_response: None,
            output_flagged: None,
            output_raw_response: Some(Value::Null),
            human_label: None,
            human_label_type: None,
            human_notes: None,
            human_reviewed_at: None,
            flagged: false,
            raw_response: Some(json!({"results": []})),
        }
    }

    fn flag(category: &str, flag_type: FlagType) -> StoredFlag {
        StoredFlag {
            category: category.into(),
            score: 0.5,
            violated: true,
            flag_type,
        }
    }

    #[test]
    fn legacy_flags_equal_input_flags() {
        let flags = [
            flag("toxicity", FlagType::Input),
            flag("violence", FlagType::Output),
            flag("hate", FlagType::Input),
        ];
        let view = serialize_result(&record(), &flags);
        let names = |v: &[FlagView]| v.iter().map(|f| f.category.clone()).collect::<Vec<_>>();
        assert_eq!(names(&view.input_flags), vec!["toxicity", "hate"]);
        assert_eq!(names(&view.output_flags), vec!["violence"]);
        assert_eq!(view.flags, view.input_flags);
    }

    #[test]
    fn missing_json_columns_read_as_empty_objects() {
        let view = serialize_result(&record(), &[]);
        assert_eq!(view.prompt_metadata, json!({}));
        assert_eq!(view.answer_raw_response, json!({}));
        assert_eq!(view.output_raw_response, json!({}));
        assert_eq!(view.prompt_payload, json!({"text": "Hello"}));
    }

    #[test]
    fn view_serializes_contract_keys() {
        let json = serde_json::to_value(serialize_result(&record(), &[])).unwrap();
        for key in [
            "id",
            "prompt_text",
            "prompt_metadata",
            "prompt_payload",
            "input_flagged",
            "input_raw_response",
            "input_flags",
            "answer_text",
            "answer_model",
            "answer_raw_response",
            "output_flagged",
            "output_raw_response",
            "output_flags",
            "human_label",
            "human_label_type",
            "human_notes",
            "human_reviewed_at",
            "flagged",
            "raw_response",
            "flags",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert!(json["answer_text"].is_null());
        assert!(json["output_flagged"].is_null());
    }
}
