//! Raw provider payload normalization.
//!
//! Malformed payloads never error: every missing or mistyped piece falls
//! back to an empty or default value. The payload itself is kept verbatim
//! as the `raw_response`.

use safeguard_types::{AnswerGeneration, ClassificationResult, ModerationFlag};
use serde_json::{Map, Value};

/// Default `AnswerGeneration::model` when the payload names none.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Loose truthiness for provider booleans (`1`, `"yes"`, `true`, ...).
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Convert a classifier payload into a [`ClassificationResult`].
///
/// Reads the first element of the top-level `results` list. One flag is
/// produced per `categories` key, in the payload's key order, with its score
/// taken from `category_scores` (0.0 when absent). `flagged` comes from the
/// element's own `flagged` key and is never derived from the flags.
#[must_use]
pub fn build_classification(raw_response: Value) -> ClassificationResult {
    let (flagged, flags) = {
        let empty = Map::new();
        let first = raw_response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let categories = as_object(first.get("categories")).unwrap_or(&empty);
        let scores = as_object(first.get("category_scores")).unwrap_or(&empty);

        let flags = categories
            .iter()
            .map(|(category, violated)| {
                let score = scores.get(category).and_then(Value::as_f64).unwrap_or(0.0);
                ModerationFlag::new(category.clone(), score, truthy(violated))
            })
            .collect();
        (first.get("flagged").is_some_and(truthy), flags)
    };

    ClassificationResult {
        flagged,
        flags,
        raw_response,
    }
}

/// Convert a generator payload into an [`AnswerGeneration`].
#[must_use]
pub fn build_answer(raw_response: Value) -> AnswerGeneration {
    let text = raw_response
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let model = raw_response
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_MODEL)
        .to_string();
    AnswerGeneration {
        text,
        model,
        raw_response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn flags_follow_category_order_with_scores() {
        let raw = json!({
            "results": [{
                "flagged": true,
                "categories": {"violence": true, "hate": false, "sexual": false},
                "category_scores": {"violence": 0.91, "hate": 0.02}
            }]
        });
        let result = build_classification(raw.clone());
        assert!(result.flagged);
        let names: Vec<_> = result.flags.iter().map(|f| f.category.as_str()).collect();
        assert_eq!(names, vec!["violence", "hate", "sexual"]);
        assert!((result.flags[0].score - 0.91).abs() < f64::EPSILON);
        assert!(result.flags[0].violated);
        assert!(!result.flags[1].violated);
        assert!(result.flags[2].score.abs() < f64::EPSILON);
        assert_eq!(result.raw_response, raw);
    }

    #[test]
    fn flagged_is_read_not_recomputed() {
        let raw = json!({
            "results": [{"flagged": false, "categories": {"toxicity": true}}]
        });
        let result = build_classification(raw);
        assert!(!result.flagged);
        assert!(result.flags[0].violated);
    }

    #[test]
    fn only_first_result_is_used() {
        let raw = json!({
            "results": [
                {"flagged": false, "categories": {"a": false}},
                {"flagged": true, "categories": {"b": true}}
            ]
        });
        let result = build_classification(raw);
        assert!(!result.flagged);
        assert_eq!(result.flags.len(), 1);
        assert_eq!(result.flags[0].category, "a");
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"results": []}))]
    #[case(json!({"results": null}))]
    #[case(json!({"results": "oops"}))]
    #[case(json!({"results": [42]}))]
    #[case(json!({"results": [{"categories": null, "category_scores": []}]}))]
    #[case(json!([1, 2, 3]))]
    fn malformed_payloads_normalize_to_empty(#[case] raw: Value) {
        let result = build_classification(raw.clone());
        assert!(!result.flagged);
        assert!(result.flags.is_empty());
        assert_eq!(result.raw_response, raw);
    }

    #[test]
    fn non_numeric_score_defaults_to_zero() {
        let raw = json!({
            "results": [{"categories": {"hate": 1}, "category_scores": {"hate": "high"}}]
        });
        let result = build_classification(raw);
        assert!(result.flags[0].violated);
        assert!(result.flags[0].score.abs() < f64::EPSILON);
    }

    #[test]
    fn answer_reads_text_and_model() {
        let raw = json!({"text": "Sure, here you go.", "model": "gpt-4o-mini", "usage": {"tokens": 12}});
        let answer = build_answer(raw.clone());
        assert_eq!(answer.text, "Sure, here you go.");
        assert_eq!(answer.model, "gpt-4o-mini");
        assert_eq!(answer.raw_response, raw);
    }

    #[test]
    fn answer_defaults_when_keys_missing() {
        let answer = build_answer(json!({"choices": []}));
        assert_eq!(answer.text, "");
        assert_eq!(answer.model, UNKNOWN_MODEL);
    }
}
