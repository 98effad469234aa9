//! Per-stage classification results and the pipeline result shapes.
//!
//! [`PipelineResult`] is the full three-stage shape. [`ModerationResult`] is
//! the older input-only shape still produced by the legacy service and still
//! accepted by the store. [`StageResult`] tags which of the two a value is at
//! the persistence boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prompt::Prompt;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ---------------------------------------------------------------------------
// Stage values
// ---------------------------------------------------------------------------

/// One category-level verdict within a classification stage.
///
/// `violated` is whatever the provider declared; it is never re-derived
/// from `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationFlag {
    pub category: String,
    pub score: f64,
    pub violated: bool,
}

impl ModerationFlag {
    #[must_use]
    pub fn new(category: impl Into<String>, score: f64, violated: bool) -> Self {
        Self {
            category: category.into(),
            score,
            violated,
        }
    }
}

/// Outcome of one classification stage (input or output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Provider's own top-level indicator, not a fold over `flags`.
    pub flagged: bool,
    #[serde(default)]
    pub flags: Vec<ModerationFlag>,
    #[serde(default = "empty_object")]
    pub raw_response: Value,
}

impl ClassificationResult {
    /// Flags whose category the provider marked as violated.
    pub fn violations(&self) -> impl Iterator<Item = &ModerationFlag> {
        self.flags.iter().filter(|flag| flag.violated)
    }
}

/// Answer produced by the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerGeneration {
    pub text: String,
    pub model: String,
    #[serde(default = "empty_object")]
    pub raw_response: Value,
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Full pipeline result: input classification, then optional answer, then
/// optional output classification.
///
/// Construction goes through [`PipelineResult::input_only`] and
/// [`PipelineResult::answered`] so an output stage can never exist without
/// an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PipelineResultFields")]
pub struct PipelineResult {
    prompt: Prompt,
    input_classification: ClassificationResult,
    answer: Option<AnswerGeneration>,
    output_classification: Option<ClassificationResult>,
}

#[derive(Deserialize)]
struct PipelineResultFields {
    prompt: Prompt,
    input_classification: ClassificationResult,
    #[serde(default)]
    answer: Option<AnswerGeneration>,
    #[serde(default)]
    output_classification: Option<ClassificationResult>,
}

impl TryFrom<PipelineResultFields> for PipelineResult {
    type Error = String;

    fn try_from(fields: PipelineResultFields) -> Result<Self, Self::Error> {
        match (fields.answer, fields.output_classification) {
            (None, Some(_)) => {
                Err("output_classification requires an answer to be present".to_string())
            }
            (None, None) => Ok(Self::input_only(fields.prompt, fields.input_classification)),
            (Some(answer), output) => Ok(Self::answered(
                fields.prompt,
                fields.input_classification,
                answer,
                output,
            )),
        }
    }
}

impl PipelineResult {
    /// Result whose pipeline stopped after the input stage.
    #[must_use]
    pub fn input_only(prompt: Prompt, input_classification: ClassificationResult) -> Self {
        Self {
            prompt,
            input_classification,
            answer: None,
            output_classification: None,
        }
    }

    /// Result with a generated answer and, if that stage ran, its classification.
    #[must_use]
    pub fn answered(
        prompt: Prompt,
        input_classification: ClassificationResult,
        answer: AnswerGeneration,
        output_classification: Option<ClassificationResult>,
    ) -> Self {
        Self {
            prompt,
            input_classification,
            answer: Some(answer),
            output_classification,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    #[must_use]
    pub fn input_classification(&self) -> &ClassificationResult {
        &self.input_classification
    }

    #[must_use]
    pub fn answer(&self) -> Option<&AnswerGeneration> {
        self.answer.as_ref()
    }

    #[must_use]
    pub fn output_classification(&self) -> Option<&ClassificationResult> {
        self.output_classification.as_ref()
    }

    // Legacy surface: older callers read these as if the result were input-only.

    /// Input stage `flagged`.
    #[must_use]
    pub fn flagged(&self) -> bool {
        self.input_classification.flagged
    }

    /// Input stage flags.
    #[must_use]
    pub fn flags(&self) -> &[ModerationFlag] {
        &self.input_classification.flags
    }

    /// Input stage raw provider payload.
    #[must_use]
    pub fn raw_response(&self) -> &Value {
        &self.input_classification.raw_response
    }
}

// ---------------------------------------------------------------------------
// Legacy ModerationResult
// ---------------------------------------------------------------------------

/// Pre-pipeline result shape: input classification only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub prompt: Prompt,
    pub flagged: bool,
    #[serde(default)]
    pub flags: Vec<ModerationFlag>,
    #[serde(default = "empty_object")]
    pub raw_response: Value,
}

impl From<&PipelineResult> for ModerationResult {
    fn from(result: &PipelineResult) -> Self {
        Self {
            prompt: result.prompt.clone(),
            flagged: result.input_classification.flagged,
            flags: result.input_classification.flags.clone(),
            raw_response: result.input_classification.raw_response.clone(),
        }
    }
}

impl From<PipelineResult> for ModerationResult {
    fn from(result: PipelineResult) -> Self {
        Self {
            prompt: result.prompt,
            flagged: result.input_classification.flagged,
            flags: result.input_classification.flags,
            raw_response: result.input_classification.raw_response,
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// A result handed to the store, tagged by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    Pipeline(PipelineResult),
    Legacy(ModerationResult),
}

impl StageResult {
    #[must_use]
    pub fn prompt(&self) -> &Prompt {
        match self {
            Self::Pipeline(result) => result.prompt(),
            Self::Legacy(result) => &result.prompt,
        }
    }

    /// Input stage `flagged`, whichever shape this is.
    #[must_use]
    pub fn input_flagged(&self) -> bool {
        match self {
            Self::Pipeline(result) => result.flagged(),
            Self::Legacy(result) => result.flagged,
        }
    }
}

impl From<PipelineResult> for StageResult {
    fn from(result: PipelineResult) -> Self {
        Self::Pipeline(result)
    }
}

impl From<ModerationResult> for StageResult {
    fn from(result: ModerationResult) -> Self {
        Self::Legacy(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classification(flagged: bool) -> ClassificationResult {
        ClassificationResult {
            flagged,
            flags: vec![ModerationFlag::new("toxicity", 0.9, flagged)],
            raw_response: json!({"results": [{"flagged": flagged}]}),
        }
    }

    fn answer() -> AnswerGeneration {
        AnswerGeneration {
            text: "I'm fine.".into(),
            model: "m1".into(),
            raw_response: json!({"text": "I'm fine.", "model": "m1"}),
        }
    }

    #[test]
    fn legacy_accessors_alias_input_stage() {
        let result = PipelineResult::answered(
            Prompt::new("hello"),
            classification(false),
            answer(),
            Some(classification(true)),
        );
        assert!(!result.flagged());
        assert_eq!(result.flags(), result.input_classification().flags.as_slice());
        assert_eq!(
            result.raw_response(),
            &result.input_classification().raw_response
        );
        assert!(result.output_classification().unwrap().flagged);
    }

    #[test]
    fn moderation_result_from_pipeline_keeps_input_only() {
        let result = PipelineResult::answered(
            Prompt::new("hello"),
            classification(true),
            answer(),
            Some(classification(false)),
        );
        let legacy = ModerationResult::from(&result);
        assert!(legacy.flagged);
        assert_eq!(legacy.flags, result.input_classification().flags);
        assert_eq!(legacy.raw_response, result.input_classification().raw_response);
        assert_eq!(legacy.prompt.text, "hello");
    }

    #[test]
    fn pipeline_result_serializes_stage_fields() {
        let result = PipelineResult::input_only(Prompt::new("x"), classification(true));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["input_classification"]["flagged"], true);
        assert!(json["answer"].is_null());
        assert!(json["output_classification"].is_null());
    }

    #[test]
    fn deserialize_rejects_output_without_answer() {
        let payload = json!({
            "prompt": {"text": "x"},
            "input_classification": {"flagged": false},
            "output_classification": {"flagged": false},
        });
        let err = serde_json::from_value::<PipelineResult>(payload).unwrap_err();
        assert!(err.to_string().contains("requires an answer"));
    }

    #[test]
    fn deserialize_accepts_answer_without_output() {
        let payload = json!({
            "prompt": {"text": "x"},
            "input_classification": {"flagged": false},
            "answer": {"text": "a", "model": "m"},
        });
        let result: PipelineResult = serde_json::from_value(payload).unwrap();
        assert_eq!(result.answer().unwrap().text, "a");
        assert!(result.output_classification().is_none());
        assert_eq!(result.answer().unwrap().raw_response, json!({}));
    }

    #[test]
    fn violations_filter_on_declared_flag() {
        let mut stage = classification(false);
        stage.flags.push(ModerationFlag::new("harassment", 0.01, true));
        let violated: Vec<_> = stage.violations().map(|f| f.category.as_str()).collect();
        assert_eq!(violated, vec!["harassment"]);
    }

    #[test]
    fn stage_result_dispatch_helpers() {
        let pipeline: StageResult =
            PipelineResult::input_only(Prompt::new("a"), classification(true)).into();
        let legacy: StageResult = ModerationResult {
            prompt: Prompt::new("b"),
            flagged: false,
            flags: vec![],
            raw_response: json!({}),
        }
        .into();
        assert!(pipeline.input_flagged());
        assert_eq!(pipeline.prompt().text, "a");
        assert!(!legacy.input_flagged());
        assert_eq!(legacy.prompt().text, "b");
    }
}
