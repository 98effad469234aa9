//! Write-side mapping from [`StageResult`] to normalized rows.
//!
//! This is the single place where the legacy `flagged` / `raw_response`
//! columns are filled; they are always copied from the input stage.

use safeguard_types::state::FlagType;
use safeguard_types::{
    AnswerGeneration, ClassificationResult, ModerationFlag, Prompt, StageResult,
};
use serde_json::Value;

/// One `results` row, borrowed from the value being saved.
#[derive(Debug)]
pub(crate) struct ResultRow<'a> {
    pub prompt: &'a Prompt,
    pub input_flagged: bool,
    pub input_raw_response: &'a Value,
    pub answer: Option<&'a AnswerGeneration>,
    pub output_flagged: Option<bool>,
    pub output_raw_response: Option<&'a Value>,
    pub legacy_flagged: bool,
    pub legacy_raw_response: &'a Value,
    pub flags: Vec<FlagRow<'a>>,
}

/// One `flags` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FlagRow<'a> {
    pub category: &'a str,
    pub score: f64,
    pub violated: bool,
    pub flag_type: FlagType,
}

fn stage_flags(flags: &[ModerationFlag], flag_type: FlagType) -> impl Iterator<Item = FlagRow<'_>> {
    flags.iter().map(move |flag| FlagRow {
        category: &flag.category,
        score: flag.score,
        violated: flag.violated,
        flag_type,
    })
}

impl<'a> ResultRow<'a> {
    pub(crate) fn from_stage(result: &'a StageResult) -> Self {
        match result {
            StageResult::Pipeline(pipeline) => {
                let input = pipeline.input_classification();
                let output = pipeline.output_classification();
                let mut flags: Vec<FlagRow<'a>> =
                    stage_flags(&input.flags, FlagType::Input).collect();
                if let Some(output) = output {
                    flags.extend(stage_flags(&output.flags, FlagType::Output));
                }
                Self::with_input(
                    pipeline.prompt(),
                    input,
                    pipeline.answer(),
                    output,
                    flags,
                )
            }
            StageResult::Legacy(legacy) => Self {
                prompt: &legacy.prompt,
                input_flagged: legacy.flagged,
                input_raw_response: &legacy.raw_response,
                answer: None,
                output_flagged: None,
                output_raw_response: None,
                legacy_flagged: legacy.flagged,
                legacy_raw_response: &legacy.raw_response,
                flags: stage_flags(&legacy.flags, FlagType::Input).collect(),
            },
        }
    }

    fn with_input(
        prompt: &'a Prompt,
        input: &'a ClassificationResult,
        answer: Option<&'a AnswerGeneration>,
        output: Option<&'a ClassificationResult>,
        flags: Vec<FlagRow<'a>>,
    ) -> Self {
        Self {
            prompt,
            input_flagged: input.flagged,
            input_raw_response: &input.raw_response,
            answer,
            output_flagged: output.map(|stage| stage.flagged),
            output_raw_response: output.map(|stage| &stage.raw_response),
            legacy_flagged: input.flagged,
            legacy_raw_response: &input.raw_response,
            flags,
        }
    }
}
