//! Input-only moderation producing legacy [`ModerationResult`]s.
//!
//! Older callers that only want a flagged/flags/raw verdict use this
//! service. It shares normalization with [`crate::pipeline`], so both
//! produce identical input-stage data for the same payload.

use safeguard_types::{ModerationResult, PipelineResult, Prompt};
use tracing::debug;

use crate::capability::Classifier;
use crate::errors::{PipelineError, Result, Stage};
use crate::normalize::build_classification;

pub struct ModerationService {
    classifier: Box<dyn Classifier>,
}

impl ModerationService {
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    /// Classify each prompt's text and return legacy-shaped results.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Capability`] for the first failing prompt.
    pub fn moderate(&self, prompts: impl IntoIterator<Item = Prompt>) -> Result<Vec<ModerationResult>> {
        prompts
            .into_iter()
            .enumerate()
            .map(|(prompt_index, prompt)| {
                debug!(prompt_index, prompt = prompt.preview(80), "moderating prompt");
                let raw = self.classifier.classify(&prompt.text).map_err(|e| {
                    PipelineError::capability(Stage::InputClassification, prompt_index, e)
                })?;
                let result = PipelineResult::input_only(prompt, build_classification(raw));
                Ok(ModerationResult::from(result))
            })
            .collect()
    }
}
