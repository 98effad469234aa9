//! Three-stage orchestration: classify input, answer, classify output.
//!
//! Each prompt walks a small state machine. The input stage always runs.
//! The answer stage runs only when a generator is configured and the input
//! was not flagged. The output stage runs only when an output classifier is
//! configured and an answer exists. Prompts are processed one at a time, in
//! order; the first capability failure aborts the whole call.

use safeguard_types::{AnswerGeneration, ClassificationResult, PipelineResult, Prompt};
use tracing::debug;

use crate::capability::{Classifier, Generator};
use crate::errors::{PipelineError, Result, Stage};
use crate::normalize::{build_answer, build_classification};

const PREVIEW_CHARS: usize = 80;

/// Per-prompt position in the stage sequence.
enum Step {
    Input,
    Answer(ClassificationResult),
    Output(ClassificationResult, AnswerGeneration),
}

/// Orchestrates the input classifier, optional generator, and optional
/// output classifier.
pub struct PipelineService {
    input_classifier: Box<dyn Classifier>,
    answer_generator: Option<Box<dyn Generator>>,
    output_classifier: Option<Box<dyn Classifier>>,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("answer_generator", &self.answer_generator.is_some())
            .field("output_classifier", &self.output_classifier.is_some())
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    /// A pipeline with only the input stage.
    pub fn new(input_classifier: impl Classifier + 'static) -> Self {
        Self {
            input_classifier: Box::new(input_classifier),
            answer_generator: None,
            output_classifier: None,
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: impl Generator + 'static) -> Self {
        self.answer_generator = Some(Box::new(generator));
        self
    }

    #[must_use]
    pub fn with_output_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.output_classifier = Some(Box::new(classifier));
        self
    }

    /// Install or clear the generator.
    ///
    /// A generator that could not be constructed is passed as `None`, which
    /// is indistinguishable from never configuring one.
    #[must_use]
    pub fn with_optional_generator(mut self, generator: Option<Box<dyn Generator>>) -> Self {
        self.answer_generator = generator;
        self
    }

    #[must_use]
    pub fn with_optional_output_classifier(
        mut self,
        classifier: Option<Box<dyn Classifier>>,
    ) -> Self {
        self.output_classifier = classifier;
        self
    }

    #[must_use]
    pub fn has_generator(&self) -> bool {
        self.answer_generator.is_some()
    }

    #[must_use]
    pub fn has_output_classifier(&self) -> bool {
        self.output_classifier.is_some()
    }

    /// Run every prompt through the pipeline, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Capability`] for the first prompt whose
    /// classifier or generator call fails. Results for earlier prompts are
    /// discarded.
    pub fn process(&self, prompts: impl IntoIterator<Item = Prompt>) -> Result<Vec<PipelineResult>> {
        let prompts = prompts.into_iter();
        let mut results = Vec::with_capacity(prompts.size_hint().0);
        for (prompt_index, prompt) in prompts.enumerate() {
            results.push(self.process_prompt(prompt_index, prompt)?);
        }
        Ok(results)
    }

    /// Run a single prompt through the stage sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Capability`] tagged with `prompt_index`.
    pub fn process_prompt(&self, prompt_index: usize, prompt: Prompt) -> Result<PipelineResult> {
        debug!(prompt_index, prompt = prompt.preview(PREVIEW_CHARS), "processing prompt");

        let mut step = Step::Input;
        let (input, answer, output) = loop {
            step = match step {
                Step::Input => {
                    debug!(prompt_index, stage = %Stage::InputClassification, "running stage");
                    let raw = self
                        .input_classifier
                        .classify(&prompt.text)
                        .map_err(|e| {
                            PipelineError::capability(Stage::InputClassification, prompt_index, e)
                        })?;
                    Step::Answer(build_classification(raw))
                }
                Step::Answer(input) => match &self.answer_generator {
                    Some(generator) if !input.flagged => {
                        debug!(prompt_index, stage = %Stage::AnswerGeneration, "running stage");
                        let raw = generator.generate(&prompt.text).map_err(|e| {
                            PipelineError::capability(Stage::AnswerGeneration, prompt_index, e)
                        })?;
                        Step::Output(input, build_answer(raw))
                    }
                    _ => break (input, None, None),
                },
                Step::Output(input, answer) => match &self.output_classifier {
                    Some(classifier) => {
                        debug!(prompt_index, stage = %Stage::OutputClassification, "running stage");
                        let raw = classifier.classify(&answer.text).map_err(|e| {
                            PipelineError::capability(Stage::OutputClassification, prompt_index, e)
                        })?;
                        break (input, Some(answer), Some(build_classification(raw)));
                    }
                    None => break (input, Some(answer), None),
                },
            };
        };

        debug!(
            prompt_index,
            input_flagged = input.flagged,
            answer_generated = answer.is_some(),
            output_flagged = ?output.as_ref().map(|o| o.flagged),
            "prompt complete"
        );

        Ok(match answer {
            Some(answer) => PipelineResult::answered(prompt, input, answer, output),
            None => PipelineResult::input_only(prompt, input),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn moderation(flagged: bool) -> Value {
        json!({
            "results": [{
                "flagged": flagged,
                "categories": {"toxicity": flagged},
                "category_scores": {"toxicity": if flagged { 0.97 } else { 0.01 }}
            }]
        })
    }

    fn fixed(flagged: bool) -> impl Fn(&str) -> anyhow::Result<Value> {
        move |_text: &str| -> anyhow::Result<Value> { Ok(moderation(flagged)) }
    }

    fn echo_generator(text: &str) -> anyhow::Result<Value> {
        Ok(json!({ "text": format!("answer to {text}"), "model": "m1" }))
    }

    #[test]
    fn input_only_pipeline_skips_later_stages() {
        let service = PipelineService::new(fixed(false));
        let results = service.process(vec![Prompt::new("hello")]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].answer().is_none());
        assert!(results[0].output_classification().is_none());
    }

    #[test]
    fn safe_prompt_runs_all_three_stages() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let output_seen = Rc::clone(&seen);
        let service = PipelineService::new(fixed(false))
            .with_generator(echo_generator)
            .with_output_classifier(move |text: &str| -> anyhow::Result<Value> {
                output_seen.borrow_mut().push(text.to_string());
                Ok(moderation(true))
            });

        let results = service.process(vec![Prompt::new("q")]).unwrap();
        let result = &results[0];
        assert_eq!(result.answer().unwrap().text, "answer to q");
        assert!(result.output_classification().unwrap().flagged);
        assert_eq!(*seen.borrow(), vec!["answer to q".to_string()]);
    }

    #[test]
    fn flagged_input_short_circuits() {
        let calls = Rc::new(RefCell::new(0_u32));
        let counter = Rc::clone(&calls);
        let service = PipelineService::new(fixed(true))
            .with_generator(move |_text: &str| -> anyhow::Result<Value> {
                *counter.borrow_mut() += 1;
                Ok(json!({}))
            })
            .with_output_classifier(fixed(false));

        let results = service.process(vec![Prompt::new("bad")]).unwrap();
        assert!(results[0].input_classification().flagged);
        assert!(results[0].answer().is_none());
        assert!(results[0].output_classification().is_none());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn output_classifier_without_generator_never_runs() {
        let service = PipelineService::new(fixed(false))
            .with_output_classifier(|_text: &str| -> anyhow::Result<Value> {
                anyhow::bail!("must not be called")
            });
        let results = service.process(vec![Prompt::new("q")]).unwrap();
        assert!(results[0].output_classification().is_none());
    }

    #[test]
    fn generator_failure_reports_stage_and_index() {
        let service = PipelineService::new(fixed(false)).with_generator(
            |text: &str| -> anyhow::Result<Value> {
                if text == "second" {
                    anyhow::bail!("provider timeout");
                }
                Ok(json!({"text": "ok"}))
            },
        );
        let err = service
            .process(vec![Prompt::new("first"), Prompt::new("second"), Prompt::new("third")])
            .unwrap_err();
        match err {
            PipelineError::Capability {
                stage,
                prompt_index,
                source,
            } => {
                assert_eq!(stage, Stage::AnswerGeneration);
                assert_eq!(prompt_index, 1);
                assert!(source.to_string().contains("provider timeout"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn absent_generator_via_optional_setter_matches_unconfigured() {
        let service = PipelineService::new(fixed(false)).with_optional_generator(None);
        assert!(!service.has_generator());
        let results = service.process(vec![Prompt::new("q")]).unwrap();
        assert!(results[0].answer().is_none());
    }

    #[test]
    fn order_is_preserved() {
        let service = PipelineService::new(|text: &str| -> anyhow::Result<Value> {
            Ok(moderation(text.starts_with("bad")))
        })
        .with_generator(echo_generator);
        let prompts = ["a", "bad b", "c"].map(Prompt::new);
        let results = service.process(prompts).unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.prompt().text.as_str()).collect();
        assert_eq!(texts, vec!["a", "bad b", "c"]);
        assert!(results[1].answer().is_none());
        assert!(results[2].answer().is_some());
    }
}
