//! End-to-end run driver: prompts in, results file and stored run out.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use safeguard_state::ModerationStore;
use safeguard_types::state::{NewRun, ResultId, RunId, RunStatus};
use safeguard_types::{ClassificationResult, PipelineResult, Prompt, StageResult};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::types::RunConfig;
use crate::log_layer::RunLogSink;
use crate::pipeline::PipelineService;
use crate::prompts::{load_prompts_from_file, load_prompts_from_list};
use crate::tracker::RunTracker;

/// Dataset id recorded for prompts given inline.
pub const INLINE_DATASET_ID: &str = "custom_cli";
/// Dataset id recorded for prompts read from a file.
pub const FILE_DATASET_ID: &str = "custom_file";

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Option<RunId>,
    pub results: Vec<PipelineResult>,
    pub result_ids: Vec<ResultId>,
    pub input_flagged: usize,
    pub answers_generated: usize,
    pub output_flagged: usize,
}

impl RunOutcome {
    fn new(run_id: Option<RunId>, results: Vec<PipelineResult>, result_ids: Vec<ResultId>) -> Self {
        let input_flagged = results.iter().filter(|r| r.input_classification().flagged).count();
        let answers_generated = results.iter().filter(|r| r.answer().is_some()).count();
        let output_flagged = results
            .iter()
            .filter(|r| r.output_classification().is_some_and(|o| o.flagged))
            .count();
        Self {
            run_id,
            results,
            result_ids,
            input_flagged,
            answers_generated,
            output_flagged,
        }
    }
}

/// Custom prompts named by the config, or `None` when the dataset applies.
///
/// File prompts are truncated to `dataset.limit`; inline prompts are not.
///
/// # Errors
///
/// Returns an error if the prompt file cannot be read.
pub fn load_config_prompts(config: &RunConfig) -> Result<Option<Vec<Prompt>>> {
    let Some(source) = &config.prompts else {
        return Ok(None);
    };
    if !source.inline.is_empty() {
        let prompts = load_prompts_from_list(&source.inline);
        info!(count = prompts.len(), "loaded inline prompts");
        return Ok(Some(prompts));
    }
    let Some(path) = &source.file else {
        return Ok(None);
    };
    let mut prompts = load_prompts_from_file(path)?;
    let limit = config.dataset.limit as usize;
    if limit < prompts.len() {
        prompts.truncate(limit);
        info!(limit, "limited file prompts");
    }
    info!(count = prompts.len(), file = %path.display(), "loaded file prompts");
    Ok(Some(prompts))
}

/// The run record parameters for `config` processing `prompt_count` prompts.
///
/// # Errors
///
/// Returns an error if the config cannot be serialized into `extra_args`.
pub fn describe_run(config: &RunConfig, prompt_count: usize) -> Result<NewRun> {
    let count = u32::try_from(prompt_count).unwrap_or(u32::MAX);
    let (dataset_id, dataset_split, prompt_limit) = match &config.prompts {
        Some(source) if !source.inline.is_empty() => {
            (INLINE_DATASET_ID.to_string(), "custom".to_string(), count)
        }
        Some(source) if source.file.is_some() => (
            FILE_DATASET_ID.to_string(),
            source
                .file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            count,
        ),
        _ => (
            config.dataset.id.clone(),
            config.dataset.split.clone(),
            config.dataset.limit,
        ),
    };

    let extra_args = match serde_json::to_value(config).context("Failed to serialize run config")? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    Ok(NewRun {
        dataset_id,
        dataset_split,
        model: config.model_descriptor(),
        prompt_limit,
        output_path: Some(config.output.display().to_string()),
        extra_args,
    })
}

/// Write results as a pretty-printed JSON array, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_results_file(path: &Path, results: &[PipelineResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results file: {}", path.display()))?;
    Ok(())
}

fn violated_categories(classification: &ClassificationResult) -> String {
    let violated: Vec<String> = classification
        .violations()
        .map(|flag| format!("{} ({:.2})", flag.category, flag.score))
        .collect();
    if violated.is_empty() {
        "None".to_string()
    } else {
        violated.join(", ")
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Human-readable preview of the first `limit` results.
///
/// Each entry shows both stages' verdicts with violated categories, the
/// prompt clipped to 80 characters and the answer clipped to 60.
#[must_use]
pub fn preview_results(results: &[PipelineResult], limit: usize) -> String {
    let mut out = String::new();
    for (index, result) in results.iter().take(limit).enumerate() {
        let input = result.input_classification();
        let _ = write!(
            out,
            "{}. Input: Flagged={} ({})",
            index + 1,
            input.flagged,
            violated_categories(input)
        );
        if let Some(output) = result.output_classification() {
            let _ = write!(
                out,
                " | Output: Flagged={} ({})",
                output.flagged,
                violated_categories(output)
            );
        }
        let answer = result
            .answer()
            .map_or_else(|| "N/A".to_string(), |a| clip(&a.text, 60));
        let _ = writeln!(out, "\n   Prompt: {}", clip(&result.prompt().text, 80));
        let _ = writeln!(out, "   Answer: {answer}\n");
    }
    out
}

/// Process `prompts`, write the results file, and record the run.
///
/// With a store, a run is started first and completed `completed` on
/// success or `failed` on any error; the sink (if given) captures the run's
/// log events in between.
///
/// # Errors
///
/// Returns the pipeline, file, or storage error that stopped the run. A
/// failure to mark an already failed run is logged, not returned.
pub fn execute_run(
    config: &RunConfig,
    prompts: Vec<Prompt>,
    service: &PipelineService,
    store: Option<Arc<dyn ModerationStore>>,
    log_sink: Option<&RunLogSink>,
) -> Result<RunOutcome> {
    let tracker = store.map(RunTracker::new);
    let run = match &tracker {
        Some(tracker) => Some(tracker.start(&describe_run(config, prompts.len())?)?),
        None => None,
    };
    let run_id = run.as_ref().map(|r| r.id);

    if let (Some(sink), Some(tracker), Some(run_id)) = (log_sink, &tracker, run_id) {
        sink.attach(Arc::clone(tracker.store()), run_id);
    }

    let outcome = process_and_persist(config, prompts, service, tracker.as_ref(), run_id);

    if let (Some(tracker), Some(run_id)) = (&tracker, run_id) {
        let status = if outcome.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        if let Err(e) = &outcome {
            error!(run_id = %run_id, error = %format!("{e:#}"), "run failed");
        }
        let completed = tracker.complete(run_id, status);
        if let Some(sink) = log_sink {
            sink.detach();
        }
        match completed {
            Err(e) if outcome.is_err() => {
                error!(run_id = %run_id, error = %e, "failed to mark run failed");
            }
            other => {
                other?;
            }
        }
    }

    outcome
}

fn process_and_persist(
    config: &RunConfig,
    prompts: Vec<Prompt>,
    service: &PipelineService,
    tracker: Option<&RunTracker>,
    run_id: Option<RunId>,
) -> Result<RunOutcome> {
    info!(
        prompts = prompts.len(),
        generator = service.has_generator(),
        output_classifier = service.has_output_classifier(),
        "starting pipeline"
    );
    let results = service.process(prompts)?;
    info!(output = %config.output.display(), "pipeline complete, writing results");
    write_results_file(&config.output, &results)?;

    let result_ids = match (tracker, run_id) {
        (Some(tracker), Some(run_id)) => {
            let batch: Vec<StageResult> = results.iter().cloned().map(StageResult::from).collect();
            tracker.save_results(run_id, &batch)?
        }
        _ => Vec::new(),
    };

    Ok(RunOutcome::new(run_id, results, result_ids))
}
