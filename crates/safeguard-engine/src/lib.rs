//! Orchestration crate for the safeguard text-safety pipeline.
//!
//! Runs prompts through input classification, optional answer generation,
//! and optional output classification, then records runs through a
//! [`safeguard_state::ModerationStore`].

#![warn(clippy::pedantic)]

pub mod capability;
pub mod config;
pub mod errors;
pub mod log_layer;
pub mod moderation;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod runner;
pub mod tracker;

// Re-export public API for convenience
pub use capability::{Classifier, Generator};
pub use errors::{PipelineError, Stage};
pub use log_layer::{RunLogLayer, RunLogSink};
pub use moderation::ModerationService;
pub use pipeline::PipelineService;
pub use runner::{execute_run, preview_results, RunOutcome};
pub use tracker::RunTracker;
