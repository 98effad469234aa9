//! Shared safeguard model types.
//!
//! Prompts, per-stage classification results, stored-run bookkeeping types,
//! and the serialized read views handed to dashboards and exports. Kept in
//! their own crate so the engine and the state backend share one definition.

pub mod moderation;
pub mod prompt;
pub mod state;
pub mod view;

pub use moderation::{
    AnswerGeneration, ClassificationResult, ModerationFlag, ModerationResult, PipelineResult,
    StageResult,
};
pub use prompt::{Prompt, PromptMetadata};
