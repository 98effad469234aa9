//! Pipeline error model.

use safeguard_state::StateError;

/// The three stages a prompt can pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    InputClassification,
    AnswerGeneration,
    OutputClassification,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputClassification => "input_classification",
            Self::AnswerGeneration => "answer_generation",
            Self::OutputClassification => "output_classification",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by pipeline processing and run tracking.
///
/// Capability failures are never retried and never produce a partial
/// result; they carry the stage and the zero-based prompt index that hit
/// them.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A classifier or generator call failed.
    #[error("{stage} failed for prompt {prompt_index}: {source}")]
    Capability {
        stage: Stage,
        prompt_index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The moderation store failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl PipelineError {
    pub(crate) fn capability(stage: Stage, prompt_index: usize, source: anyhow::Error) -> Self {
        Self::Capability {
            stage,
            prompt_index,
            source,
        }
    }

    /// The failing stage, if this is a capability error.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Capability { stage, .. } => Some(*stage),
            Self::State(_) => None,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
