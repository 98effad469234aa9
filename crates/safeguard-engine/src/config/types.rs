//! Run configuration types deserialized from YAML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATASET_ID: &str = "allenai/real-toxicity-prompts";
pub const DEFAULT_DATASET_SPLIT: &str = "train";
pub const DEFAULT_PROMPT_LIMIT: u32 = 50;
pub const DEFAULT_OUTPUT_PATH: &str = "pipeline_results.json";

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub version: String,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsConfig>,
    pub stages: StagesConfig,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateConfig>,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_id")]
    pub id: String,
    #[serde(default = "default_dataset_split")]
    pub split: String,
    #[serde(default = "default_prompt_limit")]
    pub limit: u32,
}

fn default_dataset_id() -> String {
    DEFAULT_DATASET_ID.to_string()
}

fn default_dataset_split() -> String {
    DEFAULT_DATASET_SPLIT.to_string()
}

fn default_prompt_limit() -> u32 {
    DEFAULT_PROMPT_LIMIT
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            id: default_dataset_id(),
            split: default_dataset_split(),
            limit: DEFAULT_PROMPT_LIMIT,
        }
    }
}

/// Custom prompts overriding the dataset. Exactly one source must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagesConfig {
    pub input_classifier: StageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_generator: Option<StageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_classifier: Option<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub backend: StageBackend,
    pub model: String,
}

/// Provider family behind a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageBackend {
    Openai,
    Gemma,
}

impl StageBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemma => "gemma",
        }
    }
}

impl std::fmt::Display for StageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl RunConfig {
    /// Composite model descriptor stored on the run, e.g.
    /// `input:omni-moderation-latest,answer:gpt-4o-mini`.
    #[must_use]
    pub fn model_descriptor(&self) -> String {
        let mut descriptor = format!("input:{}", self.stages.input_classifier.model);
        if let Some(generator) = &self.stages.answer_generator {
            descriptor.push_str(",answer:");
            descriptor.push_str(&generator.model);
        }
        if let Some(classifier) = &self.stages.output_classifier {
            descriptor.push_str(",output:");
            descriptor.push_str(&classifier.model);
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(model: &str) -> StageConfig {
        StageConfig {
            backend: StageBackend::Openai,
            model: model.into(),
        }
    }

    fn config(stages: StagesConfig) -> RunConfig {
        RunConfig {
            version: "1.0".into(),
            dataset: DatasetConfig::default(),
            prompts: None,
            stages,
            output: default_output(),
            state: None,
        }
    }

    #[test]
    fn model_descriptor_lists_configured_stages() {
        let full = config(StagesConfig {
            input_classifier: stage("omni"),
            answer_generator: Some(stage("gpt-4o-mini")),
            output_classifier: Some(stage("gemma-2b")),
        });
        assert_eq!(
            full.model_descriptor(),
            "input:omni,answer:gpt-4o-mini,output:gemma-2b"
        );

        let input_only = config(StagesConfig {
            input_classifier: stage("omni"),
            answer_generator: None,
            output_classifier: None,
        });
        assert_eq!(input_only.model_descriptor(), "input:omni");
    }

    #[test]
    fn dataset_defaults() {
        let dataset = DatasetConfig::default();
        assert_eq!(dataset.id, DEFAULT_DATASET_ID);
        assert_eq!(dataset.split, "train");
        assert_eq!(dataset.limit, 50);
    }
}
