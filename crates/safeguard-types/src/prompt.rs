//! Normalized prompt representation used throughout the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dataset provenance and free-form attributes attached to a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub dataset_split: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl PromptMetadata {
    /// Metadata for a prompt drawn from `dataset_id`/`dataset_split`.
    #[must_use]
    pub fn dataset(dataset_id: impl Into<String>, dataset_split: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            dataset_split: Some(dataset_split.into()),
            attributes: Map::new(),
        }
    }

    /// Add one attribute, builder style.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A single input prompt. Never mutated once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    #[serde(default)]
    pub metadata: PromptMetadata,
}

impl Prompt {
    /// Prompt with empty metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: PromptMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(text: impl Into<String>, metadata: PromptMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// At most `max_chars` characters of the text, for log lines.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_serializes_with_metadata_shape() {
        let prompt = Prompt::with_metadata(
            "hi",
            PromptMetadata::dataset("allenai/real-toxicity-prompts", "train")
                .with_attribute("toxicity", 0.12),
        );
        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["text"], "hi");
        assert_eq!(json["metadata"]["dataset_id"], "allenai/real-toxicity-prompts");
        assert_eq!(json["metadata"]["dataset_split"], "train");
        assert_eq!(json["metadata"]["attributes"]["toxicity"], 0.12);
    }

    #[test]
    fn prompt_deserializes_without_metadata() {
        let prompt: Prompt = serde_json::from_str(r#"{"text":"bare"}"#).unwrap();
        assert_eq!(prompt.text, "bare");
        assert_eq!(prompt.metadata, PromptMetadata::default());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let prompt = Prompt::new("héllo wörld");
        assert_eq!(prompt.preview(5), "héllo");
        assert_eq!(prompt.preview(100), "héllo wörld");
    }
}
