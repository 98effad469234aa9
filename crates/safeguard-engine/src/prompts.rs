//! Custom prompt loading from text files and in-memory lists.

use std::path::Path;

use anyhow::{Context, Result};
use safeguard_types::{Prompt, PromptMetadata};

/// Dataset id and split recorded on custom prompts.
pub const CUSTOM_DATASET: &str = "custom";

/// One prompt per non-blank line, trimmed.
///
/// Each prompt records `source_file` and its 1-based `line_number`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn load_prompts_from_file(path: &Path) -> Result<Vec<Prompt>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
    let source_file = path.display().to_string();

    Ok(content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let text = line.trim();
            (!text.is_empty()).then(|| {
                let metadata = PromptMetadata::dataset(CUSTOM_DATASET, CUSTOM_DATASET)
                    .with_attribute("source_file", source_file.as_str())
                    .with_attribute("line_number", index + 1);
                Prompt::with_metadata(text, metadata)
            })
        })
        .collect())
}

/// Prompts from a list of strings, trimmed, blanks skipped.
///
/// `index` records the position in the original list, blanks included.
pub fn load_prompts_from_list<S: AsRef<str>>(texts: impl IntoIterator<Item = S>) -> Vec<Prompt> {
    texts
        .into_iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let text = text.as_ref().trim();
            (!text.is_empty()).then(|| {
                let metadata = PromptMetadata::dataset(CUSTOM_DATASET, CUSTOM_DATASET)
                    .with_attribute("index", index);
                Prompt::with_metadata(text, metadata)
            })
        })
        .collect()
}
