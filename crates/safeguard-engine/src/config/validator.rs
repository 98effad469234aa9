//! Semantic validation for parsed run configuration values.

use anyhow::{bail, Result};

use crate::config::types::{RunConfig, StageConfig};

fn validate_stage(stage: &StageConfig, name: &str, errors: &mut Vec<String>) {
    if stage.model.trim().is_empty() {
        errors.push(format!("Stage '{name}' ({}) must name a model", stage.backend));
    }
}

/// Validate a parsed run configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &RunConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.dataset.id.trim().is_empty() {
        errors.push("Dataset id must not be empty".to_string());
    }
    if config.dataset.split.trim().is_empty() {
        errors.push("Dataset split must not be empty".to_string());
    }
    if config.dataset.limit == 0 {
        errors.push("Dataset limit must be at least 1".to_string());
    }

    if let Some(prompts) = &config.prompts {
        match (&prompts.file, prompts.inline.is_empty()) {
            (Some(_), false) => {
                errors.push("Prompts must use either 'file' or 'inline', not both".to_string());
            }
            (None, true) => {
                errors.push("Prompts must set 'file' or 'inline'".to_string());
            }
            (None, false) if prompts.inline.iter().all(|p| p.trim().is_empty()) => {
                errors.push("Inline prompts must contain at least one non-blank prompt".to_string());
            }
            (Some(path), true) if path.as_os_str().is_empty() => {
                errors.push("Prompts file path must not be empty".to_string());
            }
            _ => {}
        }
    }

    validate_stage(&config.stages.input_classifier, "input_classifier", &mut errors);
    if let Some(stage) = &config.stages.answer_generator {
        validate_stage(stage, "answer_generator", &mut errors);
    }
    if let Some(stage) = &config.stages.output_classifier {
        validate_stage(stage, "output_classifier", &mut errors);
    }

    if config.output.as_os_str().is_empty() {
        errors.push("Output path must not be empty".to_string());
    }

    if let Some(state) = &config.state {
        if state.path.as_os_str().is_empty() {
            errors.push("State path must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Run config validation failed:\n  - {}", errors.join("\n  - "));
    }
}

/// Non-fatal configuration issues.
#[must_use]
pub fn config_warnings(config: &RunConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.stages.output_classifier.is_some() && config.stages.answer_generator.is_none() {
        warnings.push(
            "output_classifier is configured without answer_generator; it will never run"
                .to_string(),
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;

    fn valid_yaml() -> &'static str {
        r#"
version: "1.0"
dataset:
  id: allenai/real-toxicity-prompts
  split: train
  limit: 5
stages:
  input_classifier:
    backend: openai
    model: omni-moderation-latest
  answer_generator:
    backend: openai
    model: gpt-4o-mini
"#
    }

    #[test]
    fn valid_config_passes() {
        let config = parse_config_str(valid_yaml()).unwrap();
        assert!(validate_config(&config).is_ok());
        assert!(config_warnings(&config).is_empty());
    }

    #[test]
    fn wrong_version_fails() {
        let yaml = valid_yaml().replace("\"1.0\"", "\"2.0\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Unsupported config version"));
    }

    #[test]
    fn zero_limit_fails() {
        let yaml = valid_yaml().replace("limit: 5", "limit: 0");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("limit must be at least 1"));
    }

    #[test]
    fn empty_model_fails() {
        let yaml = valid_yaml().replace("model: gpt-4o-mini", "model: \"\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("answer_generator"));
    }

    #[test]
    fn all_errors_are_reported_together() {
        let yaml = valid_yaml()
            .replace("\"1.0\"", "\"0.9\"")
            .replace("split: train", "split: \"\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Unsupported config version"));
        assert!(err.contains("Dataset split must not be empty"));
    }

    #[test]
    fn blank_inline_prompts_fail() {
        let yaml = format!("{}prompts:\n  inline: [\"  \", \"\"]\n", valid_yaml());
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("non-blank prompt"));
    }

    #[test]
    fn file_and_inline_together_fail() {
        let yaml = format!(
            "{}prompts:\n  file: prompts.txt\n  inline: [\"hi\"]\n",
            valid_yaml()
        );
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("not both"));
    }

    #[test]
    fn output_classifier_without_generator_only_warns() {
        let yaml = r#"
version: "1.0"
stages:
  input_classifier: { backend: openai, model: omni-moderation-latest }
  output_classifier: { backend: gemma, model: google/gemma-2b-it }
"#;
        let config = parse_config_str(yaml).unwrap();
        assert!(validate_config(&config).is_ok());
        let warnings = config_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("without answer_generator"));
    }
}
