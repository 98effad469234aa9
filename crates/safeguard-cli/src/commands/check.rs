use std::path::Path;

use anyhow::{Context, Result};
use safeguard_engine::config::types::StageConfig;
use safeguard_engine::config::{parser, validator};
use safeguard_engine::runner::load_config_prompts;

/// Execute the `check` command: validate a run config and its prompt source.
pub fn execute(config_path: &Path) -> Result<()> {
    // 1. Parse run config YAML
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse run config: {}", config_path.display()))?;

    // 2. Validate structure
    validator::validate_config(&config)?;
    println!("Run config:        OK");

    for warning in validator::config_warnings(&config) {
        tracing::warn!("{warning}");
        println!("  warning: {warning}");
    }

    // 3. Report stages
    print_stage("Input classifier", Some(&config.stages.input_classifier));
    print_stage("Answer generator", config.stages.answer_generator.as_ref());
    print_stage("Output classifier", config.stages.output_classifier.as_ref());
    println!("Run model:         {}", config.model_descriptor());

    // 4. Prompt source
    match load_config_prompts(&config)? {
        Some(prompts) => println!("Custom prompts:    {} loaded", prompts.len()),
        None => println!(
            "Dataset:           {} ({}), limit {}",
            config.dataset.id, config.dataset.split, config.dataset.limit
        ),
    }

    // 5. State store
    match &config.state {
        Some(state) => {
            super::open_store(&state.path)?;
            println!("State store:       OK ({})", state.path.display());
        }
        None => println!("State store:       not configured"),
    }

    println!("\nAll checks passed.");
    Ok(())
}

fn print_stage(label: &str, stage: Option<&StageConfig>) {
    let value = stage.map_or_else(
        || "disabled".to_string(),
        |stage| format!("{} ({})", stage.model, stage.backend),
    );
    println!("{:18} {}", format!("{label}:"), value);
}
