use anyhow::{Context, Result};
use colored::Colorize;
use crawlflow_core::RunConfig;
use serde_json::json;
use std::path::Path;

use crate::output::OutputFormat;
use crate::output::json::print_json;

/// Parse failures are errors; graph problems are only reported.
pub fn run(path: &Path, format: OutputFormat) -> Result<()> {
    let config = RunConfig::from_path(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let warnings = config.validate();

    if format.is_json() {
        return print_json(&json!({
            "path": path,
            "first_step": config.first_step,
            "steps": config.steps.len(),
            "warnings": warnings,
        }));
    }

    println!(
        "{} {} ({} steps, first: {})",
        "Loaded".green().bold(),
        path.display(),
        config.steps.len(),
        config.first_step
    );
    if warnings.is_empty() {
        println!("{}", "No problems found".green());
    }
    for warning in &warnings {
        println!("  {} {}", "warning:".yellow().bold(), warning);
    }
    Ok(())
}
