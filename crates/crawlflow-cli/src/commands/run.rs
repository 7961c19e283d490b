use anyhow::{Context, Result};
use colored::Colorize;
use crawlflow_core::{AntiCaptchaClient, Engine, EngineOptions, RunConfig, RunReport};
use std::sync::Arc;
use tracing::info;

use super::playwright_driver;
use crate::cli::RunArgs;
use crate::config::CliConfig;
use crate::output::OutputFormat;
use crate::output::json::{print_json, write_json};

pub async fn run(args: RunArgs, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let document = RunConfig::from_path(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let engine = Engine::new(
        Arc::new(playwright_driver(config)),
        Arc::new(AntiCaptchaClient::new()),
        engine_options(&args, config),
    );

    if !format.is_json() {
        println!(
            "{} {} (headless: {})",
            "Running".green().bold(),
            args.config.display(),
            engine.options().headless
        );
    }

    let report = engine
        .run(document)
        .await
        .with_context(|| format!("Run of {} failed", args.config.display()))?;
    info!(run_id = %report.run_id, steps = report.steps.len(), "Run report ready");

    if let Some(path) = &args.report {
        write_json(path, &report)?;
    }
    if let Some(path) = &args.cookies {
        write_json(path, &report.cookies)?;
    }

    if format.is_json() {
        print_json(&report)
    } else {
        print_summary(&report);
        Ok(())
    }
}

fn engine_options(args: &RunArgs, config: &CliConfig) -> EngineOptions {
    let mut options = EngineOptions {
        headless: !args.headed,
        max_steps: args.max_steps,
        captcha_api_key: config.captcha_api_key(),
        ..EngineOptions::default()
    };
    if let Some(user_agent) = &config.browser.user_agent {
        options.user_agent = user_agent.clone();
    }
    if let Some(root) = &config.output.root {
        options.output_root = root.clone();
    }
    options
}

fn print_summary(report: &RunReport) {
    println!("{} run {}", "Finished".green().bold(), report.run_id);
    println!("  {} {}", "Steps:".bold(), report.steps.join(" -> "));
    println!("  {} {}", "Cookies:".bold(), report.cookies.len());

    for record in &report.extracted {
        println!(
            "  {} step {}: {} value(s)",
            "Extracted:".bold(),
            record.step_id,
            record.output_contents.len()
        );
    }
    for stored in &report.stored_urls {
        println!("  {} {}", "URL:".bold(), stored.url);
    }
    if let Some(dir) = &report.output_dir {
        println!("  {} {}", "Snapshots:".bold(), dir.display());
    }
}
