use anyhow::Result;
use colored::Colorize;

use super::playwright_driver;
use crate::config::CliConfig;
use crate::output::OutputFormat;
use crate::output::json::print_json;

pub async fn run(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let probe = playwright_driver(config).probe_runtime().await?;

    if format.is_json() {
        return print_json(&probe);
    }

    let mark = |ok: bool| if ok { "ok".green() } else { "missing".red() };
    println!(
        "{:<22} {} {}",
        "Node.js",
        mark(probe.node_available),
        probe.node_version.as_deref().unwrap_or_default()
    );
    println!(
        "{:<22} {}",
        "playwright package",
        mark(probe.playwright_package_available)
    );
    println!(
        "{:<22} {}",
        "Chromium cache",
        mark(probe.chromium_cache_detected)
    );
    for note in &probe.notes {
        println!("  {} {}", "note:".yellow().bold(), note);
    }

    if probe.ready {
        println!("{}", "Browser runtime ready".green().bold());
    } else {
        println!("{}", "Browser runtime not ready".red().bold());
    }
    Ok(())
}
