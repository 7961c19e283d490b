use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "crawlflow")]
#[command(version, about = "Crawlflow - declarative browser step runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a configuration document once
    Run(RunArgs),

    /// Load a configuration document and report problems without running it
    Validate {
        /// Path to the configuration document (JSON)
        config: PathBuf,
    },

    /// Check that Node.js, Playwright and Chromium are available
    Probe,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the configuration document (JSON)
    pub config: PathBuf,

    /// Show the browser window
    #[arg(long, env = "CRAWLFLOW_HEADED")]
    pub headed: bool,

    /// Abort after this many step executions
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the final cookie jar as JSON to this path
    #[arg(long)]
    pub cookies: Option<PathBuf>,
}
