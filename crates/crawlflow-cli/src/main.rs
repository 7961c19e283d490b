mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod output;
mod paths;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        completions::generate_completions(shell);
        return;
    }

    let _guard = init_logging(cli.verbose);

    if let Err(err) = dispatch(cli).await {
        error::handle_error(err);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::CliConfig::load();

    match cli.command {
        Commands::Run(args) => commands::run::run(args, &config, cli.format).await,
        Commands::Validate { config: path } => commands::validate::run(&path, cli.format),
        Commands::Probe => commands::probe::run(&config, cli.format).await,
        Commands::Completions { shell } => {
            completions::generate_completions(shell);
            Ok(())
        }
    }
}

/// Logs go to stderr and to a daily file under the data directory. The file
/// layer is skipped when the directory cannot be created.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match paths::logs_dir() {
        Ok(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "crawlflow.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_level(true);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
