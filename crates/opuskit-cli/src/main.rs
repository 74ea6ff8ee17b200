//! opuskit CLI - Main entry point

use clap::Parser;
use opuskit_cli::commands::pack::PackOptions;
use opuskit_cli::{Cli, Commands, Settings};
use opuskit_common::logging::init_logging;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli);

    // Environment variables take precedence over the flag-derived defaults
    let log_config = settings
        .log_config()
        .merge_env()
        .unwrap_or_else(|_| settings.log_config());

    // The CLI still works if logging cannot be set up
    let _log_guard = init_logging(&log_config).ok();

    // Execute command
    let result = execute_command(&cli, &settings).await;

    // Only setup errors end up here; per-track failures are in the summary
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, settings: &Settings) -> opuskit_cli::Result<()> {
    match &cli.command {
        Commands::Download {
            input,
            fetch,
            batch,
        } => opuskit_cli::commands::download::run(settings, input, fetch, batch).await,

        Commands::Convert {
            input,
            output,
            codec,
            batch,
        } => opuskit_cli::commands::convert::run(settings, input, output, codec, batch).await,

        Commands::Verify { input, batch } => {
            opuskit_cli::commands::verify::run(settings, input, batch).await
        }

        Commands::Pack {
            opus,
            to,
            split,
            workers,
            filter,
            no_progress,
        } => {
            opuskit_cli::commands::pack::run(
                settings,
                PackOptions {
                    opus,
                    to,
                    split: split.as_deref(),
                    workers: *workers,
                    filter: filter.as_deref(),
                    no_progress: *no_progress,
                },
            )
            .await
        }

        Commands::Unpack { dir, out } => opuskit_cli::commands::unpack::run(dir, out).await,

        Commands::Run {
            input,
            output,
            fetch,
            codec,
            batch,
        } => opuskit_cli::commands::run::run(settings, input, output, fetch, codec, batch).await,
    }
}
