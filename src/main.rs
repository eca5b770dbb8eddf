//! Songscope CLI - Audio Analysis Reports
//!
//! Command-line interface for the Songscope analysis pipeline.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songscope::cli::{commands, Cli, Commands};
use songscope::SongscopeError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "songscope=debug" } else { "songscope=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Songscope v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Some(cmd) => handle_command(cmd, cli.config.as_deref()),
        None => {
            println!("Songscope v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn handle_command(cmd: Commands, config: Option<&std::path::Path>) -> anyhow::Result<()> {
    match cmd {
        Commands::Analyze {
            file,
            title,
            composer,
            json,
            save_normalized,
        } => commands::analyze(&file, title, composer, config, json, save_normalized.as_deref()),
        Commands::Separate { file, out_dir } => commands::separate(&file, &out_dir, config),
        Commands::Batch { dir, json } => commands::batch(&dir, config, json),
        Commands::Config => commands::show_config(config),
    }
}

/// Print one user-facing message, plus recovery hints for pipeline errors
fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<SongscopeError>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e.friendly_message());
            for hint in e.recovery_suggestions() {
                eprintln!("  hint: {}", hint);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}
