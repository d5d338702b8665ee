//! ampnet CLI - Neural Amp Renderer
//!
//! Command-line host for running amp models over WAV files.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ampnet::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("ampnet v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Inspect { model }) => commands::inspect(&model),
        Some(Commands::Render {
            model,
            input,
            output,
            block_size,
        }) => {
            let summary = commands::render(&model, &input, &output, block_size)?;
            if let Some(fault) = summary.fault {
                eprintln!("warning: {} ({})", fault, fault.error_code());
            }
            Ok(())
        }
        None => {
            println!("ampnet v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}
