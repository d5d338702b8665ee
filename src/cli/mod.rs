//! CLI Module
//!
//! Host harness for trying models outside a plugin host.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ampnet - run neural amp models over audio files
#[derive(Parser, Debug)]
#[command(name = "ampnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a model descriptor and print its layer stack
    #[command(name = "inspect")]
    Inspect {
        /// Path to the descriptor JSON
        model: PathBuf,
    },

    /// Render a WAV file through a model
    #[command(name = "render")]
    Render {
        /// Path to the descriptor JSON
        #[arg(short, long)]
        model: PathBuf,

        /// Input WAV file (mixed down to mono)
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float mono)
        #[arg(short, long)]
        output: PathBuf,

        /// Samples handed to the engine per call, as an audio callback would
        #[arg(short, long, default_value_t = commands::DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },
}
