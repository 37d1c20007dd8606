//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules. Each invocation is one-shot: repositories live in memory for
//! the life of the command, blob content persists under the data
//! directory.

mod import;
mod init;
mod status;
mod thumbs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "scenarium")]
#[command(about = "Background work coordination for scenario content management")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory
    Init,

    /// Register media and run an import batch to completion
    Import {
        /// Manifest file (JSON array of scenario definitions)
        manifest: PathBuf,

        /// Directory of media files to register before importing. In the
        /// manifest, media may be referenced by plain file name from this
        /// directory.
        #[arg(short, long)]
        media: Option<PathBuf>,

        /// Batch name (defaults to the manifest file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Seconds to wait for the batch and thumbnails to settle
        #[arg(long, default_value = "60")]
        wait: u64,
    },

    /// Register images from a directory and generate their thumbnails
    Thumbs {
        /// Directory of image files
        dir: PathBuf,

        /// Seconds to wait for the thumbnail backlog to settle
        #[arg(long, default_value = "60")]
        wait: u64,
    },

    /// Show the data directory contents and effective settings
    Status,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Import {
            manifest,
            media,
            name,
            wait,
        } => import::cmd_import(settings, &manifest, media.as_deref(), name, wait).await,
        Commands::Thumbs { dir, wait } => thumbs::cmd_thumbs(settings, &dir, wait).await,
        Commands::Status => status::cmd_status(&settings).await,
    }
}
