//! Satchel CLI
//!
//! Operator tools for Satchel stores and backup files.
//!
//! # Commands
//!
//! - `export` - Write a portable backup of a store to a file
//! - `import` - Verify and apply a portable backup to a store
//! - `inspect` - Show metadata and integrity of a backup file
//! - `queue` - Show sync queue diagnostics, optionally re-queue
//!   failed items

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Satchel command-line store and backup tools.
#[derive(Parser)]
#[command(name = "satchel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a portable backup of a store to a file
    Export {
        /// Path to the store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Verify and apply a portable backup to a store
    Import {
        /// Path to the store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Backup file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show metadata and integrity of a backup file
    Inspect {
        /// Backup file to inspect
        #[arg(short, long)]
        file: PathBuf,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show sync queue diagnostics
    Queue {
        /// Path to the store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Reset failed items back to pending
        #[arg(long)]
        requeue: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Export { store, out } => commands::export::run(&store, &out)?,
        Commands::Import { store, file } => commands::import::run(&store, &file)?,
        Commands::Inspect { file, format } => commands::inspect::run(&file, &format)?,
        Commands::Queue { store, requeue } => commands::queue::run(&store, requeue)?,
        Commands::Version => {
            println!("satchel {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
