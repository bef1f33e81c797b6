//! prefixsync — deploy versioned scripts into an installation prefix without
//! clobbering local changes.
//!
//! # Usage
//!
//! ```text
//! prefixsync sync --prefix <dir> --eessi-version <ver> --manifest <file>
//!                 [--source-root <dir>] [--pr-diff <file>] [--dry-run] [--json]
//! prefixsync diff --prefix <dir> --manifest <file> [--source-root <dir>] [--pr-diff <file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "prefixsync",
    version,
    about = "Deploy versioned files into an installation prefix, protecting local edits",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy manifest files into the prefix and stamp the version.
    Sync(SyncArgs),

    /// Show unified diffs between installed files and their sources.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
