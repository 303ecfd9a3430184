mod catalog;
mod dispatch;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modledger")]
#[command(about = "Inspect and maintain a mod install ledger", long_about = None)]
struct Cli {
    /// Ledger root; defaults to $MODLEDGER_ROOT or a per-user directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered mods and their keys.
    Mods {
        /// Include hidden mods and sentinel installers.
        #[arg(long)]
        all: bool,
    },
    /// Show who installed an item, oldest first.
    Owners {
        #[command(subcommand)]
        item: OwnedItem,
    },
    /// Show everything a mod owns.
    Owned { mod_path: String },
    /// Compare recorded mod versions with `<mod>.toml` descriptors.
    Outdated {
        #[arg(long)]
        mods_dir: PathBuf,
    },
    /// Remove a mod and everything it owns from the ledger.
    Forget { mod_path: String },
    /// Load the install log and print what it tracks.
    Verify,
}

#[derive(Subcommand, Debug)]
enum OwnedItem {
    File {
        path: String,
    },
    Ini {
        file: String,
        section: String,
        key: String,
    },
    Value {
        key: String,
    },
}

fn main() -> Result<()> {
    init_tracing();
    dispatch::run_cli(Cli::parse())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests;
