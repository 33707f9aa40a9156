//! Beacon command-line tool
//!
//! Validates tracking configuration files and answers eligibility queries
//! against them, using the same rule lookup the runtime uses.
//!
//! Log verbosity is controlled by the `BEACON_LOG` environment variable
//! (an `EnvFilter` directive, e.g. `BEACON_LOG=beacon_core=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Call tracking configuration toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and list its rules
    Check {
        /// Configuration file (.toml or .json)
        config: PathBuf,
        /// Print the normalized ruleset as TOML
        #[arg(long)]
        normalize: bool,
    },

    /// Show whether a class/method pair is tracked
    Match {
        /// Configuration file (.toml or .json)
        config: PathBuf,
        /// Class name
        class: String,
        /// Method name
        method: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("BEACON_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, normalize } => commands::check::execute(&config, normalize),
        Commands::Match {
            config,
            class,
            method,
        } => commands::matches::execute(&config, &class, &method),
    }
}
