//! Gatekeep command line.
//!
//! Validates access snapshots and evaluates single lookups by hand, the way
//! a controller would ask for them.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate a snapshot file
//! gatekeep check --snapshot demos/campus.json
//!
//! # Would card a1b2c3d4 open access point 1 on Monday morning?
//! gatekeep decide --snapshot demos/campus.json \
//!     --card a1b2c3d4 --access-point 1 --at 2024-01-15T09:00:00+01:00
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use gatekeep_config::{ConfigLoader, GatekeepConfig};
use gatekeep_types::Card;
use tracing_subscriber::EnvFilter;

/// Gatekeep - physical access control decisions.
#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(author, version, long_about = None)]
#[command(about = "Gatekeep - physical access control decisions")]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding gatekeep.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Load and validate a snapshot, then report its contents.
    Check {
        /// Snapshot file (defaults to snapshot.path from the configuration).
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Evaluate one card presentation and print the decision record.
    Decide {
        /// Card value as hex.
        #[arg(short, long)]
        card: Card,

        /// Access point id.
        #[arg(short = 'a', long)]
        access_point: u64,

        /// Event time as RFC 3339 (defaults to now).
        #[arg(long, conflicts_with = "unknown_time")]
        at: Option<DateTime<FixedOffset>>,

        /// The controller does not know the time.
        #[arg(long)]
        unknown_time: bool,

        /// Snapshot file (defaults to snapshot.path from the configuration).
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Show the effective configuration.
    Config {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Text)]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Text,
    Toml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    let config = ConfigLoader::new()
        .with_project_dir(&cli.project)
        .load()
        .context("Failed to load configuration")?;

    init_logging(&config);

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Check { snapshot } => commands::check::run(&config, snapshot),
        Commands::Decide {
            card,
            access_point,
            at,
            unknown_time,
            snapshot,
        } => commands::decide::run(&config, snapshot, &card, access_point, at, unknown_time),
        Commands::Config { format } => commands::config::show(&config, &cli.project, format),
    }
}

/// Logs go to stderr so stdout stays machine readable. `RUST_LOG` wins over
/// the configured filter.
fn init_logging(config: &GatekeepConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!style::no_color())
        .init();
}
