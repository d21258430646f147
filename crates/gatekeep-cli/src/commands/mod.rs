//! CLI command implementations.

pub mod check;
pub mod config;
pub mod decide;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};
use gatekeep_config::GatekeepConfig;
use gatekeep_engine::{JsonFileSource, Snapshot, SnapshotSource};

/// Reads and compiles the snapshot named on the command line, or the
/// configured one.
fn load_snapshot(config: &GatekeepConfig, path: Option<PathBuf>) -> Result<Snapshot> {
    let path = path.unwrap_or_else(|| config.snapshot.path.clone());
    let data = JsonFileSource::new(&path)
        .load()
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
    Ok(Snapshot::compile(data))
}
