//! Single decision command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use gatekeep_config::GatekeepConfig;
use gatekeep_engine::{AccessDecisionEngine, EventTime, SnapshotHandle};
use gatekeep_types::{AccessPointId, Card};

/// Evaluate one card presentation and print the decision record as JSON.
pub fn run(
    config: &GatekeepConfig,
    path: Option<PathBuf>,
    card: &Card,
    access_point: u64,
    at: Option<DateTime<FixedOffset>>,
    unknown_time: bool,
) -> Result<()> {
    let snapshot = super::load_snapshot(config, path)?;

    let time = if unknown_time {
        EventTime::Unknown
    } else {
        at.map_or_else(|| EventTime::from(Utc::now()), EventTime::Known)
    };

    let engine = AccessDecisionEngine::new(SnapshotHandle::new(snapshot), config.engine_settings());
    let record = engine.decide(card, AccessPointId::new(access_point), time);

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
