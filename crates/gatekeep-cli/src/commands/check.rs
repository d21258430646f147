//! Snapshot validation command.

use std::path::PathBuf;

use anyhow::{bail, Result};
use gatekeep_config::GatekeepConfig;

use crate::style::{
    print_error, print_info_table, print_spacer, print_success, print_warn, SemanticStyle,
};

/// Load a snapshot and report counts, warnings and configuration errors.
///
/// Fails when the snapshot has any configuration error.
pub fn run(config: &GatekeepConfig, path: Option<PathBuf>) -> Result<()> {
    let snapshot = super::load_snapshot(config, path)?;
    let counts = snapshot.counts();

    println!(
        "{}",
        format!("Snapshot version {}", snapshot.version()).header()
    );

    let rows = [
        ("Access point types", counts.access_point_types.to_string()),
        ("Controllers", counts.controllers.to_string()),
        ("Access points", counts.access_points.to_string()),
        ("Identities", counts.identities.to_string()),
        ("Expressions", counts.expressions.to_string()),
        ("Time specs", counts.time_specs.to_string()),
        ("Rules", counts.rules.to_string()),
    ];
    let entries: Vec<(&str, &str)> = rows.iter().map(|(k, v)| (*k, v.as_str())).collect();
    print_info_table(&entries);
    print_spacer();

    for (card, holders) in snapshot.shared_cards() {
        let holders: Vec<String> = holders.iter().map(ToString::to_string).collect();
        print_warn(&format!(
            "Card {card} is held by identities {}",
            holders.join(", ")
        ));
    }

    for repeated in snapshot.expressions().repeated_edges() {
        print_warn(&format!(
            "Expression {} has more than one edge to {}",
            repeated.expression, repeated.target
        ));
    }

    let diagnostics = snapshot.diagnostics();
    if diagnostics.is_empty() {
        print_success("No configuration errors");
        return Ok(());
    }

    for diagnostic in diagnostics {
        print_error(&diagnostic.to_string());
    }
    bail!("{} configuration error(s) found", diagnostics.len())
}
