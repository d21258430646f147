//! Configuration display command.

use std::path::Path;

use anyhow::Result;
use gatekeep_config::{GatekeepConfig, config_files};

use crate::ConfigFormat;
use crate::style::{print_labeled, print_spacer, SemanticStyle};

/// Show the effective configuration after all sources are merged.
pub fn show(config: &GatekeepConfig, project: &Path, format: ConfigFormat) -> Result<()> {
    match format {
        ConfigFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigFormat::Toml => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigFormat::Text => {
            println!("{}", "Gatekeep Configuration".header());
            print_spacer();

            println!("Engine:");
            print_labeled("Default verdict", &config.engine.default_verdict.to_string());
            print_labeled("Ambiguity policy", &config.engine.ambiguity_policy.to_string());
            print_spacer();

            println!("Snapshot:");
            print_labeled("Path", &config.snapshot.path.display().to_string());
            print_spacer();

            println!("Logging:");
            print_labeled("Filter", &config.logging.filter);
            print_spacer();

            println!("Sources:");
            let files = config_files(project, true);
            if files.is_empty() {
                print_labeled("Files", "none (built-in defaults)");
            }
            for file in files {
                print_labeled("File", &file.display().to_string());
            }
        }
    }

    Ok(())
}
