//! Configuration management for Gatekeep
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (GATEKEEP_* prefix, highest precedence)
//! 2. gatekeep.local.toml (gitignored, local overrides)
//! 3. gatekeep.toml (git-tracked, project config)
//! 4. ~/.config/gatekeep/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Nested keys in environment variables are separated by a double
//! underscore: `GATEKEEP_ENGINE__DEFAULT_VERDICT=allow`.

use gatekeep_engine::{AmbiguityPolicy, EngineSettings};
use gatekeep_types::Verdict;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::config_files;

/// Main Gatekeep configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeepConfig {
    pub engine: EngineConfig,
    pub snapshot: SnapshotConfig,
    pub logging: LoggingConfig,
}

/// Decision behaviour not carried by the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_verdict: Verdict,
    pub ambiguity_policy: AmbiguityPolicy,
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_verdict: config.default_verdict,
            ambiguity_policy: config.ambiguity_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// JSON snapshot file. Relative paths resolve against the project dir.
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("snapshot.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins over it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl GatekeepConfig {
    /// Engine settings derived from the `[engine]` table
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::from(&self.engine)
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.snapshot.path.is_relative() {
            self.snapshot.path = base.join(&self.snapshot.path);
        }
    }

    /// Reject values that deserialize but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "snapshot.path must not be empty".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the configuration as a TOML document
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatekeepConfig::default();
        assert_eq!(config.engine.default_verdict, Verdict::Deny);
        assert_eq!(config.engine.ambiguity_policy, AmbiguityPolicy::RequireUnique);
        assert_eq!(config.snapshot.path, PathBuf::from("snapshot.json"));
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_settings_conversion() {
        let config = GatekeepConfig {
            engine: EngineConfig {
                default_verdict: Verdict::Allow,
                ambiguity_policy: AmbiguityPolicy::LowestIdentity,
            },
            ..Default::default()
        };

        let settings = config.engine_settings();
        assert_eq!(settings.default_verdict, Verdict::Allow);
        assert_eq!(settings.ambiguity_policy, AmbiguityPolicy::LowestIdentity);
    }

    #[test]
    fn test_path_resolution() {
        let mut config = GatekeepConfig::default();
        config.resolve_paths("/srv/gatekeep");
        assert_eq!(
            config.snapshot.path,
            PathBuf::from("/srv/gatekeep/snapshot.json")
        );

        config.snapshot.path = PathBuf::from("/var/lib/gatekeep/live.json");
        config.resolve_paths("/srv/gatekeep");
        assert_eq!(
            config.snapshot.path,
            PathBuf::from("/var/lib/gatekeep/live.json")
        );
    }

    #[test]
    fn test_validation_rejects_empty_filter() {
        let mut config = GatekeepConfig::default();
        config.logging.filter = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let config = GatekeepConfig {
            engine: EngineConfig {
                default_verdict: Verdict::Allow,
                ambiguity_policy: AmbiguityPolicy::AnyMatchGrants,
            },
            ..Default::default()
        };

        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("ambiguity_policy = \"any-match-grants\""));

        let parsed: GatekeepConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
