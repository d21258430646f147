//! Configuration loader with multi-source merging

use crate::{GatekeepConfig, config_files};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides (`GATEKEEP_ENGINE__DEFAULT_VERDICT`)
const ENV_PREFIX: &str = "GATEKEEP";

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    user_config: bool,
    env_overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            user_config: true,
            env_overrides: None,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Skip ~/.config/gatekeep/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Read environment overrides from `vars` instead of the process environment
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars);
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<GatekeepConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = GatekeepConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User, project, then local files
        for file in config_files(&self.project_dir, self.user_config) {
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Environment variables (GATEKEEP_ENGINE__DEFAULT_VERDICT=allow)
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(self.env_overrides.map(|vars| vars.into_iter().collect()));
        builder = builder.add_source(environment);

        let config = builder.build().context("Failed to build configuration")?;

        let mut gatekeep_config: GatekeepConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        gatekeep_config
            .validate()
            .context("Configuration failed validation")?;

        gatekeep_config.resolve_paths(&self.project_dir);

        Ok(gatekeep_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
