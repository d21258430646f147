//! Where configuration files live

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Project config file name (git-tracked)
const PROJECT_CONFIG_FILE: &str = "gatekeep.toml";

/// Local override file name (gitignored)
const LOCAL_CONFIG_FILE: &str = "gatekeep.local.toml";

/// User defaults file (~/.config/gatekeep/config.toml on Linux)
///
/// `None` when the platform has no home directory to resolve against.
fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "Gatekeep", "gatekeep")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Existing config files for `project_dir`, lowest precedence first
pub fn config_files(project_dir: &Path, include_user: bool) -> Vec<PathBuf> {
    let user = include_user.then(user_config_file).flatten();
    user.into_iter()
        .chain([
            project_dir.join(PROJECT_CONFIG_FILE),
            project_dir.join(LOCAL_CONFIG_FILE),
        ])
        .filter(|path| path.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_user_config_file() {
        // Platform dependent; only checks the app name when discovery works
        if let Some(config_file) = user_config_file() {
            assert!(config_file.to_string_lossy().contains("gatekeep"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_config_files_in_precedence_order() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();
        assert!(config_files(project_dir, false).is_empty());

        std::fs::write(project_dir.join(LOCAL_CONFIG_FILE), "").unwrap();
        std::fs::write(project_dir.join(PROJECT_CONFIG_FILE), "").unwrap();

        assert_eq!(
            config_files(project_dir, false),
            vec![
                project_dir.join("gatekeep.toml"),
                project_dir.join("gatekeep.local.toml"),
            ]
        );
    }

    #[test]
    fn test_directory_named_like_config_is_skipped() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        std::fs::create_dir(temp_dir.path().join(PROJECT_CONFIG_FILE)).unwrap();
        assert!(config_files(temp_dir.path(), false).is_empty());
    }
}
