//! Where snapshot data comes from.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;
use crate::model::SnapshotData;

/// Produces a complete, versioned [`SnapshotData`] bundle.
pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<SnapshotData, SourceError>;
}

/// Already-loaded data is its own source.
impl SnapshotSource for SnapshotData {
    fn load(&self) -> Result<SnapshotData, SourceError> {
        Ok(self.clone())
    }
}

/// Reads a JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn load(&self) -> Result<SnapshotData, SourceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;

        let data: SnapshotData =
            serde_json::from_str(&content).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), version = data.version, "Read snapshot file");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_json_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(
            &path,
            r#"{
                "version": 3,
                "access_point_types": [{ "id": 1, "name": "office" }],
                "identities": [{ "id": 1, "card": "a1b2c3d4" }],
                "expressions": [
                    { "id": 1, "name": "staff", "edges": [
                        { "op": "include", "target": { "identity": 1 } }
                    ] }
                ]
            }"#,
        )
        .unwrap();

        let data = JsonFileSource::new(&path).load().unwrap();
        assert_eq!(data.version, 3);
        assert_eq!(data.identities[0].card.to_string(), "a1b2c3d4");
        assert_eq!(data.expressions[0].edges.len(), 1);
        assert!(data.rules.is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let result = JsonFileSource::new(dir.path().join("absent.json")).load();
        assert!(matches!(result, Err(SourceError::Read { .. })));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "{ not json").unwrap();

        let result = JsonFileSource::new(&path).load();
        assert!(matches!(result, Err(SourceError::Parse { .. })));
    }
}
