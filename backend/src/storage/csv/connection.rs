use anyhow::{Context, Result};
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CsvConnection owns the data directory layout:
///
/// ```text
/// data/
/// ├── guardian_config.yaml
/// ├── household.yaml
/// ├── activity.csv
/// ├── step_up_attempts.csv
/// ├── children/<child id>.yaml
/// └── approvals/<approval id>.yaml
/// ```
#[derive(Clone, Debug)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Create a new connection rooted at `base_directory`, creating it if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .with_context(|| format!("creating data directory {}", base_path.display()))?;
        }
        Ok(Self {
            base_directory: base_path,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn children_directory(&self) -> PathBuf {
        self.base_directory.join("children")
    }

    pub fn approvals_directory(&self) -> PathBuf {
        self.base_directory.join("approvals")
    }

    pub fn household_path(&self) -> PathBuf {
        self.base_directory.join("household.yaml")
    }

    pub fn activity_path(&self) -> PathBuf {
        self.base_directory.join("activity.csv")
    }

    pub fn step_up_attempts_path(&self) -> PathBuf {
        self.base_directory.join("step_up_attempts.csv")
    }

    /// File name for an entity id; `child::abc` becomes `child_abc.yaml`
    pub fn entity_file_name(id: &str) -> String {
        let safe: String = id
            .replace("::", "_")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("{}.yaml", safe)
    }

    /// Serialize `value` to YAML and replace `path` atomically via a temp file
    pub fn write_yaml_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let yaml_content = serde_yaml::to_string(value)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, path)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Read a YAML document, `None` when the file does not exist
    pub fn read_yaml<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let yaml_content = fs::read_to_string(path)?;
        let value = serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entity_file_name_is_filesystem_safe() {
        assert_eq!(CsvConnection::entity_file_name("child::1a2b"), "child_1a2b.yaml");
        assert_eq!(CsvConnection::entity_file_name("../evil"), "___evil.yaml");
    }

    #[test]
    fn test_yaml_round_trip_and_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path().join("nested")).unwrap();
        let path = connection.base_directory().join("sample.yaml");

        let missing: Option<Vec<String>> = connection.read_yaml(&path).unwrap();
        assert!(missing.is_none());

        connection.write_yaml_atomic(&path, &vec!["a".to_string()]).unwrap();
        let loaded: Option<Vec<String>> = connection.read_yaml(&path).unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string()]));
        assert!(!path.with_extension("tmp").exists());
    }
}
