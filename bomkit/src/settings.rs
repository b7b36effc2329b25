//! Per-project settings stored as `bomkit.json` next to the project.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomically;
use crate::rounding::RoundingPolicy;

pub const SETTINGS_FILE: &str = "bomkit.json";
pub const DEFAULT_CACHE_FILE: &str = "components_cache.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Component cache file, relative to the project directory unless absolute.
    pub cache_file: PathBuf,
    pub rounding: RoundingPolicy,
    pub global_multiplier: u64,
    pub default_multiplier: u64,
    pub default_adder: u64,
    /// Row keys left out of the BOM.
    pub disabled: BTreeSet<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            rounding: RoundingPolicy::default(),
            global_multiplier: 1,
            default_multiplier: 1,
            default_adder: 0,
            disabled: BTreeSet::new(),
        }
    }
}

impl ProjectSettings {
    /// Load from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `bomkit.json` from a project directory.
    pub fn load_for_project(project_dir: &Path) -> Result<Self, SettingsError> {
        Self::load(&project_dir.join(SETTINGS_FILE))
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomically(path, json.as_bytes()).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn cache_path(&self, project_dir: &Path) -> PathBuf {
        if self.cache_file.is_absolute() {
            self.cache_file.clone()
        } else {
            project_dir.join(&self.cache_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = ProjectSettings::load_for_project(dir.path()).unwrap();
        assert_eq!(settings, ProjectSettings::default());
        assert_eq!(
            settings.cache_path(dir.path()),
            dir.path().join("components_cache.json")
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"rounding":{"digit":5,"exponent":1},"global_multiplier":3}"#).unwrap();
        let settings = ProjectSettings::load(&path).unwrap();
        assert_eq!(settings.rounding.base(), 50);
        assert_eq!(settings.global_multiplier, 3);
        assert_eq!(settings.default_multiplier, 1);
    }

    #[test]
    fn test_invalid_rounding_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"rounding":{"digit":3,"exponent":0}}"#).unwrap();
        assert!(matches!(
            ProjectSettings::load(&path),
            Err(SettingsError::Json { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut settings = ProjectSettings::default();
        settings.default_adder = 2;
        settings.disabled.insert("R1".to_string());
        settings.save(&path).unwrap();
        assert_eq!(ProjectSettings::load(&path).unwrap(), settings);
    }
}
