//! Analysis settings.
//!
//! Settings come from the first config file found in this order:
//! `--config`, `./.arbor/config.json`, `<config dir>/arbor/config.json`.
//! Without any file the defaults apply. Missing keys fall back to their
//! default as well, so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory holding the per-project config.
pub const ARBOR_DIR: &str = ".arbor";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Scale betweenness centrality to `[0, 1]`.
    pub normalized: bool,

    /// Arbors with more nodes than this get slab centrality instead of the
    /// exact betweenness centrality.
    pub slab_centrality_threshold: usize,

    /// How many nodes ranking commands list.
    pub top: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            normalized: false,
            slab_centrality_threshold: 10_000,
            top: 10,
        }
    }
}

impl AnalysisConfig {
    /// Loads the config for the current directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let user_dir = dirs::config_dir().map(|dir| dir.join("arbor"));
        Self::load_from(explicit, &cwd, user_dir.as_deref())
    }

    /// Loads the config, looking in `project_dir` and `user_dir`.
    ///
    /// An explicit path must exist; the other locations are optional.
    pub fn load_from(
        explicit: Option<&Path>,
        project_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::read(path);
        }

        let candidates = [
            Some(project_dir.join(ARBOR_DIR).join(CONFIG_FILE)),
            user_dir.map(|dir| dir.join(CONFIG_FILE)),
        ];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::read(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_files() {
        let project = TempDir::new().unwrap();
        let config = AnalysisConfig::load_from(None, project.path(), None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.slab_centrality_threshold, 10_000);
    }

    #[test]
    fn test_project_config_wins_over_user_config() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_config(&project.path().join(ARBOR_DIR), r#"{"top": 3}"#);
        write_config(user.path(), r#"{"top": 7, "normalized": true}"#);

        let config =
            AnalysisConfig::load_from(None, project.path(), Some(user.path())).unwrap();
        assert_eq!(config.top, 3);
        // Missing keys take their defaults, not the user file's
        assert!(!config.normalized);
    }

    #[test]
    fn test_user_config_fallback() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_config(user.path(), r#"{"normalized": true}"#);

        let config =
            AnalysisConfig::load_from(None, project.path(), Some(user.path())).unwrap();
        assert!(config.normalized);
        assert_eq!(config.top, 10);
    }

    #[test]
    fn test_explicit_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), r#"{"slab_centrality_threshold": 50}"#);
        let config = AnalysisConfig::load_from(Some(&path), dir.path(), None).unwrap();
        assert_eq!(config.slab_centrality_threshold, 50);

        let missing = dir.path().join("nope.json");
        assert!(matches!(
            AnalysisConfig::load_from(Some(&missing), dir.path(), None),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), r#"{"top": "many"}"#);
        assert!(matches!(
            AnalysisConfig::load_from(Some(&path), dir.path(), None),
            Err(ConfigError::Parse { .. })
        ));
    }
}
