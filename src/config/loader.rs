//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::{ConfigError, RunSettings};

/// File name searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".relaunch.toml";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
    /// Whether a missing file is an error.
    required: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .relaunch.toml
        search_paths.push(PathBuf::from(LOCAL_CONFIG_FILE));

        // 2. User config directory: ~/.config/relaunch/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("relaunch").join("config.toml"));
        }

        Self {
            search_paths,
            required: false,
        }
    }

    /// Create a config loader for an explicitly named file, which must exist.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
            required: true,
        }
    }

    /// Load settings from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if an explicitly named file is missing.
    pub fn load(&self) -> Result<RunSettings, ConfigError> {
        if let Some(path) = self.find_config_file() {
            tracing::debug!(path = %path.display(), "Loading config file");
            return Self::load_from_path(&path);
        }

        if self.required {
            if let Some(path) = self.search_paths.first() {
                return Err(ConfigError::NotFound(path.clone()));
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(RunSettings::default())
    }

    /// Load settings from a specific path.
    fn load_from_path(path: &Path) -> Result<RunSettings, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.is_file()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
