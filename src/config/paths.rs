//! Path management for tracklog
//!
//! ## Path Resolution Order
//!
//! 1. `TRACKLOG_DATA_DIR` environment variable (if set)
//! 2. The platform config directory joined with `tracklog`
//!    (`~/.config/tracklog`, `~/Library/Application Support/tracklog`,
//!    `%APPDATA%\tracklog`)

use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::TrackError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "TRACKLOG_DATA_DIR";

/// Manages all paths used by tracklog
#[derive(Debug, Clone)]
pub struct TrackerPaths {
    base_dir: PathBuf,
}

impl TrackerPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, TrackError> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create TrackerPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the JSON-lines change log
    pub fn change_log(&self) -> PathBuf {
        self.base_dir.join("changes.log")
    }

    pub fn ensure_directories(&self) -> Result<(), TrackError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| TrackError::Io(format!("Failed to create base directory: {}", e)))
    }

    /// Check if settings have been written yet
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> Result<PathBuf, TrackError> {
    let dirs = BaseDirs::new()
        .ok_or_else(|| TrackError::Settings("Could not determine home directory".into()))?;
    Ok(dirs.config_dir().join("tracklog"))
}
