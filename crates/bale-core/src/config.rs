//! Configuration module

use crate::stream::DEFAULT_GZIP_LEVEL;
use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Behavior shared by plain and compressed tar archives
    pub tar: TarOptions,
    /// Gzip framing settings
    pub gzip: GzipOptions,
}

/// Tar archiving behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TarOptions {
    /// Overwrite existing files; otherwise an existing file is an error
    pub overwrite_existing: bool,
    /// Create missing directories leading up to the destination
    pub mkdir_all: bool,
    /// Wrap archives (or extracted trees) that lack a single common root in
    /// one folder named after the archive, so nothing litters the
    /// destination
    pub implicit_top_level_folder: bool,
    /// Log and skip per-file failures instead of aborting
    pub continue_on_error: bool,
}

impl Default for TarOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            mkdir_all: true,
            implicit_top_level_folder: false,
            continue_on_error: false,
        }
    }
}

/// Gzip configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GzipOptions {
    /// Compression level (0-9)
    pub level: u32,
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir().ok_or_else(|| {
            Error::Config("Unable to determine config directory".to_string())
        })?;
        Ok(config_dir.join("bale").join("config.toml"))
    }

    /// Get default configuration content with comments
    pub fn default_config_content() -> String {
        format!(
            r#"# bale configuration file

[tar]
# Overwrite files that already exist at the destination
overwrite_existing = false
# Create missing parent directories of the destination
mkdir_all = true
# Nest archives without a common root under a folder named after the archive
implicit_top_level_folder = false
# Log and skip failures on individual files instead of aborting
continue_on_error = false

[gzip]
# Compression level, 0 (store) to 9 (best)
level = {}
"#,
            DEFAULT_GZIP_LEVEL
        )
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.gzip.level > 9 {
            return Err(Error::Config(format!(
                "gzip level must be between 0 and 9, got {}",
                self.gzip.level
            )));
        }
        Ok(())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::at(path, e))?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from the default location; a missing file yields
    /// the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::at(parent, e))?;
        }
        fs::write(path, contents).map_err(|e| Error::at(path, e))?;
        Ok(())
    }

    /// Load configuration or use defaults if loading fails
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
