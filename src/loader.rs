// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration loading
//!
//! The graph builder reads configuration files through the [`ConfigLoader`]
//! trait so it never depends on a particular file format or on the
//! filesystem. [`FileLoader`] parses YAML, TOML or JSON by extension;
//! [`MemoryLoader`] serves records that are already in memory.

use crate::types::Config;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading, parsing or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid YAML
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid TOML
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid JSON
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension is not a known configuration format
    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The configuration parsed but breaks a rule
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
    /// JSON (`.json`)
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Whether a file name ends in a configuration extension
    #[must_use]
    pub fn is_config_file(name: &str) -> bool {
        Self::from_path(Path::new(name)).is_some()
    }
}

/// Parse configuration text in the given format
///
/// # Errors
///
/// Returns the parser's error when the text is not a valid configuration.
pub fn parse_config(text: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let config = match format {
        ConfigFormat::Yaml => {
            // An empty YAML document is an empty configuration
            if text.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(text)?
            }
        }
        ConfigFormat::Toml => toml::from_str(text)?,
        ConfigFormat::Json => serde_json::from_str(text)?,
    };
    Ok(config)
}

/// Source of configuration records for the graph builder
pub trait ConfigLoader {
    /// Load the configuration record stored at `path`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the record cannot be read or parsed.
    fn load_config(&self, path: &Path) -> Result<Config, ConfigError>;
}

impl<L: ConfigLoader + ?Sized> ConfigLoader for &L {
    fn load_config(&self, path: &Path) -> Result<Config, ConfigError> {
        (**self).load_config(path)
    }
}

/// Loads configuration files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl ConfigLoader for FileLoader {
    fn load_config(&self, path: &Path) -> Result<Config, ConfigError> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let content = fs::read_to_string(path)?;
        parse_config(&content, format)
    }
}

/// Serves configuration records from memory, keyed by absolute path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, Config>,
}

impl MemoryLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record at `path`, replacing any previous one
    pub fn insert(&mut self, path: impl Into<PathBuf>, config: Config) {
        self.files.insert(path.into(), config);
    }

    /// Builder-style variant of [`MemoryLoader::insert`]
    #[must_use]
    pub fn with(mut self, path: impl Into<PathBuf>, config: Config) -> Self {
        self.insert(path, config);
        self
    }
}

impl ConfigLoader for MemoryLoader {
    fn load_config(&self, path: &Path) -> Result<Config, ConfigError> {
        self.files.get(path).cloned().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no configuration registered at {}", path.display()),
            ))
        })
    }
}

// =============================================================================
// Defaults and Validation
// =============================================================================

/// Default worker count
pub const DEFAULT_WORKERS: usize = 10;

/// Default operation timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fill in defaults for unset fields
pub fn apply_defaults(config: &mut Config) {
    if config.version.is_empty() {
        config.version = "1.0".into();
    }
    if config.global.workers == 0 {
        config.global.workers = DEFAULT_WORKERS;
    }
    if config.global.timeout == 0 {
        config.global.timeout = DEFAULT_TIMEOUT_SECS;
    }
    for repo in &mut config.repositories {
        if repo.branch.is_empty() {
            repo.branch = "main".into();
        }
    }
}

/// Check a (merged) configuration against the fleet rules
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] describing the first rule broken.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version.is_empty() {
        return Err(ConfigError::invalid("config version is required"));
    }

    if config.global.workers < 1 {
        return Err(ConfigError::invalid("global.workers must be at least 1"));
    }
    if config.global.workers > 100 {
        return Err(ConfigError::invalid("global.workers cannot exceed 100"));
    }
    if config.global.timeout < 1 {
        return Err(ConfigError::invalid("global.timeout must be at least 1 second"));
    }

    if config.repositories.is_empty() {
        return Err(ConfigError::invalid(
            "at least one repository must be configured",
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for (i, repo) in config.repositories.iter().enumerate() {
        if repo.name.is_empty() {
            return Err(ConfigError::invalid(format!(
                "repository[{i}]: name is required"
            )));
        }
        if !seen.insert(repo.name.as_str()) {
            return Err(ConfigError::invalid(format!(
                "repository[{i}]: duplicate name '{}'",
                repo.name
            )));
        }
        if repo.path.is_empty() {
            return Err(ConfigError::invalid(format!(
                "repository[{i}] ({}): path is required",
                repo.name
            )));
        }
        if repo.url.is_empty() {
            return Err(ConfigError::invalid(format!(
                "repository[{i}] ({}): URL is required",
                repo.name
            )));
        }
        if !Path::new(&repo.path).is_absolute() && config.global.base_path.is_empty() {
            return Err(ConfigError::invalid(format!(
                "repository[{i}] ({}): relative path requires global.basePath to be set",
                repo.name
            )));
        }
    }

    Ok(())
}
