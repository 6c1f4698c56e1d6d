// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Application settings and root configuration discovery

use anyhow::{bail, Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names searched for when no root configuration is given
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "repograph.yaml",
    "repograph.yml",
    ".repograph.yaml",
    ".repograph.yml",
];

const EXAMPLE_CONFIG: &str = r#"version: "1.0"
global:
  basePath: ~/src
repositories:
  - name: example
    path: example
    url: https://github.com/example/example.git
"#;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Root configuration file used when none is passed on the command line
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    /// Directory name whose descendants name hierarchy levels
    pub hierarchy_anchor: String,
    /// Name included files outside the anchor directory after their file stem
    pub stem_names: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Colour terminal output
    pub color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: None,
            hierarchy_anchor: crate::graph::DEFAULT_HIERARCHY_ANCHOR.to_string(),
            stem_names: false,
            log_level: "info".to_string(),
            color: true,
        }
    }
}

impl Settings {
    /// Load defaults, then the user settings file, then `REPOGRAPH_*` variables
    ///
    /// # Errors
    ///
    /// Fails when the settings file or an environment value is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(settings_path().as_deref())
    }

    /// Like [`Settings::load`] with an explicit settings file
    ///
    /// # Errors
    ///
    /// Fails when the settings file or an environment value is malformed.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("hierarchy_anchor", defaults.hierarchy_anchor)?
            .set_default("stem_names", defaults.stem_names)?
            .set_default("log_level", defaults.log_level)?
            .set_default("color", defaults.color)?;
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file.to_path_buf()).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("REPOGRAPH"));

        builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Failed to parse settings")
    }
}

/// Location of the user settings file
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "hyperpolymath", "repograph")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

/// Pick the root configuration file: command line, then settings, then discovery
///
/// # Errors
///
/// Fails when nothing is configured and discovery finds no file.
pub fn resolve_config_path(cli: Option<PathBuf>, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = cli.or_else(|| settings.config_file.clone()) {
        return Ok(path);
    }
    discover_config_path()
}

/// Search the current and home directories for a root configuration file
///
/// # Errors
///
/// Fails with the searched locations and an example file when none exists.
pub fn discover_config_path() -> Result<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(base) = BaseDirs::new() {
        dirs.push(base.home_dir().to_path_buf());
    }
    discover_in(&dirs)
}

/// Search `dirs` in order for the first known configuration file name
///
/// # Errors
///
/// Fails with the searched locations and an example file when none exists.
pub fn discover_in(dirs: &[PathBuf]) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let searched: Vec<String> = candidates
        .iter()
        .map(|path| format!("  {}", path.display()))
        .collect();
    bail!(
        "No configuration file found. Searched:\n{}\n\nCreate one, for example repograph.yaml:\n\n{}",
        searched.join("\n"),
        EXAMPLE_CONFIG
    )
}
