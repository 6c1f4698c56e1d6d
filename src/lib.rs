// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Repograph library - configuration graph for repository fleets
//!
//! A fleet is described by a hierarchy of configuration files that include
//! one another, declare repositories and groups, and attach tags and labels
//! at any level. This crate resolves that hierarchy into a single indexed
//! graph and answers hierarchy, scope and inheritance queries over it.
//!
//! ```no_run
//! use repograph::graph::GraphBuilder;
//! use repograph::loader::FileLoader;
//!
//! let graph = GraphBuilder::new(FileLoader).build("configs/root.yaml")?;
//! for (group, members) in graph.groups_for_display() {
//!     println!("{group}: {}", members.join(", "));
//! }
//! # Ok::<(), repograph::error::GraphError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;

/// Configuration record types, as authored in fleet configuration files
pub mod types {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;

    // =========================================================================
    // Repository
    // =========================================================================

    /// A single repository declared in a configuration file
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Repository {
        /// Repository name, unique across the whole include hierarchy
        pub name: String,
        /// Checkout path, absolute or relative to `global.basePath`
        #[serde(default)]
        pub path: String,
        /// Remote URL
        #[serde(default)]
        pub url: String,
        /// Branch to track
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub branch: String,
        /// Named shell commands
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
        pub commands: BTreeMap<String, String>,
        /// Environment for commands run in this repository
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
        pub environment: BTreeMap<String, String>,
        /// Key/value tags
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
        pub tags: BTreeMap<String, Value>,
        /// Plain labels
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
        pub labels: Vec<String>,
        /// Disabled repositories stay in the graph but are skipped by operations
        #[serde(default, skip_serializing_if = "is_false")]
        pub disabled: bool,
    }

    // =========================================================================
    // Global Settings
    // =========================================================================

    /// Settings that apply to a whole configuration file
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GlobalConfig {
        /// Base directory for relative repository paths
        #[serde(default)]
        pub base_path: String,
        /// Worker count for parallel operations
        #[serde(default)]
        pub workers: usize,
        /// Per-operation timeout in seconds
        #[serde(default, deserialize_with = "deserialize_timeout")]
        pub timeout: u64,
        /// Environment shared by every repository in scope
        #[serde(default, deserialize_with = "null_as_default")]
        pub environment: BTreeMap<String, String>,
        /// Key/value tags attached to the file itself
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
        pub tags: BTreeMap<String, Value>,
        /// Plain labels attached to the file itself
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
        pub labels: Vec<String>,
    }

    // =========================================================================
    // Configuration File
    // =========================================================================

    /// One configuration file
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Config {
        /// Schema version
        #[serde(default)]
        pub version: String,
        /// Included files, relative to this file's directory unless absolute
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
        pub includes: Vec<String>,
        /// File-wide settings
        #[serde(default)]
        pub global: GlobalConfig,
        /// Repositories declared here
        #[serde(default, deserialize_with = "null_as_default")]
        pub repositories: Vec<Repository>,
        /// Group name to explicit member names; an empty list inherits the scope
        #[serde(default, deserialize_with = "deserialize_groups")]
        pub groups: BTreeMap<String, Vec<String>>,
        /// Named templates
        #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
        pub templates: BTreeMap<String, Value>,
    }

    /// Render a tag value the way it appears in IDs and listings
    ///
    /// Strings are shown bare; other scalars use their JSON spelling.
    #[must_use]
    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Parse a duration such as `300`, `300s`, `5m` or `1h30m` into seconds
    #[must_use]
    pub fn parse_duration_secs(text: &str) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(secs) = text.parse::<u64>() {
            return Some(secs);
        }

        let mut total: u64 = 0;
        let mut digits = String::new();
        for c in text.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let amount: u64 = digits.parse().ok()?;
            digits.clear();
            let unit = match c {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total = total.checked_add(amount.checked_mul(unit)?)?;
        }

        // Trailing digits without a unit are not a duration
        if digits.is_empty() {
            Some(total)
        } else {
            None
        }
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    fn is_false(value: &bool) -> bool {
        !*value
    }

    fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    fn deserialize_groups<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Option<Vec<String>>>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(|(name, members)| (name, members.unwrap_or_default()))
            .collect())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimeout {
        Secs(u64),
        Text(String),
    }

    fn deserialize_timeout<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawTimeout>::deserialize(deserializer)? {
            None => Ok(0),
            Some(RawTimeout::Secs(secs)) => Ok(secs),
            Some(RawTimeout::Text(text)) => parse_duration_secs(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid duration: {text}"))),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_duration_secs() {
            assert_eq!(parse_duration_secs("300"), Some(300));
            assert_eq!(parse_duration_secs("300s"), Some(300));
            assert_eq!(parse_duration_secs("5m"), Some(300));
            assert_eq!(parse_duration_secs("1h30m"), Some(5400));
            assert_eq!(parse_duration_secs("5x"), None);
            assert_eq!(parse_duration_secs("1h30"), None);
            assert_eq!(parse_duration_secs(""), None);
        }

        #[test]
        fn test_value_to_string() {
            assert_eq!(value_to_string(&Value::from("prod")), "prod");
            assert_eq!(value_to_string(&Value::from(1)), "1");
            assert_eq!(value_to_string(&Value::from(true)), "true");
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::GraphError;
    pub use crate::graph::{
        GraphBuilder, GraphNode, NodeType, RelationType, Relationship, RepositoryGraph,
    };
    pub use crate::loader::{ConfigLoader, FileLoader, MemoryLoader};
    pub use crate::types::*;
    pub use anyhow::{Context, Result};
}
