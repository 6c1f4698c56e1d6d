// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Merged configuration output

use super::Invocation;
use crate::graph::RepositoryGraph;
use anyhow::{Context, Result};
use clap::ValueEnum;

/// Output format for the merged configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConfigOutput {
    /// YAML
    #[default]
    Yaml,
    /// JSON
    Json,
    /// TOML
    Toml,
}

/// Serialise the merged configuration of a graph
///
/// # Errors
///
/// Fails if the configuration cannot be represented in `format`.
pub fn render(graph: &RepositoryGraph, format: ConfigOutput) -> Result<String> {
    let merged = graph.merged_config();
    match format {
        ConfigOutput::Yaml => serde_yaml::to_string(&merged).context("Failed to serialise YAML"),
        ConfigOutput::Json => {
            serde_json::to_string_pretty(&merged).context("Failed to serialise JSON")
        }
        ConfigOutput::Toml => toml::to_string_pretty(&merged).context("Failed to serialise TOML"),
    }
}

/// Print the merged configuration
///
/// # Errors
///
/// Fails when the graph cannot be built or serialised.
pub fn run(inv: &Invocation, format: ConfigOutput) -> Result<()> {
    let graph = inv.load_graph()?;
    let format = if inv.json { ConfigOutput::Json } else { format };
    println!("{}", render(&graph, format)?.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::make_fleet;
    use crate::loader::{parse_config, ConfigFormat};

    #[test]
    fn test_yaml_output_parses_back() {
        let graph = make_fleet();
        let yaml = render(&graph, ConfigOutput::Yaml).unwrap();
        let config = parse_config(&yaml, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.repositories.len(), 3);
        assert_eq!(config.groups, graph.groups_for_display());
    }

    #[test]
    fn test_json_output() {
        let json = render(&make_fleet(), ConfigOutput::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["repositories"][0]["name"], "api");
        assert_eq!(value["global"]["workers"], 8);
    }
}
