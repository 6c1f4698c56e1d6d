// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration validation command

use super::{render_hierarchy, Invocation};
use crate::graph::{NodeType, RepositoryGraph};
use crate::loader::{apply_defaults, validate_config};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

/// Check the merged configuration of a built graph
///
/// # Errors
///
/// Returns the first rule the merged configuration breaks.
pub fn check(graph: &RepositoryGraph) -> Result<()> {
    let mut merged = graph.merged_config();
    apply_defaults(&mut merged);
    validate_config(&merged).context("Merged configuration is invalid")
}

/// Validate the configuration hierarchy
///
/// # Errors
///
/// Fails when any file cannot be loaded, the graph is inconsistent, or the
/// merged configuration is invalid.
pub fn run(inv: &Invocation) -> Result<()> {
    println!("Validating configuration file: {}", inv.config_path.display());
    println!();

    let outcome = inv.load_graph().and_then(|graph| {
        print!("{}", render_hierarchy(&graph, inv)?);
        check(&graph)?;
        Ok(graph)
    });

    match outcome {
        Ok(graph) => {
            let files = graph.get_nodes_by_type(NodeType::Config).len();
            info!(files, "Configuration validated");
            let mark = if inv.color {
                "✓".green().to_string()
            } else {
                "✓".to_string()
            };
            println!("\n{mark} Configuration valid ({files} files)");
            Ok(())
        }
        Err(err) => {
            let mark = if inv.color {
                "✗".red().to_string()
            } else {
                "✗".to_string()
            };
            eprintln!("{mark} Configuration validation failed: {err:#}");
            Err(err)
        }
    }
}
