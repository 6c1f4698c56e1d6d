// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod config;
pub mod export;
pub mod graph;
pub mod groups;
pub mod repos;
pub mod validate;

use crate::graph::{GraphBuilder, GraphNode, NodeType, RelationType, RepositoryGraph};
use crate::loader::FileLoader;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Options shared by every graph command
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Root configuration file
    pub config_path: PathBuf,
    /// Hierarchy anchor directory name
    pub hierarchy_anchor: String,
    /// Name unanchored includes after their file stem
    pub stem_names: bool,
    /// Emit JSON instead of text
    pub json: bool,
    /// Colour text output
    pub color: bool,
}

impl Invocation {
    /// Build the graph for the root configuration file
    ///
    /// # Errors
    ///
    /// Fails when any file cannot be loaded or the graph is inconsistent.
    pub fn load_graph(&self) -> Result<RepositoryGraph> {
        GraphBuilder::new(FileLoader)
            .with_anchor(self.hierarchy_anchor.as_str())
            .with_stem_names(self.stem_names)
            .build(&self.config_path)
            .with_context(|| {
                format!(
                    "Failed to build configuration graph from {}",
                    self.config_path.display()
                )
            })
    }

    /// Section heading
    #[must_use]
    pub fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// `●` for enabled repositories, `○` for disabled ones
    #[must_use]
    pub fn status(&self, disabled: bool) -> String {
        match (disabled, self.color) {
            (false, true) => "●".green().to_string(),
            (true, true) => "○".dimmed().to_string(),
            (false, false) => "●".to_string(),
            (true, false) => "○".to_string(),
        }
    }

    /// De-emphasised text
    #[must_use]
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Whether a repository node is disabled
pub(crate) fn is_disabled(node: &GraphNode) -> bool {
    node.repository().is_some_and(|repo| repo.disabled)
}

/// Names of the entities pointing at a tag or label node
pub(crate) fn used_by(graph: &RepositoryGraph, id: &str, relation: RelationType) -> Vec<String> {
    graph
        .get_incoming_relations(id)
        .into_iter()
        .filter(|rel| rel.relation_type == relation)
        .filter_map(|rel| graph.get_node(&rel.from))
        .map(|node| node.name.clone())
        .collect()
}

/// Configuration include tree with the repositories each file defines
///
/// # Errors
///
/// Only fails if writing to the buffer fails.
pub fn render_hierarchy(graph: &RepositoryGraph, inv: &Invocation) -> Result<String> {
    let mut out = String::new();
    let top = graph.get_children(graph.root().id.as_str(), Some(NodeType::Config));
    if top.is_empty() {
        writeln!(out, "No configuration nodes found")?;
    }
    for config in top {
        writeln!(out, "└── {}", config.name)?;
        render_config(graph, config, "    ", inv, &mut out)?;
    }
    Ok(out)
}

fn render_config(
    graph: &RepositoryGraph,
    node: &GraphNode,
    prefix: &str,
    inv: &Invocation,
    out: &mut String,
) -> Result<()> {
    let children = graph.get_children(&node.id, Some(NodeType::Config));
    let repos = graph.get_children(&node.id, Some(NodeType::Repository));

    for (i, repo) in repos.iter().enumerate() {
        let last = i + 1 == repos.len() && children.is_empty();
        let connector = if last { "└─" } else { "├─" };
        writeln!(out, "{prefix}{connector}{} {}", inv.status(is_disabled(repo)), repo.name)?;
    }

    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let (connector, extension) = if last { ("└──", "    ") } else { ("├──", "│   ") };
        writeln!(out, "{prefix}{connector} {}/", child.name)?;
        render_config(graph, child, &format!("{prefix}{extension}"), inv, out)?;
    }
    Ok(())
}
