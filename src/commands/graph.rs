// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph overview command

use super::{render_hierarchy, used_by, Invocation};
use crate::graph::{GraphStats, NodeType, RelationType, RepositoryGraph};
use crate::types::value_to_string;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Serialize)]
struct Classification {
    explicit: usize,
    derived: usize,
    config: usize,
    logical: usize,
}

#[derive(Debug, Serialize)]
struct RepositorySummary {
    name: String,
    scope: String,
    disabled: bool,
}

#[derive(Debug, Serialize)]
struct MarkerSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    scope: String,
    used_by: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Overview {
    stats: GraphStats,
    classification: Classification,
    groups: BTreeMap<String, Vec<String>>,
    repositories: Vec<RepositorySummary>,
    tags: Vec<MarkerSummary>,
    labels: Vec<MarkerSummary>,
}

fn overview(graph: &RepositoryGraph) -> Overview {
    let repositories = graph
        .get_nodes_by_type(NodeType::Repository)
        .into_iter()
        .map(|node| RepositorySummary {
            name: node.name.clone(),
            scope: node.full_path().to_string(),
            disabled: super::is_disabled(node),
        })
        .collect();

    let tags = graph
        .get_nodes_by_type(NodeType::Tag)
        .into_iter()
        .filter_map(|node| {
            node.tag().map(|tag| MarkerSummary {
                name: tag.name.clone(),
                value: Some(value_to_string(&tag.value)),
                scope: tag.scope.clone(),
                used_by: used_by(graph, &node.id, RelationType::TaggedWith),
            })
        })
        .collect();

    let labels = graph
        .get_nodes_by_type(NodeType::Label)
        .into_iter()
        .filter_map(|node| {
            node.label().map(|label| MarkerSummary {
                name: label.name.clone(),
                value: None,
                scope: label.scope.clone(),
                used_by: used_by(graph, &node.id, RelationType::LabeledWith),
            })
        })
        .collect();

    Overview {
        stats: graph.stats(),
        classification: Classification {
            explicit: graph.get_explicit_nodes().len(),
            derived: graph.get_derived_nodes().len(),
            config: graph.get_config_entities().len(),
            logical: graph.get_logical_entities().len(),
        },
        groups: graph.groups_for_display(),
        repositories,
        tags,
        labels,
    }
}

/// Render the text overview
///
/// # Errors
///
/// Only fails if writing to the buffer fails.
pub fn render(graph: &RepositoryGraph, inv: &Invocation) -> Result<String> {
    let view = overview(graph);
    let mut out = String::new();

    writeln!(out, "{}", inv.heading("=== Configuration Graph Overview ==="))?;

    writeln!(out, "\n{}", inv.heading("--- Node Summary ---"))?;
    for node_type in NodeType::ALL.iter().filter(|t| **t != NodeType::Root) {
        let count = view.stats.nodes_by_type.get(node_type).copied().unwrap_or(0);
        writeln!(out, "{:<12}: {count}", node_type.as_str())?;
    }

    writeln!(out, "\n{}", inv.heading("--- Node Classification ---"))?;
    let c = &view.classification;
    writeln!(out, "{:<12}: {} (from configuration files)", "Explicit", c.explicit)?;
    writeln!(out, "{:<12}: {} (computed from config)", "Derived", c.derived)?;
    writeln!(out, "{:<12}: {} (configs + repositories)", "Config", c.config)?;
    writeln!(out, "{:<12}: {} (groups + computed)", "Logical", c.logical)?;

    writeln!(out, "\n{}", inv.heading("--- Relationship Summary ---"))?;
    for relation in RelationType::ALL {
        let count = view
            .stats
            .relationships_by_type
            .get(&relation)
            .copied()
            .unwrap_or(0);
        writeln!(out, "{:<12}: {count}", relation.as_str())?;
    }

    writeln!(out, "\n{}", inv.heading("--- Configuration Hierarchy ---"))?;
    out.push_str(&render_hierarchy(graph, inv)?);

    writeln!(out, "\n{}", inv.heading("--- Repository Groups ---"))?;
    if view.groups.is_empty() {
        writeln!(out, "No groups defined")?;
    }
    for (name, members) in &view.groups {
        writeln!(out, "\n{name} ({} repositories):", members.len())?;
        for member in members {
            writeln!(out, "  • {member}")?;
        }
    }

    writeln!(out, "\n{}", inv.heading("--- Repository Summary ---"))?;
    if view.repositories.is_empty() {
        writeln!(out, "No repositories defined")?;
    }
    for repo in &view.repositories {
        writeln!(
            out,
            "  {} {:<30} {}",
            inv.status(repo.disabled),
            repo.name,
            inv.dim(&format!("(scope: {})", repo.scope))
        )?;
    }

    writeln!(out, "\n{}", inv.heading("--- Tags and Labels ---"))?;
    if view.tags.is_empty() {
        writeln!(out, "\nTags: None defined")?;
    } else {
        writeln!(out, "\nTags ({}):", view.tags.len())?;
        for tag in &view.tags {
            let value = tag.value.as_deref().unwrap_or_default();
            writeln!(out, "  {} = {value} (scope: {})", tag.name, tag.scope)?;
            if !tag.used_by.is_empty() {
                writeln!(out, "      Used by: {}", tag.used_by.join(", "))?;
            }
        }
    }
    if view.labels.is_empty() {
        writeln!(out, "\nLabels: None defined")?;
    } else {
        writeln!(out, "\nLabels ({}):", view.labels.len())?;
        for label in &view.labels {
            writeln!(out, "  {} (scope: {})", label.name, label.scope)?;
            if !label.used_by.is_empty() {
                writeln!(out, "      Used by: {}", label.used_by.join(", "))?;
            }
        }
    }

    Ok(out)
}

/// Show the graph overview
///
/// # Errors
///
/// Fails when the graph cannot be built.
pub fn run(inv: &Invocation) -> Result<()> {
    let graph = inv.load_graph()?;
    if inv.json {
        println!("{}", serde_json::to_string_pretty(&overview(&graph))?);
    } else {
        print!("{}", render(&graph, inv)?);
    }
    Ok(())
}
