// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository listing with scope, tag and label filters

use super::{is_disabled, Invocation};
use crate::graph::{tag_node_id, GraphNode, NodeType, RelationType, RepositoryGraph};
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use tracing::debug;

/// Repository filters; all given filters must match
#[derive(Debug, Clone, Default)]
pub struct RepoFilter {
    /// Scope path such as `root/backend`
    pub scope: Option<String>,
    /// Tag as `name=value`
    pub tag: Option<String>,
    /// Label name
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
struct RepoRow<'a> {
    name: &'a str,
    scope: &'a str,
    url: &'a str,
    branch: &'a str,
    disabled: bool,
}

/// Repositories matching `filter`, in ID order
///
/// # Errors
///
/// Fails when the scope names no node or the tag is not `name=value`.
pub fn select<'g>(graph: &'g RepositoryGraph, filter: &RepoFilter) -> Result<Vec<&'g GraphNode>> {
    let mut selected: Vec<&GraphNode> = graph.get_nodes_by_type(NodeType::Repository);

    if let Some(scope) = &filter.scope {
        let Some(scope_node) = graph.get_nodes_by_path(scope).first().copied() else {
            bail!("No configuration node found at scope '{scope}'");
        };
        let in_scope: BTreeSet<&str> = graph
            .get_repositories_in_scope(&scope_node.id)
            .into_iter()
            .map(|node| node.id.as_str())
            .collect();
        selected.retain(|node| in_scope.contains(node.id.as_str()));
    }

    if let Some(tag) = &filter.tag {
        let Some((name, value)) = tag.split_once('=') else {
            bail!("Tag filter '{tag}' must be written as name=value");
        };
        keep_related(graph, &mut selected, &tag_node_id(name, value), RelationType::TaggedWith);
    }

    if let Some(label) = &filter.label {
        keep_related(graph, &mut selected, &format!("label_{label}"), RelationType::LabeledWith);
    }

    debug!(matched = selected.len(), "Filtered repositories");
    Ok(selected)
}

fn keep_related(graph: &RepositoryGraph, selected: &mut Vec<&GraphNode>, target: &str, relation: RelationType) {
    let sources: BTreeSet<&str> = graph
        .get_incoming_relations(target)
        .into_iter()
        .filter(|rel| rel.relation_type == relation)
        .map(|rel| rel.from.as_str())
        .collect();
    selected.retain(|node| sources.contains(node.id.as_str()));
}

/// Render matching repositories
///
/// # Errors
///
/// Fails when the filter is invalid.
pub fn render(graph: &RepositoryGraph, filter: &RepoFilter, inv: &Invocation) -> Result<String> {
    let repos = select(graph, filter)?;
    let mut out = String::new();

    if repos.is_empty() {
        writeln!(out, "No repositories match")?;
        return Ok(out);
    }

    writeln!(out, "{}", inv.heading(&format!("Repositories ({}):", repos.len())))?;
    for node in repos {
        writeln!(
            out,
            "  {} {:<30} {}",
            inv.status(is_disabled(node)),
            node.name,
            inv.dim(&format!("(scope: {})", node.full_path()))
        )?;
    }
    Ok(out)
}

/// List repositories
///
/// # Errors
///
/// Fails when the graph cannot be built or the filter is invalid.
pub fn run(inv: &Invocation, filter: &RepoFilter) -> Result<()> {
    let graph = inv.load_graph()?;
    if inv.json {
        let rows: Vec<RepoRow<'_>> = select(&graph, filter)?
            .into_iter()
            .filter_map(|node| {
                node.repository().map(|repo| RepoRow {
                    name: &node.name,
                    scope: node.full_path(),
                    url: &repo.url,
                    branch: &repo.branch,
                    disabled: repo.disabled,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render(&graph, filter, inv)?);
    }
    Ok(())
}
