// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Group listing command

use super::{is_disabled, Invocation};
use crate::graph::RepositoryGraph;
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Serialize)]
struct GroupMember {
    name: String,
    found: bool,
    disabled: bool,
}

#[derive(Debug, Serialize)]
struct GroupListing {
    name: String,
    members: Vec<GroupMember>,
}

fn listings(graph: &RepositoryGraph) -> Vec<GroupListing> {
    graph
        .groups_for_display()
        .into_iter()
        .map(|(name, members)| GroupListing {
            name,
            members: members
                .into_iter()
                .map(|member| {
                    let node = graph.repository_node(&member);
                    GroupMember {
                        found: node.is_some(),
                        disabled: node.is_some_and(is_disabled),
                        name: member,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Render every display group with its resolved members
///
/// # Errors
///
/// Only fails if writing to the buffer fails.
pub fn render(graph: &RepositoryGraph, inv: &Invocation) -> Result<String> {
    let groups = listings(graph);
    let mut out = String::new();

    if groups.is_empty() {
        writeln!(out, "No groups defined in configuration")?;
        return Ok(out);
    }

    writeln!(out, "{}", inv.heading("Repository Groups:"))?;
    writeln!(out, "{}", "=".repeat(20))?;
    for group in groups {
        writeln!(out, "\n{} ({} repositories):", group.name, group.members.len())?;
        for member in group.members {
            if member.found {
                writeln!(out, "  {} {}", inv.status(member.disabled), member.name)?;
            } else {
                writeln!(out, "  ? {} {}", member.name, inv.dim("(not found)"))?;
            }
        }
    }
    Ok(out)
}

/// List groups
///
/// # Errors
///
/// Fails when the graph cannot be built.
pub fn run(inv: &Invocation) -> Result<()> {
    let graph = inv.load_graph()?;
    if inv.json {
        println!("{}", serde_json::to_string_pretty(&listings(&graph))?);
    } else {
        print!("{}", render(&graph, inv)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{make_fleet, plain};

    #[test]
    fn test_render_groups() {
        let text = render(&make_fleet(), &plain()).unwrap();

        assert!(text.starts_with("Repository Groups:\n===================="));
        assert!(text.contains("\ncore (2 repositories):\n  ● db\n  ? ghost (not found)\n"));
        assert!(text.contains("\neverything (3 repositories):\n  ● api\n  ● db\n  ○ web\n"));
    }

    #[test]
    fn test_no_groups() {
        let text = render(&RepositoryGraph::new(), &plain()).unwrap();
        assert_eq!(text, "No groups defined in configuration\n");
    }

    #[test]
    fn test_listing_flags() {
        let groups = listings(&make_fleet());
        let core = groups.iter().find(|g| g.name == "core").unwrap();
        assert!(core.members[0].found);
        assert!(!core.members[1].found);
    }
}
