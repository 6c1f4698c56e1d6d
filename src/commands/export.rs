// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Export command - exports the configuration graph to various formats

use super::Invocation;
use crate::graph::RepositoryGraph;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Graphviz DOT format
    Dot,
    /// JSON snapshot
    Json,
}

impl ExportFormat {
    /// Get file extension for format
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Json => "json",
        }
    }
}

/// Serialise a graph in `format`
///
/// # Errors
///
/// Fails if JSON serialisation fails.
pub fn render(graph: &RepositoryGraph, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Dot => graph.to_dot(),
        ExportFormat::Json => serde_json::to_string_pretty(&graph.snapshot())?,
    })
}

/// Run the export command
///
/// # Errors
///
/// Fails when the graph cannot be built or the output cannot be written.
pub fn run(inv: &Invocation, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    info!("Exporting to {}", format.extension());

    let graph = inv.load_graph()?;
    let content = render(&graph, format)?;

    match output {
        Some(path) => {
            fs::write(&path, &content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
