// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for graph construction and mutation
//!
//! Every failure is fatal to the build that raised it. Errors are wrapped
//! with the path or ID that triggered them as they propagate, and
//! [`GraphError::root_cause`] strips those layers again when a caller needs
//! to know which class of failure occurred.

use crate::loader::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, mutating or validating a graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// A configuration file could not be read or parsed
    #[error("failed to load config {}: {source}", path.display())]
    ConfigLoad {
        /// File that failed to load
        path: PathBuf,
        /// Loader failure
        #[source]
        source: ConfigError,
    },

    /// A path could not be made absolute
    #[error("failed to resolve path {}: {source}", path.display())]
    Path {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A file includes itself, directly or through other files
    #[error("circular dependency detected: {}", path.display())]
    CircularInclude {
        /// File revisited while still on the include stack
        path: PathBuf,
    },

    /// A node with this ID is already in the graph
    #[error("node with ID {0} already exists")]
    DuplicateNode(String),

    /// A relationship with this ID is already in the graph
    #[error("relationship with ID {0} already exists")]
    DuplicateRelationship(String),

    /// No node with this ID exists
    #[error("node with ID {0} does not exist")]
    NodeNotFound(String),

    /// No relationship with this ID exists
    #[error("relationship with ID {0} does not exist")]
    RelationshipNotFound(String),

    /// A relationship references a node that is not in the graph
    #[error("relationship {relationship} references non-existent {role} node {endpoint}")]
    DanglingEndpoint {
        /// Relationship ID
        relationship: String,
        /// Missing node ID
        endpoint: String,
        /// "from" or "to"
        role: &'static str,
    },

    /// The synthetic root cannot be removed
    #[error("the root node cannot be removed")]
    RootRemoval,

    /// The parent/child tree contains a cycle
    #[error("cycle detected involving node {node}")]
    StructuralCycle {
        /// A node on the cycle
        node: String,
    },

    /// An error annotated with what was being done when it happened
    #[error("{context}: {source}")]
    Context {
        /// Description naming the path or ID involved
        context: String,
        /// Wrapped error
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Wrap this error with a description of the failing step
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every context layer removed
    #[must_use]
    pub fn root_cause(&self) -> &GraphError {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True for circular includes and parent/child cycles
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::CircularInclude { .. } | Self::StructuralCycle { .. }
        )
    }

    /// True for duplicate node or relationship IDs
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::DuplicateNode(_) | Self::DuplicateRelationship(_)
        )
    }
}

/// Extension for annotating graph results, in the manner of `anyhow::Context`
pub trait ResultExt<T> {
    /// Wrap the error, if any, with a lazily built description
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped in [`GraphError::Context`].
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.context(f()))
    }
}

/// Result type alias using [`GraphError`]
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_strips_context() {
        let err = GraphError::DuplicateNode("repo_api".into())
            .context("failed to add repository node repo_api")
            .context("failed to process repositories");

        assert!(matches!(err.root_cause(), GraphError::DuplicateNode(id) if id == "repo_api"));
        assert!(err.is_duplicate());
        assert!(!err.is_cycle());
    }

    #[test]
    fn test_context_message_chain() {
        let err = GraphError::StructuralCycle { node: "a".into() }.context("graph validation failed");
        assert_eq!(
            err.to_string(),
            "graph validation failed: cycle detected involving node a"
        );
        assert!(err.is_cycle());
    }

    #[test]
    fn test_with_context_on_ok_is_untouched() {
        let ok: Result<u8> = Ok(3);
        assert_eq!(ok.with_context(|| "never built").unwrap(), 3);
    }
}
