// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! The configuration graph
//!
//! [`GraphBuilder`] resolves a tree of included configuration files into a
//! [`RepositoryGraph`]: an arena of [`GraphNode`]s addressed by ID, typed
//! [`Relationship`]s between them, and the indexes that serve hierarchy,
//! scope and inheritance queries.

mod builder;
mod node;
mod projection;
mod relationship;
mod store;

pub use builder::{
    config_node_id, hierarchy_segments, normalize_path, tag_node_id, GraphBuilder,
    DEFAULT_HIERARCHY_ANCHOR,
};
pub use node::{
    join_path, path_in_scope, GraphNode, GroupDefinition, LabelDefinition, NodePayload,
    NodeType, Provenance, TagDefinition, ROOT_PATH,
};
pub use projection::{MERGED_DEFAULT_TIMEOUT_SECS, MERGED_DEFAULT_WORKERS};
pub use relationship::{RelationType, Relationship};
pub use store::{GraphSnapshot, GraphStats, HierarchyEntry, RepositoryGraph, ROOT_ID};
