// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph nodes and their type-specific payloads

use crate::types::{Config, Repository};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Full path used by the root node and every node at root scope
pub const ROOT_PATH: &str = "root";

// =============================================================================
// Node Types
// =============================================================================

/// Kind of entity a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// The synthetic root of every graph
    Root,
    /// A configuration file
    Config,
    /// A repository declared in a configuration file
    Repository,
    /// A repository group
    Group,
    /// A shared key/value tag
    Tag,
    /// A shared label
    Label,
}

impl NodeType {
    /// Every node type, in display order
    pub const ALL: [Self; 6] = [
        Self::Root,
        Self::Config,
        Self::Repository,
        Self::Group,
        Self::Tag,
        Self::Label,
    ];

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Config => "config",
            Self::Repository => "repository",
            Self::Group => "group",
            Self::Tag => "tag",
            Self::Label => "label",
        }
    }

    /// Config files and repositories are authored configuration; everything
    /// else is a logical entity
    #[must_use]
    pub fn is_config_entity(&self) -> bool {
        matches!(self, Self::Config | Self::Repository)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// Membership of a repository group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDefinition {
    /// Group name
    pub name: String,
    /// Members listed in the configuration file
    pub explicit_repos: Vec<String>,
    /// Members computed from scope when no explicit list was given
    pub inherited_repos: Vec<String>,
    /// True when the group was authored without members
    pub is_empty: bool,
}

impl GroupDefinition {
    /// Explicit and inherited members, deduplicated and sorted
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        let mut members: Vec<String> = self
            .explicit_repos
            .iter()
            .chain(&self.inherited_repos)
            .cloned()
            .collect();
        members.sort();
        members.dedup();
        members
    }
}

/// A key/value tag shared by every entity carrying it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDefinition {
    /// Tag key
    pub name: String,
    /// Tag value (string, number or bool)
    pub value: Value,
    /// "global" or "repository", from the first entity seen with this tag
    pub scope: String,
    /// Always "explicit" today
    pub source_type: String,
}

/// A plain label shared by every entity carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDefinition {
    /// Label name
    pub name: String,
    /// "global" or "repository", from the first entity seen with this label
    pub scope: String,
    /// Always "explicit" today
    pub source_type: String,
}

/// Type-specific node content
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum NodePayload {
    /// No payload (the root)
    #[default]
    None,
    /// Configuration file record
    Config(Box<Config>),
    /// Repository record
    Repository(Box<Repository>),
    /// Group membership
    Group(GroupDefinition),
    /// Tag identity
    Tag(TagDefinition),
    /// Label identity
    Label(LabelDefinition),
}

impl NodePayload {
    fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Whether a node was authored or computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Literally present in configuration
    Explicit,
    /// Computed by the builder
    Derived,
}

// =============================================================================
// Graph Node
// =============================================================================

/// A vertex of the configuration graph
///
/// Hierarchy fields (`level`, `path`, `full_path`, `parent`) are only ever
/// written by [`GraphNode::attach_to`]; children lists are maintained by the
/// owning graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// Unique ID
    pub id: String,
    /// Node kind
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Display name
    pub name: String,
    level: usize,
    path: Vec<String>,
    full_path: String,
    parent: Option<String>,
    pub(crate) children: Vec<String>,
    /// Plain string tags attached directly to this node
    pub tags: Vec<String>,
    provenance: Provenance,
    source_config: Option<String>,
    /// Type-specific content
    #[serde(skip_serializing_if = "NodePayload::is_none")]
    pub payload: NodePayload,
    /// Arbitrary properties
    pub properties: BTreeMap<String, Value>,
    /// Templates defined at this node
    pub templates: BTreeMap<String, Value>,
    /// Variables defined at this node
    pub variables: BTreeMap<String, Value>,
}

impl GraphNode {
    /// Create a detached node at root scope
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            level: 0,
            path: Vec::new(),
            full_path: ROOT_PATH.to_string(),
            parent: None,
            children: Vec::new(),
            tags: Vec::new(),
            provenance: Provenance::Explicit,
            source_config: None,
            payload: NodePayload::None,
            properties: BTreeMap::new(),
            templates: BTreeMap::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Builder-style payload setter
    #[must_use]
    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = payload;
        self
    }

    /// Distance from the root
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Ancestor names, root excluded
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path joined with `/`, or `root` when empty
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Parent node ID
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Child node IDs, in attachment order
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// The path a child of type `child` receives under this node
    ///
    /// The synthetic root adds no segment. A configuration named `root` adds
    /// none to the repositories and groups it defines, which keeps them at
    /// root scope with an empty path.
    #[must_use]
    pub fn child_path(&self, child: NodeType) -> Vec<String> {
        let mut path = self.path.clone();
        let defines_at_root = self.node_type == NodeType::Config
            && self.name == ROOT_PATH
            && matches!(child, NodeType::Repository | NodeType::Group);
        if self.node_type != NodeType::Root && !defines_at_root {
            path.push(self.name.clone());
        }
        path
    }

    /// Derive level and path from `parent` and record it as this node's parent
    ///
    /// The parent's children list is not touched here; see
    /// [`RepositoryGraph::add_child`](super::RepositoryGraph::add_child).
    pub fn attach_to(&mut self, parent: &GraphNode) {
        self.parent = Some(parent.id.clone());
        self.level = parent.level + 1;
        self.path = parent.child_path(self.node_type);
        self.full_path = join_path(&self.path);
    }

    pub(crate) fn detach(&mut self) {
        self.parent = None;
    }

    /// Whether this node lies within the scope of `scope`
    ///
    /// The root scope contains everything. Otherwise the full paths must be
    /// equal, or this node's path must continue the scope's path at a `/`
    /// boundary.
    #[must_use]
    pub fn is_in_scope(&self, scope: &GraphNode) -> bool {
        if scope.node_type == NodeType::Root {
            return true;
        }
        path_in_scope(&self.full_path, &scope.full_path)
    }

    /// Whether the node carries a plain tag
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Mark as literally authored, produced by `source`
    pub fn mark_explicit(&mut self, source: impl Into<String>) {
        self.provenance = Provenance::Explicit;
        self.source_config = Some(source.into());
    }

    /// Mark as computed, attributed to `source`
    pub fn mark_derived(&mut self, source: impl Into<String>) {
        self.provenance = Provenance::Derived;
        self.source_config = Some(source.into());
    }

    /// How the node came to exist
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// True for authored nodes
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.provenance == Provenance::Explicit
    }

    /// True for computed nodes
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.provenance == Provenance::Derived
    }

    /// ID of the node that produced this one
    #[must_use]
    pub fn source_config(&self) -> Option<&str> {
        self.source_config.as_deref()
    }

    /// Property lookup
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a property
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Configuration record, for config nodes
    #[must_use]
    pub fn config(&self) -> Option<&Config> {
        match &self.payload {
            NodePayload::Config(config) => Some(config),
            _ => None,
        }
    }

    /// Repository record, for repository nodes
    #[must_use]
    pub fn repository(&self) -> Option<&Repository> {
        match &self.payload {
            NodePayload::Repository(repo) => Some(repo),
            _ => None,
        }
    }

    /// Group definition, for group nodes
    #[must_use]
    pub fn group(&self) -> Option<&GroupDefinition> {
        match &self.payload {
            NodePayload::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Tag definition, for tag nodes
    #[must_use]
    pub fn tag(&self) -> Option<&TagDefinition> {
        match &self.payload {
            NodePayload::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    /// Label definition, for label nodes
    #[must_use]
    pub fn label(&self) -> Option<&LabelDefinition> {
        match &self.payload {
            NodePayload::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.node_type, self.name, self.full_path)
    }
}

/// Join path segments with `/`, using `root` for the empty path
#[must_use]
pub fn join_path(path: &[String]) -> String {
    if path.is_empty() {
        ROOT_PATH.to_string()
    } else {
        path.join("/")
    }
}

/// Segment-boundary prefix test on full paths
#[must_use]
pub fn path_in_scope(path: &str, scope: &str) -> bool {
    path == scope
        || path
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with('/'))
}
