// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph construction from a hierarchy of configuration files
//!
//! A build runs in fixed passes: include expansion, repositories, groups,
//! then tags and labels. Groups need the complete repository set before any
//! of them can inherit members, and tag/label sharing needs one dedup table
//! for the whole build, so no pass starts before the previous one finishes.

use super::node::{
    GraphNode, GroupDefinition, LabelDefinition, NodePayload, NodeType, TagDefinition, ROOT_PATH,
};
use super::relationship::{RelationType, Relationship};
use super::store::{RepositoryGraph, ROOT_ID};
use crate::error::{GraphError, Result, ResultExt};
use crate::loader::{ConfigFormat, ConfigLoader};
use crate::types::value_to_string;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Directory whose descendants name the hierarchy levels of included files
pub const DEFAULT_HIERARCHY_ANCHOR: &str = "configs";

/// Per-build state; nothing survives between builds
#[derive(Debug, Default)]
struct BuildState {
    /// Files on the current include stack
    visiting: HashSet<PathBuf>,
    /// `(name, value)` pairs that already have a tag node
    tags: HashSet<(String, String)>,
    labels: HashSet<String>,
}

/// Builds a [`RepositoryGraph`] from a root configuration file
#[derive(Debug, Clone)]
pub struct GraphBuilder<L> {
    loader: L,
    anchor: String,
    stem_names: bool,
}

impl<L: ConfigLoader> GraphBuilder<L> {
    /// Create a builder reading files through `loader`
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            anchor: DEFAULT_HIERARCHY_ANCHOR.to_string(),
            stem_names: false,
        }
    }

    /// Use a different hierarchy anchor directory name
    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }

    /// Name included files that sit outside the anchor directory after their
    /// file stem instead of `root`
    ///
    /// Such a file then opens a scope of its own, so its repositories and
    /// groups no longer sit at root scope.
    #[must_use]
    pub fn with_stem_names(mut self, enabled: bool) -> Self {
        self.stem_names = enabled;
        self
    }

    /// Build and validate the graph rooted at `root_path`
    ///
    /// # Errors
    ///
    /// Returns the first failure of any pass: an unloadable file, a circular
    /// include, a duplicate node or relationship ID, or a validation failure.
    /// No graph is returned on error.
    pub fn build(&self, root_path: impl AsRef<Path>) -> Result<RepositoryGraph> {
        let root_path = root_path.as_ref();
        info!(path = %root_path.display(), "Building configuration graph");

        let mut graph = RepositoryGraph::new();
        let mut state = BuildState::default();

        self.expand(root_path, ROOT_ID, &mut graph, &mut state)
            .with_context(|| "failed to build configuration hierarchy")?;
        Self::derive_repositories(&mut graph).with_context(|| "failed to process repositories")?;
        Self::derive_groups(&mut graph).with_context(|| "failed to process groups")?;
        Self::derive_tags_and_labels(&mut graph, &mut state)
            .with_context(|| "failed to process tags and labels")?;

        graph.build_indexes();
        graph.validate().with_context(|| "graph validation failed")?;

        info!(
            nodes = graph.node_count(),
            relationships = graph.relationship_count(),
            "Configuration graph built"
        );
        Ok(graph)
    }

    fn expand(
        &self,
        path: &Path,
        parent_id: &str,
        graph: &mut RepositoryGraph,
        state: &mut BuildState,
    ) -> Result<()> {
        let abs = normalize_path(path)?;
        if state.visiting.contains(&abs) {
            return Err(GraphError::CircularInclude { path: abs });
        }

        state.visiting.insert(abs.clone());
        let result = self.expand_file(&abs, parent_id, graph, state);
        state.visiting.remove(&abs);
        result
    }

    fn expand_file(
        &self,
        abs: &Path,
        parent_id: &str,
        graph: &mut RepositoryGraph,
        state: &mut BuildState,
    ) -> Result<()> {
        let config = self
            .loader
            .load_config(abs)
            .map_err(|source| GraphError::ConfigLoad {
                path: abs.to_path_buf(),
                source,
            })?;
        debug!(
            path = %abs.display(),
            repositories = config.repositories.len(),
            includes = config.includes.len(),
            "Loaded configuration"
        );

        let id = config_node_id(abs);
        let segments = hierarchy_segments(abs, &self.anchor);
        let name = if parent_id == ROOT_ID {
            None
        } else {
            segments.last().cloned().or_else(|| {
                abs.file_stem()
                    .filter(|_| self.stem_names)
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
        }
        .unwrap_or_else(|| ROOT_PATH.to_string());
        let includes = config.includes.clone();

        let mut node = GraphNode::new(&id, NodeType::Config, name);
        node.set_property("file_path", abs.display().to_string());
        node.set_property("hierarchy_segments", segments);
        node.templates = config.templates.clone();
        node.variables = string_map(&config.global.environment);
        node.mark_explicit(&id);
        node.payload = NodePayload::Config(Box::new(config));

        graph
            .add_node(node)
            .with_context(|| format!("failed to add config node {}", abs.display()))?;
        graph.add_child(parent_id, &id)?;
        link(graph, "pc", parent_id, &id, RelationType::ParentChild)?;

        let dir = abs.parent().map(Path::to_path_buf).unwrap_or_default();
        for include in includes {
            let include_path = dir.join(&include);
            self.expand(&include_path, &id, graph, state)
                .with_context(|| {
                    format!("failed to build included hierarchy {}", include_path.display())
                })?;
        }
        Ok(())
    }

    fn derive_repositories(graph: &mut RepositoryGraph) -> Result<()> {
        for config_id in node_ids(graph, NodeType::Config) {
            let repos = graph
                .get_node(&config_id)
                .and_then(GraphNode::config)
                .map(|config| config.repositories.clone())
                .unwrap_or_default();

            for repo in repos {
                let id = format!("repo_{}", repo.name);
                let mut node = GraphNode::new(&id, NodeType::Repository, &repo.name);
                node.set_property("url", repo.url.as_str());
                node.set_property("path", repo.path.as_str());
                node.set_property("branch", repo.branch.as_str());
                node.set_property("disabled", repo.disabled);
                node.variables = string_map(&repo.environment);
                node.mark_explicit(&config_id);
                node.payload = NodePayload::Repository(Box::new(repo));

                graph
                    .add_node(node)
                    .with_context(|| format!("failed to add repository node {id}"))?;
                graph.add_child(&config_id, &id)?;
                link(graph, "def", &config_id, &id, RelationType::Defines)?;
            }
        }
        Ok(())
    }

    fn derive_groups(graph: &mut RepositoryGraph) -> Result<()> {
        for config_id in node_ids(graph, NodeType::Config) {
            let groups = graph
                .get_node(&config_id)
                .and_then(GraphNode::config)
                .map(|config| config.groups.clone())
                .unwrap_or_default();

            for (name, members) in groups {
                let Some(config_node) = graph.get_node(&config_id) else {
                    break;
                };

                // Position the node first: its scope decides both ID and inheritance
                let mut node = GraphNode::new(String::new(), NodeType::Group, &name);
                node.attach_to(config_node);
                let id = format!("group_{}_{}", node.full_path().replace('/', "_"), name);
                node.id.clone_from(&id);

                let explicit = dedup_preserving_order(members);
                let is_empty = explicit.is_empty();
                let inherited = if is_empty {
                    inherited_members(graph, &node)
                } else {
                    Vec::new()
                };
                for member in &explicit {
                    if graph.repository_node(member).is_none() {
                        warn!(group = %id, repository = %member, "Group member names no known repository");
                    }
                }

                let resolved: Vec<String> = explicit.iter().chain(&inherited).cloned().collect();
                node.tags = if is_empty {
                    vec!["inherited".into(), "derived".into()]
                } else {
                    vec!["explicit".into(), "derived".into()]
                };
                node.mark_derived(&config_id);
                node.set_property("defining_config", config_id.as_str());
                node.set_property("is_empty", is_empty);
                node.payload = NodePayload::Group(GroupDefinition {
                    name,
                    explicit_repos: explicit,
                    inherited_repos: inherited,
                    is_empty,
                });

                graph
                    .add_node(node)
                    .with_context(|| format!("failed to add group node {id}"))?;
                graph.add_child(&config_id, &id)?;
                link(graph, "def", &config_id, &id, RelationType::Defines)?;

                let mut wired = 0usize;
                for member in &resolved {
                    let Some(repo_id) = graph.repository_node(member).map(|r| r.id.clone()) else {
                        continue;
                    };
                    link(graph, "inc", &id, &repo_id, RelationType::Includes)?;
                    wired += 1;
                }
                debug!(group = %id, members = wired, inherited = is_empty, "Derived group");
            }
        }
        Ok(())
    }

    fn derive_tags_and_labels(graph: &mut RepositoryGraph, state: &mut BuildState) -> Result<()> {
        for config_id in node_ids(graph, NodeType::Config) {
            let (tags, labels) = graph
                .get_node(&config_id)
                .and_then(GraphNode::config)
                .map(|config| (config.global.tags.clone(), config.global.labels.clone()))
                .unwrap_or_default();
            wire_tags(graph, state, &config_id, &tags, "global")?;
            wire_labels(graph, state, &config_id, labels, "global")?;
        }

        for repo_id in node_ids(graph, NodeType::Repository) {
            let (tags, labels) = graph
                .get_node(&repo_id)
                .and_then(GraphNode::repository)
                .map(|repo| (repo.tags.clone(), repo.labels.clone()))
                .unwrap_or_default();
            wire_tags(graph, state, &repo_id, &tags, "repository")?;
            wire_labels(graph, state, &repo_id, labels, "repository")?;
        }
        Ok(())
    }
}

fn node_ids(graph: &RepositoryGraph, node_type: NodeType) -> Vec<String> {
    graph
        .get_nodes_by_type(node_type)
        .iter()
        .map(|node| node.id.clone())
        .collect()
}

fn string_map(map: &BTreeMap<String, String>) -> BTreeMap<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
        .collect()
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Sorted, deduplicated names of every repository in scope of `scope`
fn inherited_members(graph: &RepositoryGraph, scope: &GraphNode) -> Vec<String> {
    let mut names: Vec<String> = graph
        .get_nodes_by_type(NodeType::Repository)
        .into_iter()
        .filter(|repo| repo.is_in_scope(scope))
        .map(|repo| repo.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn link(
    graph: &mut RepositoryGraph,
    prefix: &str,
    from: &str,
    to: &str,
    relation_type: RelationType,
) -> Result<()> {
    let id = format!("{prefix}_{from}_{to}");
    trace!(relationship = %id, kind = %relation_type, "Wiring relationship");
    graph
        .add_relationship(Relationship::new(&id, from, to, relation_type))
        .with_context(|| format!("failed to add {relation_type} relationship {id}"))
}

fn wire_tags(
    graph: &mut RepositoryGraph,
    state: &mut BuildState,
    source_id: &str,
    tags: &BTreeMap<String, Value>,
    scope: &str,
) -> Result<()> {
    for (name, value) in tags {
        let value_text = value_to_string(value);
        let tag_id = tag_node_id(name, &value_text);
        if state.tags.insert((name.clone(), value_text)) {
            let mut node = GraphNode::new(&tag_id, NodeType::Tag, name).with_payload(
                NodePayload::Tag(TagDefinition {
                    name: name.clone(),
                    value: value.clone(),
                    scope: scope.to_string(),
                    source_type: "explicit".into(),
                }),
            );
            node.set_property("name", name.as_str());
            node.set_property("value", value.clone());
            node.set_property("scope", scope);
            node.set_property("source_type", "explicit");
            node.mark_explicit(source_id);

            graph
                .add_node(node)
                .with_context(|| format!("failed to add {scope} tag node {tag_id}"))?;
            graph.add_child(ROOT_ID, &tag_id)?;
            debug!(tag = %tag_id, scope, "Created shared tag node");
        }
        link(graph, "tagged", source_id, &tag_id, RelationType::TaggedWith)?;
    }
    Ok(())
}

fn wire_labels(
    graph: &mut RepositoryGraph,
    state: &mut BuildState,
    source_id: &str,
    labels: Vec<String>,
    scope: &str,
) -> Result<()> {
    for name in dedup_preserving_order(labels) {
        let label_id = format!("label_{name}");
        if state.labels.insert(label_id.clone()) {
            let mut node = GraphNode::new(&label_id, NodeType::Label, &name).with_payload(
                NodePayload::Label(LabelDefinition {
                    name: name.clone(),
                    scope: scope.to_string(),
                    source_type: "explicit".into(),
                }),
            );
            node.set_property("name", name.as_str());
            node.set_property("scope", scope);
            node.set_property("source_type", "explicit");
            node.mark_explicit(source_id);

            graph
                .add_node(node)
                .with_context(|| format!("failed to add {scope} label node {label_id}"))?;
            graph.add_child(ROOT_ID, &label_id)?;
            debug!(label = %label_id, scope, "Created shared label node");
        }
        link(graph, "labeled", source_id, &label_id, RelationType::LabeledWith)?;
    }
    Ok(())
}

// =============================================================================
// Paths and IDs
// =============================================================================

/// Make `path` absolute against the current directory and drop `.`/`..`
/// components without touching the filesystem
///
/// # Errors
///
/// [`GraphError::Path`] when the current directory cannot be determined.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| GraphError::Path {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Config node ID: `config_` plus the first 8 hex digits of the path's SHA-256
#[must_use]
pub fn config_node_id(abs_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abs_path.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("config_{}", &digest[..8])
}

/// ID of the shared tag node for a `(name, value)` pair
///
/// `%` and `_` in the name are percent-escaped, so the first `_` after the
/// `tag_` prefix always separates name from value and distinct pairs never
/// share an ID. Names without either character read as `tag_<name>_<value>`.
#[must_use]
pub fn tag_node_id(name: &str, value: &str) -> String {
    let mut id = String::with_capacity(name.len() + value.len() + 5);
    id.push_str("tag_");
    for ch in name.chars() {
        match ch {
            '%' => id.push_str("%25"),
            '_' => id.push_str("%5F"),
            other => id.push(other),
        }
    }
    id.push('_');
    id.push_str(value);
    id
}

/// Directory names below the anchor directory, without a trailing config file name
#[must_use]
pub fn hierarchy_segments(path: &Path, anchor: &str) -> Vec<String> {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let Some(anchor_at) = components.iter().position(|c| c == anchor) else {
        return Vec::new();
    };
    let mut segments = components[anchor_at + 1..].to_vec();
    if segments
        .last()
        .is_some_and(|last| ConfigFormat::is_config_file(last))
    {
        segments.pop();
    }
    segments
}
