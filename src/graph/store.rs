// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Indexed graph container and query engine
//!
//! Nodes and relationships live in ID-ordered primary maps. Every other
//! lookup structure is derived from those maps: mutators keep the indexes
//! current incrementally, and [`RepositoryGraph::build_indexes`] rebuilds
//! them from scratch.

use super::node::{GraphNode, NodeType};
use super::relationship::{RelationType, Relationship};
use crate::error::{GraphError, Result};
use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// ID of the synthetic root node
pub const ROOT_ID: &str = "root";

// =============================================================================
// Indexes
// =============================================================================

#[derive(Debug, Clone, Default)]
struct NodeIndexes {
    by_type: HashMap<NodeType, Vec<String>>,
    by_level: BTreeMap<usize, Vec<String>>,
    // Multi-valued: configs, repositories and groups routinely share a path
    by_path: HashMap<String, Vec<String>>,
    by_tag: HashMap<String, Vec<String>>,
    repositories: HashMap<String, String>,
    // Group names repeat across scopes; the winner is picked at lookup
    groups: HashMap<String, Vec<String>>,
}

impl NodeIndexes {
    fn insert(&mut self, node: &GraphNode) {
        self.by_type
            .entry(node.node_type)
            .or_default()
            .push(node.id.clone());
        self.insert_position(node);
        for tag in &node.tags {
            self.by_tag.entry(tag.clone()).or_default().push(node.id.clone());
        }
        match node.node_type {
            NodeType::Repository => {
                self.repositories
                    .entry(node.name.clone())
                    .or_insert_with(|| node.id.clone());
            }
            NodeType::Group => {
                self.groups
                    .entry(node.name.clone())
                    .or_default()
                    .push(node.id.clone());
            }
            _ => {}
        }
    }

    fn remove(&mut self, node: &GraphNode) {
        remove_id(&mut self.by_type, &node.node_type, &node.id);
        self.remove_position(node);
        for tag in &node.tags {
            remove_id(&mut self.by_tag, tag, &node.id);
        }
        match node.node_type {
            NodeType::Repository => {
                if self.repositories.get(&node.name) == Some(&node.id) {
                    self.repositories.remove(&node.name);
                }
            }
            NodeType::Group => remove_id(&mut self.groups, &node.name, &node.id),
            _ => {}
        }
    }

    fn insert_position(&mut self, node: &GraphNode) {
        self.by_level
            .entry(node.level())
            .or_default()
            .push(node.id.clone());
        self.by_path
            .entry(node.full_path().to_string())
            .or_default()
            .push(node.id.clone());
    }

    fn remove_position(&mut self, node: &GraphNode) {
        if let Some(ids) = self.by_level.get_mut(&node.level()) {
            ids.retain(|id| id != &node.id);
            if ids.is_empty() {
                self.by_level.remove(&node.level());
            }
        }
        remove_id(&mut self.by_path, &node.full_path().to_string(), &node.id);
    }
}

#[derive(Debug, Clone, Default)]
struct RelationIndexes {
    by_type: HashMap<RelationType, Vec<String>>,
    by_from: HashMap<String, Vec<String>>,
    by_to: HashMap<String, Vec<String>>,
}

impl RelationIndexes {
    fn insert(&mut self, rel: &Relationship) {
        self.by_type
            .entry(rel.relation_type)
            .or_default()
            .push(rel.id.clone());
        self.by_from.entry(rel.from.clone()).or_default().push(rel.id.clone());
        self.by_to.entry(rel.to.clone()).or_default().push(rel.id.clone());
    }

    fn remove(&mut self, rel: &Relationship) {
        remove_id(&mut self.by_type, &rel.relation_type, &rel.id);
        remove_id(&mut self.by_from, &rel.from, &rel.id);
        remove_id(&mut self.by_to, &rel.to, &rel.id);
    }
}

fn remove_id<K: Eq + Hash>(index: &mut HashMap<K, Vec<String>>, key: &K, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Node and relationship counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Total nodes, root included
    pub nodes: usize,
    /// Total relationships
    pub relationships: usize,
    /// Nodes marked explicit
    pub explicit: usize,
    /// Nodes marked derived
    pub derived: usize,
    /// Node count per type
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    /// Relationship count per type
    pub relationships_by_type: BTreeMap<RelationType, usize>,
}

/// One configuration node in the include tree
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEntry<'a> {
    /// Include depth; the top-level file is 0
    pub depth: usize,
    /// The configuration node
    pub node: &'a GraphNode,
}

/// Serialisable view of a whole graph
#[derive(Debug, Serialize)]
pub struct GraphSnapshot<'a> {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Root node ID
    pub root: &'a str,
    /// Counts
    pub stats: GraphStats,
    /// Every node, in ID order
    pub nodes: Vec<&'a GraphNode>,
    /// Every relationship, in ID order
    pub relationships: Vec<&'a Relationship>,
}

// =============================================================================
// Repository Graph
// =============================================================================

/// The configuration graph
#[derive(Debug, Clone)]
pub struct RepositoryGraph {
    root: String,
    nodes: BTreeMap<String, GraphNode>,
    relationships: BTreeMap<String, Relationship>,
    node_index: NodeIndexes,
    relation_index: RelationIndexes,
}

impl Default for RepositoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryGraph {
    /// Create a graph holding only the synthetic root
    #[must_use]
    pub fn new() -> Self {
        let root = GraphNode::new(ROOT_ID, NodeType::Root, "root");
        let mut graph = Self {
            root: root.id.clone(),
            nodes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            node_index: NodeIndexes::default(),
            relation_index: RelationIndexes::default(),
        };
        graph.node_index.insert(&root);
        graph.nodes.insert(root.id.clone(), root);
        graph
    }

    /// The synthetic root
    #[must_use]
    pub fn root(&self) -> &GraphNode {
        // The root is inserted on construction and never removed
        &self.nodes[&self.root]
    }

    /// Number of nodes, root included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of relationships
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// True when only the root is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Every node, in ID order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Every relationship, in ID order
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    fn resolve<'a>(&'a self, ids: Option<&'a Vec<String>>) -> Vec<&'a GraphNode> {
        ids.map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    fn resolve_relations<'a>(&'a self, ids: Option<&'a Vec<String>>) -> Vec<&'a Relationship> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.relationships.get(id))
                .collect()
        })
        .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Node queries
    // -------------------------------------------------------------------------

    /// Look up a node
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Look up a relationship
    #[must_use]
    pub fn get_relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    /// Nodes of one type
    #[must_use]
    pub fn get_nodes_by_type(&self, node_type: NodeType) -> Vec<&GraphNode> {
        self.resolve(self.node_index.by_type.get(&node_type))
    }

    /// Nodes at one depth
    #[must_use]
    pub fn get_nodes_by_level(&self, level: usize) -> Vec<&GraphNode> {
        self.resolve(self.node_index.by_level.get(&level))
    }

    /// Every node whose full path is `path`
    #[must_use]
    pub fn get_nodes_by_path(&self, path: &str) -> Vec<&GraphNode> {
        self.resolve(self.node_index.by_path.get(path))
    }

    /// Nodes carrying a plain tag
    #[must_use]
    pub fn get_nodes_by_tag(&self, tag: &str) -> Vec<&GraphNode> {
        self.resolve(self.node_index.by_tag.get(tag))
    }

    /// Nodes whose property `key` equals `value`
    #[must_use]
    pub fn get_nodes_by_property(&self, key: &str, value: &Value) -> Vec<&GraphNode> {
        self.nodes
            .values()
            .filter(|node| node.property(key) == Some(value))
            .collect()
    }

    /// Repository node by repository name
    #[must_use]
    pub fn repository_node(&self, name: &str) -> Option<&GraphNode> {
        self.node_index
            .repositories
            .get(name)
            .and_then(|id| self.nodes.get(id))
    }

    /// Group node by group name
    ///
    /// When several scopes define the name, the shallowest scope wins and
    /// ties go to the lowest ID. Insertion order never matters.
    #[must_use]
    pub fn group_node(&self, name: &str) -> Option<&GraphNode> {
        self.node_index
            .groups
            .get(name)?
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .min_by(|a, b| (a.path().len(), &a.id).cmp(&(b.path().len(), &b.id)))
    }

    // -------------------------------------------------------------------------
    // Hierarchy queries
    // -------------------------------------------------------------------------

    /// Direct children, optionally filtered by type
    #[must_use]
    pub fn get_children(&self, id: &str, node_type: Option<NodeType>) -> Vec<&GraphNode> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.children()
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .filter(|child| node_type.map_or(true, |t| child.node_type == t))
            .collect()
    }

    /// All descendants, optionally filtered by type
    #[must_use]
    pub fn get_descendants(&self, id: &str, node_type: Option<NodeType>) -> Vec<&GraphNode> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = match self.nodes.get(id) {
            Some(node) => node.children().iter().map(String::as_str).collect(),
            None => return result,
        };

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node_type.map_or(true, |t| node.node_type == t) {
                result.push(node);
            }
            stack.extend(node.children().iter().map(String::as_str));
        }
        result
    }

    /// Ancestors, nearest first
    #[must_use]
    pub fn get_ancestors(&self, id: &str) -> Vec<&GraphNode> {
        let mut result: Vec<&GraphNode> = Vec::new();
        let mut cursor = self.nodes.get(id).and_then(GraphNode::parent);
        while let Some(parent_id) = cursor {
            let Some(parent) = self.nodes.get(parent_id) else {
                break;
            };
            if result.iter().any(|seen| seen.id == parent.id) {
                break;
            }
            result.push(parent);
            cursor = parent.parent();
        }
        result
    }

    /// Other children of the same parent; empty for the root
    #[must_use]
    pub fn get_siblings(&self, id: &str) -> Vec<&GraphNode> {
        let Some(parent) = self.nodes.get(id).and_then(GraphNode::parent) else {
            return Vec::new();
        };
        self.get_children(parent, None)
            .into_iter()
            .filter(|sibling| sibling.id != id)
            .collect()
    }

    /// Every node in structural pre-order, starting at the root
    #[must_use]
    pub fn preorder(&self) -> Vec<&GraphNode> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack = vec![self.root.as_str()];

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            result.push(node);
            stack.extend(node.children().iter().rev().map(String::as_str));
        }
        result
    }

    /// Configuration nodes in include order, with include depth
    #[must_use]
    pub fn config_hierarchy(&self) -> Vec<HierarchyEntry<'_>> {
        self.preorder()
            .into_iter()
            .filter(|node| node.node_type == NodeType::Config)
            .map(|node| HierarchyEntry {
                depth: node.level().saturating_sub(1),
                node,
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Relationship queries
    // -------------------------------------------------------------------------

    /// Outgoing then incoming relationships of a node, optionally filtered by type
    #[must_use]
    pub fn get_relationships(
        &self,
        id: &str,
        relation_type: Option<RelationType>,
    ) -> Vec<&Relationship> {
        self.get_outgoing_relations(id)
            .into_iter()
            .chain(self.get_incoming_relations(id))
            .filter(|rel| relation_type.map_or(true, |t| rel.relation_type == t))
            .collect()
    }

    /// All relationships of one type
    #[must_use]
    pub fn get_relationships_by_type(&self, relation_type: RelationType) -> Vec<&Relationship> {
        self.resolve_relations(self.relation_index.by_type.get(&relation_type))
    }

    /// Relationships ending at a node
    #[must_use]
    pub fn get_incoming_relations(&self, id: &str) -> Vec<&Relationship> {
        self.resolve_relations(self.relation_index.by_to.get(id))
    }

    /// Relationships starting at a node
    #[must_use]
    pub fn get_outgoing_relations(&self, id: &str) -> Vec<&Relationship> {
        self.resolve_relations(self.relation_index.by_from.get(id))
    }

    /// The far endpoint of every relationship of `relation_type` touching a node
    #[must_use]
    pub fn get_related(&self, id: &str, relation_type: RelationType) -> Vec<&GraphNode> {
        self.get_relationships(id, Some(relation_type))
            .into_iter()
            .filter_map(|rel| rel.other_end(id))
            .filter_map(|other| self.nodes.get(other))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Classification queries
    // -------------------------------------------------------------------------

    /// Nodes authored in configuration
    #[must_use]
    pub fn get_explicit_nodes(&self) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.is_explicit()).collect()
    }

    /// Nodes computed by the builder
    #[must_use]
    pub fn get_derived_nodes(&self) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.is_derived()).collect()
    }

    /// Config file and repository nodes
    #[must_use]
    pub fn get_config_entities(&self) -> Vec<&GraphNode> {
        self.nodes
            .values()
            .filter(|n| n.node_type.is_config_entity())
            .collect()
    }

    /// Everything that is not a config entity
    #[must_use]
    pub fn get_logical_entities(&self) -> Vec<&GraphNode> {
        self.nodes
            .values()
            .filter(|n| !n.node_type.is_config_entity())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Repository queries
    // -------------------------------------------------------------------------

    /// Repository nodes in scope of a node
    #[must_use]
    pub fn get_repositories_in_scope(&self, scope_id: &str) -> Vec<&GraphNode> {
        let Some(scope) = self.nodes.get(scope_id) else {
            return Vec::new();
        };
        self.get_nodes_by_type(NodeType::Repository)
            .into_iter()
            .filter(|repo| repo.is_in_scope(scope))
            .collect()
    }

    /// Groups whose resolved members include a repository
    #[must_use]
    pub fn get_groups_for_repository(&self, repo_name: &str) -> Vec<&GraphNode> {
        self.get_nodes_by_type(NodeType::Group)
            .into_iter()
            .filter(|node| {
                node.group().is_some_and(|group| {
                    group.explicit_repos.iter().any(|r| r == repo_name)
                        || group.inherited_repos.iter().any(|r| r == repo_name)
                })
            })
            .collect()
    }

    /// Resolved repository nodes of a group, given its ID or name
    #[must_use]
    pub fn get_repositories_for_group(&self, name_or_id: &str) -> Vec<&GraphNode> {
        let group = self
            .nodes
            .get(name_or_id)
            .filter(|node| node.node_type == NodeType::Group)
            .or_else(|| self.group_node(name_or_id))
            .and_then(GraphNode::group);
        let Some(group) = group else {
            return Vec::new();
        };

        let mut result: Vec<&GraphNode> = Vec::new();
        for name in group.explicit_repos.iter().chain(&group.inherited_repos) {
            if let Some(repo) = self.repository_node(name) {
                if !result.iter().any(|existing| existing.id == repo.id) {
                    result.push(repo);
                }
            }
        }
        result
    }

    // -------------------------------------------------------------------------
    // Scoped inheritance
    // -------------------------------------------------------------------------

    fn layered<F>(&self, id: &str, select: F) -> BTreeMap<String, Value>
    where
        F: Fn(&GraphNode) -> &BTreeMap<String, Value>,
    {
        let mut effective = BTreeMap::new();
        let Some(node) = self.nodes.get(id) else {
            return effective;
        };
        let mut chain = self.get_ancestors(id);
        chain.reverse();
        chain.push(node);

        for layer in chain {
            for (key, value) in select(layer) {
                effective.insert(key.clone(), value.clone());
            }
        }
        effective
    }

    /// Templates visible at a node; the closest definition wins
    #[must_use]
    pub fn effective_templates(&self, id: &str) -> BTreeMap<String, Value> {
        self.layered(id, |node| &node.templates)
    }

    /// Variables visible at a node; the closest definition wins
    #[must_use]
    pub fn effective_variables(&self, id: &str) -> BTreeMap<String, Value> {
        self.layered(id, |node| &node.variables)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Insert a node
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNode`] if the ID is taken; the graph is unchanged.
    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.node_index.insert(&node);
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert a relationship
    ///
    /// Endpoints are not checked here; [`RepositoryGraph::validate`] does that.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateRelationship`] if the ID is taken.
    pub fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        if self.relationships.contains_key(&rel.id) {
            return Err(GraphError::DuplicateRelationship(rel.id));
        }
        self.relation_index.insert(&rel);
        self.relationships.insert(rel.id.clone(), rel);
        Ok(())
    }

    /// Make `child_id` a child of `parent_id`
    ///
    /// Level and path are recomputed for the child and its whole subtree. A
    /// child that already has a parent is moved.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] for unknown IDs, and
    /// [`GraphError::StructuralCycle`] if the child is the parent or one of
    /// its ancestors.
    pub fn add_child(&mut self, parent_id: &str, child_id: &str) -> Result<()> {
        if !self.nodes.contains_key(parent_id) {
            return Err(GraphError::NodeNotFound(parent_id.to_string()));
        }
        if !self.nodes.contains_key(child_id) {
            return Err(GraphError::NodeNotFound(child_id.to_string()));
        }
        if parent_id == child_id || self.get_ancestors(parent_id).iter().any(|a| a.id == child_id)
        {
            return Err(GraphError::StructuralCycle {
                node: child_id.to_string(),
            });
        }

        let old_parent = self
            .nodes
            .get(child_id)
            .and_then(GraphNode::parent)
            .map(str::to_string);
        if let Some(old) = old_parent {
            if let Some(node) = self.nodes.get_mut(&old) {
                node.children.retain(|c| c != child_id);
            }
        }
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(child_id.to_string());
        }

        // Re-derive positions top-down so every node sees its updated parent
        let mut queue = vec![child_id.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(mut node) = self.nodes.remove(&current) else {
                continue;
            };
            let parent = if current == child_id {
                Some(parent_id.to_string())
            } else {
                node.parent().map(str::to_string)
            };
            if let Some(parent) = parent.and_then(|p| self.nodes.get(&p)) {
                self.node_index.remove_position(&node);
                node.attach_to(parent);
                self.node_index.insert_position(&node);
            }
            queue.extend(node.children().iter().cloned());
            self.nodes.insert(current, node);
        }
        Ok(())
    }

    /// Remove a node and every relationship touching it
    ///
    /// The node is detached from its parent; its children stay in the graph
    /// without a parent.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] for unknown IDs and
    /// [`GraphError::RootRemoval`] for the root.
    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        if id == self.root {
            return Err(GraphError::RootRemoval);
        }
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        if let Some(parent) = node.parent().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| c != id);
        }
        for child in node.children() {
            if let Some(child) = self.nodes.get_mut(child) {
                if child.parent() == Some(id) {
                    child.detach();
                }
            }
        }

        let touching: Vec<String> = self
            .relationships
            .values()
            .filter(|rel| rel.from == id || rel.to == id)
            .map(|rel| rel.id.clone())
            .collect();
        for rel_id in touching {
            self.remove_relationship(&rel_id)?;
        }

        self.node_index.remove(&node);
        Ok(())
    }

    /// Remove a relationship
    ///
    /// # Errors
    ///
    /// [`GraphError::RelationshipNotFound`] for unknown IDs.
    pub fn remove_relationship(&mut self, id: &str) -> Result<()> {
        let rel = self
            .relationships
            .remove(id)
            .ok_or_else(|| GraphError::RelationshipNotFound(id.to_string()))?;
        self.relation_index.remove(&rel);
        Ok(())
    }

    /// Discard and rebuild every index from the primary maps
    pub fn build_indexes(&mut self) {
        self.node_index = NodeIndexes::default();
        self.relation_index = RelationIndexes::default();
        for node in self.nodes.values() {
            self.node_index.insert(node);
        }
        for rel in self.relationships.values() {
            self.relation_index.insert(rel);
        }
    }

    /// Check relationship endpoints, then look for cycles in the parent/child tree
    ///
    /// # Errors
    ///
    /// [`GraphError::DanglingEndpoint`] or [`GraphError::StructuralCycle`] for
    /// the first violation found.
    pub fn validate(&self) -> Result<()> {
        for rel in self.relationships.values() {
            for (role, endpoint) in [("from", &rel.from), ("to", &rel.to)] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(GraphError::DanglingEndpoint {
                        relationship: rel.id.clone(),
                        endpoint: endpoint.clone(),
                        role,
                    });
                }
            }
        }

        let mut tree: DiGraph<&str, ()> = DiGraph::new();
        let indices: HashMap<&str, NodeIndex> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), tree.add_node(id.as_str())))
            .collect();
        for node in self.nodes.values() {
            let Some(&from) = indices.get(node.id.as_str()) else {
                continue;
            };
            for child in node.children() {
                if let Some(&to) = indices.get(child.as_str()) {
                    tree.add_edge(from, to, ());
                }
            }
        }

        toposort(&tree, None).map_err(|cycle| GraphError::StructuralCycle {
            node: tree[cycle.node_id()].to_string(),
        })?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reports and export
    // -------------------------------------------------------------------------

    /// Node and relationship counts
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.nodes.len(),
            relationships: self.relationships.len(),
            ..GraphStats::default()
        };
        for node in self.nodes.values() {
            *stats.nodes_by_type.entry(node.node_type).or_default() += 1;
            if node.is_explicit() {
                stats.explicit += 1;
            } else {
                stats.derived += 1;
            }
        }
        for rel in self.relationships.values() {
            *stats.relationships_by_type.entry(rel.relation_type).or_default() += 1;
        }
        stats
    }

    /// Serialisable snapshot of the whole graph
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        GraphSnapshot {
            generated_at: Utc::now(),
            root: &self.root,
            stats: self.stats(),
            nodes: self.nodes.values().collect(),
            relationships: self.relationships.values().collect(),
        }
    }

    /// Export to DOT format for Graphviz
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph repograph {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=rounded];\n\n");

        for node in self.preorder() {
            let shape = match node.node_type {
                NodeType::Root => "doublecircle",
                NodeType::Config => "folder",
                NodeType::Repository => "box",
                NodeType::Group => "component",
                NodeType::Tag => "note",
                NodeType::Label => "ellipse",
            };
            let label = match node.tag() {
                Some(tag) => format!(
                    "{}={}",
                    tag.name,
                    crate::types::value_to_string(&tag.value)
                ),
                None => node.name.clone(),
            };
            dot.push_str(&format!(
                "  \"{}\" [label=\"{}\\n{}\", shape={}];\n",
                escape_dot(&node.id),
                escape_dot(&label),
                node.node_type,
                shape
            ));
        }

        dot.push('\n');

        for rel in self.relationships.values() {
            let style = if rel.relation_type == RelationType::ParentChild {
                ", style=dotted"
            } else {
                ""
            };
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"{}];\n",
                escape_dot(&rel.from),
                escape_dot(&rel.to),
                rel.relation_type,
                style
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{GroupDefinition, NodePayload};

    fn make_node(id: &str, node_type: NodeType, name: &str) -> GraphNode {
        GraphNode::new(id, node_type, name)
    }

    fn ids(nodes: &[&GraphNode]) -> Vec<String> {
        let mut ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids
    }

    /// root -> config_top -> {repo_api, config_backend -> {repo_db, group_all}}
    fn make_graph() -> RepositoryGraph {
        let mut graph = RepositoryGraph::new();
        graph.add_node(make_node("config_top", NodeType::Config, "root")).unwrap();
        graph.add_child(ROOT_ID, "config_top").unwrap();
        graph
            .add_node(make_node("config_backend", NodeType::Config, "backend"))
            .unwrap();
        graph.add_child("config_top", "config_backend").unwrap();

        let mut api = make_node("repo_api", NodeType::Repository, "api");
        api.mark_explicit("config_top");
        graph.add_node(api).unwrap();
        graph.add_child("config_top", "repo_api").unwrap();

        let mut db = make_node("repo_db", NodeType::Repository, "db");
        db.mark_explicit("config_backend");
        graph.add_node(db).unwrap();
        graph.add_child("config_backend", "repo_db").unwrap();

        let mut all = make_node("group_root_backend_all", NodeType::Group, "all").with_payload(
            NodePayload::Group(GroupDefinition {
                name: "all".into(),
                inherited_repos: vec!["db".into()],
                is_empty: true,
                ..GroupDefinition::default()
            }),
        );
        all.tags = vec!["inherited".into(), "derived".into()];
        all.mark_derived("config_backend");
        graph.add_node(all).unwrap();
        graph.add_child("config_backend", "group_root_backend_all").unwrap();

        for (id, from, to, ty) in [
            ("pc_root_config_top", ROOT_ID, "config_top", RelationType::ParentChild),
            ("pc_config_top_config_backend", "config_top", "config_backend", RelationType::ParentChild),
            ("def_config_top_repo_api", "config_top", "repo_api", RelationType::Defines),
            ("def_config_backend_repo_db", "config_backend", "repo_db", RelationType::Defines),
            ("inc_group_root_backend_all_repo_db", "group_root_backend_all", "repo_db", RelationType::Includes),
        ] {
            graph.add_relationship(Relationship::new(id, from, to, ty)).unwrap();
        }
        graph
    }

    #[test]
    fn test_new_graph_has_root() {
        let graph = RepositoryGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.root().full_path(), "root");
        assert_eq!(graph.get_nodes_by_level(0).len(), 1);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_duplicate_node_leaves_graph_unchanged() {
        let mut graph = make_graph();
        let before = graph.node_count();

        let err = graph
            .add_node(make_node("repo_api", NodeType::Repository, "other"))
            .unwrap_err();

        assert!(matches!(err, GraphError::DuplicateNode(ref id) if id == "repo_api"));
        assert_eq!(graph.node_count(), before);
        assert_eq!(graph.get_node("repo_api").unwrap().name, "api");
    }

    #[test]
    fn test_duplicate_relationship_rejected() {
        let mut graph = make_graph();
        let err = graph
            .add_relationship(Relationship::new(
                "def_config_top_repo_api",
                "config_top",
                "repo_api",
                RelationType::Defines,
            ))
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_add_child_updates_position_indexes() {
        let graph = make_graph();

        assert_eq!(graph.get_node("repo_db").unwrap().full_path(), "root/backend");
        assert_eq!(graph.get_node("repo_db").unwrap().level(), 3);
        assert_eq!(
            ids(&graph.get_nodes_by_path("root/backend")),
            vec!["group_root_backend_all", "repo_db"]
        );
        // Top config, backend config and api all sit at root scope
        assert_eq!(
            ids(&graph.get_nodes_by_path("root")),
            vec!["config_backend", "config_top", "repo_api", "root"]
        );
        assert_eq!(ids(&graph.get_nodes_by_level(3)), vec!["group_root_backend_all", "repo_db"]);
    }

    #[test]
    fn test_add_child_moves_subtree() {
        let mut graph = make_graph();
        graph.add_node(make_node("config_ops", NodeType::Config, "ops")).unwrap();
        graph.add_child("config_top", "config_ops").unwrap();

        graph.add_child("config_ops", "config_backend").unwrap();

        let top_children: Vec<&str> = graph
            .get_children("config_top", None)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert!(!top_children.contains(&"config_backend"));
        assert_eq!(graph.get_node("config_backend").unwrap().parent(), Some("config_ops"));
        assert_eq!(graph.get_node("repo_db").unwrap().full_path(), "root/ops/backend");
        assert_eq!(graph.get_node("repo_db").unwrap().level(), 4);
        assert!(graph.get_nodes_by_path("root/backend").is_empty());
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut graph = make_graph();
        let err = graph.add_child("repo_db", "config_top").unwrap_err();
        assert!(err.is_cycle());
        assert!(graph.add_child("repo_db", "repo_db").is_err());
        assert!(matches!(
            graph.add_child("missing", "repo_db"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = make_graph();
        graph.remove_node("repo_db").unwrap();

        assert!(graph.get_node("repo_db").is_none());
        assert!(graph.repository_node("db").is_none());
        assert!(graph.get_relationship("def_config_backend_repo_db").is_none());
        assert!(graph.get_relationship("inc_group_root_backend_all_repo_db").is_none());
        assert!(graph.get_incoming_relations("repo_db").is_empty());
        assert!(graph
            .get_children("config_backend", None)
            .iter()
            .all(|n| n.id != "repo_db"));
        assert_eq!(ids(&graph.get_nodes_by_path("root/backend")), vec!["group_root_backend_all"]);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_remove_missing_and_root() {
        let mut graph = make_graph();
        assert!(matches!(graph.remove_node("nope"), Err(GraphError::NodeNotFound(_))));
        assert!(matches!(graph.remove_node(ROOT_ID), Err(GraphError::RootRemoval)));
        assert!(matches!(
            graph.remove_relationship("nope"),
            Err(GraphError::RelationshipNotFound(_))
        ));
    }

    #[test]
    fn test_build_indexes_matches_incremental() {
        let mut graph = make_graph();
        graph.remove_node("repo_api").unwrap();

        let before: Vec<(NodeType, Vec<String>)> = NodeType::ALL
            .iter()
            .map(|t| (*t, ids(&graph.get_nodes_by_type(*t))))
            .collect();
        let tagged = ids(&graph.get_nodes_by_tag("inherited"));
        let defines = graph.get_relationships_by_type(RelationType::Defines).len();

        graph.build_indexes();

        let after: Vec<(NodeType, Vec<String>)> = NodeType::ALL
            .iter()
            .map(|t| (*t, ids(&graph.get_nodes_by_type(*t))))
            .collect();
        assert_eq!(before, after);
        assert_eq!(tagged, ids(&graph.get_nodes_by_tag("inherited")));
        assert_eq!(defines, graph.get_relationships_by_type(RelationType::Defines).len());
    }

    #[test]
    fn test_validate_dangling_endpoint() {
        let mut graph = make_graph();
        graph
            .add_relationship(Relationship::new("tagged_x", "repo_api", "tag_env_prod", RelationType::TaggedWith))
            .unwrap();

        let err = graph.validate().unwrap_err();
        assert!(matches!(
            err,
            GraphError::DanglingEndpoint { ref endpoint, role: "to", .. } if endpoint == "tag_env_prod"
        ));
    }

    #[test]
    fn test_validate_structural_cycle() {
        let mut graph = make_graph();
        // Bypass add_child to plant a cycle
        if let Some(db) = graph.nodes.get_mut("repo_db") {
            db.children.push("config_top".into());
        }

        let err = graph.validate().unwrap_err();
        assert!(matches!(err, GraphError::StructuralCycle { .. }));
    }

    #[test]
    fn test_hierarchy_queries() {
        let graph = make_graph();

        let ancestors: Vec<&str> = graph
            .get_ancestors("repo_db")
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ancestors, vec!["config_backend", "config_top", "root"]);

        assert_eq!(
            ids(&graph.get_siblings("repo_db")),
            vec!["group_root_backend_all"]
        );
        assert!(graph.get_siblings(ROOT_ID).is_empty());
        assert_eq!(
            ids(&graph.get_descendants(ROOT_ID, Some(NodeType::Repository))),
            vec!["repo_api", "repo_db"]
        );
        assert_eq!(graph.get_descendants("repo_api", None).len(), 0);
        assert_eq!(
            ids(&graph.get_children("config_top", Some(NodeType::Config))),
            vec!["config_backend"]
        );
        assert!(graph.get_children("missing", None).is_empty());
    }

    #[test]
    fn test_preorder_and_config_hierarchy() {
        let graph = make_graph();
        let order: Vec<&str> = graph.preorder().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            order,
            vec!["root", "config_top", "config_backend", "repo_db", "group_root_backend_all", "repo_api"]
        );

        let hierarchy: Vec<(usize, &str)> = graph
            .config_hierarchy()
            .iter()
            .map(|e| (e.depth, e.node.name.as_str()))
            .collect();
        assert_eq!(hierarchy, vec![(0, "root"), (1, "backend")]);
    }

    #[test]
    fn test_relationship_queries() {
        let graph = make_graph();

        assert_eq!(graph.get_relationships("repo_db", None).len(), 2);
        assert_eq!(graph.get_relationships("repo_db", Some(RelationType::Includes)).len(), 1);
        assert_eq!(
            ids(&graph.get_related("repo_db", RelationType::Includes)),
            vec!["group_root_backend_all"]
        );
        assert_eq!(
            ids(&graph.get_related("config_top", RelationType::ParentChild)),
            vec!["config_backend", "root"]
        );
        assert_eq!(graph.get_outgoing_relations("config_top").len(), 2);
        assert!(graph.get_relationships("repo_unknown", None).is_empty());
    }

    #[test]
    fn test_classification_partitions() {
        let graph = make_graph();

        assert_eq!(ids(&graph.get_derived_nodes()), vec!["group_root_backend_all"]);
        assert_eq!(
            graph.get_explicit_nodes().len() + graph.get_derived_nodes().len(),
            graph.node_count()
        );
        assert_eq!(
            ids(&graph.get_config_entities()),
            vec!["config_backend", "config_top", "repo_api", "repo_db"]
        );
        assert_eq!(
            ids(&graph.get_logical_entities()),
            vec!["group_root_backend_all", "root"]
        );
    }

    #[test]
    fn test_repository_queries() {
        let graph = make_graph();

        assert_eq!(
            ids(&graph.get_repositories_in_scope("group_root_backend_all")),
            vec!["repo_db"]
        );
        assert_eq!(ids(&graph.get_repositories_in_scope(ROOT_ID)), vec!["repo_api", "repo_db"]);
        assert_eq!(ids(&graph.get_groups_for_repository("db")), vec!["group_root_backend_all"]);
        assert!(graph.get_groups_for_repository("api").is_empty());
        assert_eq!(ids(&graph.get_repositories_for_group("all")), vec!["repo_db"]);
        assert_eq!(
            ids(&graph.get_repositories_for_group("group_root_backend_all")),
            vec!["repo_db"]
        );
        assert!(graph.get_repositories_for_group("nope").is_empty());
    }

    #[test]
    fn test_effective_maps_closest_wins() {
        let mut graph = RepositoryGraph::new();
        let mut top = make_node("config_top", NodeType::Config, "root");
        top.variables.insert("REGION".into(), Value::from("eu"));
        top.variables.insert("TIER".into(), Value::from("gold"));
        top.templates.insert("build".into(), Value::from("make"));
        graph.add_node(top).unwrap();
        graph.add_child(ROOT_ID, "config_top").unwrap();

        let mut repo = make_node("repo_api", NodeType::Repository, "api");
        repo.variables.insert("TIER".into(), Value::from("silver"));
        graph.add_node(repo).unwrap();
        graph.add_child("config_top", "repo_api").unwrap();

        let vars = graph.effective_variables("repo_api");
        assert_eq!(vars["REGION"], Value::from("eu"));
        assert_eq!(vars["TIER"], Value::from("silver"));
        assert_eq!(graph.effective_templates("repo_api")["build"], Value::from("make"));
        assert!(graph.effective_variables("missing").is_empty());
    }

    #[test]
    fn test_nodes_by_property() {
        let mut graph = make_graph();
        let mut web = make_node("repo_web", NodeType::Repository, "web");
        web.set_property("disabled", true);
        graph.add_node(web).unwrap();

        assert_eq!(
            ids(&graph.get_nodes_by_property("disabled", &Value::from(true))),
            vec!["repo_web"]
        );
    }

    #[test]
    fn test_group_lookup_prefers_shallowest_scope() {
        let mut graph = make_graph();
        graph
            .add_node(make_node("group_root_all", NodeType::Group, "all"))
            .unwrap();
        graph.add_child("config_top", "group_root_all").unwrap();

        // Added last, but it sits at root scope
        assert_eq!(graph.group_node("all").unwrap().id, "group_root_all");
        graph.build_indexes();
        assert_eq!(graph.group_node("all").unwrap().id, "group_root_all");

        graph.remove_node("group_root_all").unwrap();
        assert_eq!(graph.group_node("all").unwrap().id, "group_root_backend_all");
    }

    #[test]
    fn test_group_lookup_ties_go_to_lowest_id() {
        let mut graph = make_graph();
        for id in ["group_root_backend_zz_all", "group_root_backend_aa_all"] {
            graph.add_node(make_node(id, NodeType::Group, "all")).unwrap();
            graph.add_child("config_backend", id).unwrap();
        }

        let before = graph.group_node("all").unwrap().id.clone();
        graph.build_indexes();
        assert_eq!(graph.group_node("all").unwrap().id, before);
        assert_eq!(before, "group_root_backend_aa_all");
    }

    #[test]
    fn test_stats_and_exports() {
        let graph = make_graph();

        let stats = graph.stats();
        assert_eq!(stats.nodes, 6);
        assert_eq!(stats.relationships, 5);
        assert_eq!(stats.derived, 1);
        assert_eq!(stats.nodes_by_type[&NodeType::Repository], 2);
        assert_eq!(stats.relationships_by_type[&RelationType::ParentChild], 2);

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph repograph {"));
        assert!(dot.contains("\"repo_db\" [label=\"db\\nrepository\", shape=box];"));
        assert!(dot.contains("\"config_top\" -> \"repo_api\" [label=\"defines\"];"));

        let json = serde_json::to_value(graph.snapshot()).unwrap();
        assert_eq!(json["root"], "root");
        assert_eq!(json["nodes"].as_array().unwrap().len(), 6);
        assert_eq!(json["stats"]["nodes_by_type"]["repository"], 2);
    }
}
