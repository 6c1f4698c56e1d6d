// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Flattened configuration views over a built graph

use super::node::{NodeType, ROOT_PATH};
use super::store::RepositoryGraph;
use crate::types::{Config, GlobalConfig};
use std::collections::{BTreeMap, HashMap};

/// Worker count used when no top-level file sets one
pub const MERGED_DEFAULT_WORKERS: usize = 8;

/// Timeout used when no top-level file sets one
pub const MERGED_DEFAULT_TIMEOUT_SECS: u64 = 300;

impl RepositoryGraph {
    /// Resolved group members keyed by display name
    ///
    /// Names shared by groups in different scopes are prefixed with the
    /// nearest scope segment (`backend-all`), or with the whole scope path
    /// when that is still ambiguous. Groups without members are left out.
    #[must_use]
    pub fn groups_for_display(&self) -> BTreeMap<String, Vec<String>> {
        let groups = self.get_nodes_by_type(NodeType::Group);

        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for node in &groups {
            *name_counts.entry(node.name.as_str()).or_default() += 1;
        }

        let mut result = BTreeMap::new();
        for node in groups {
            let Some(group) = node.group() else {
                continue;
            };
            let members = group.members();
            if members.is_empty() {
                continue;
            }

            let scope = node.full_path();
            let mut display = node.name.clone();
            if name_counts.get(node.name.as_str()).copied().unwrap_or(0) > 1 && scope != ROOT_PATH {
                if let Some(segment) = scope.rsplit('/').next().filter(|s| *s != ROOT_PATH) {
                    display = format!("{segment}-{}", node.name);
                }
            }
            if result.contains_key(&display) {
                display = format!("{}-{}", scope.replace('/', "-"), node.name);
            }
            if result.contains_key(&display) {
                display.clone_from(&node.id);
            }

            result.insert(display, members);
        }
        result
    }

    /// Single configuration record assembled from the graph
    ///
    /// Repositories are sorted by name and groups come from
    /// [`RepositoryGraph::groups_for_display`]. Version and global settings
    /// come from top-level files only, first non-empty value winning.
    /// Templates are merged from every file by depth, then include order, and
    /// the first definition of a name wins.
    #[must_use]
    pub fn merged_config(&self) -> Config {
        let mut repositories: Vec<_> = self
            .get_nodes_by_type(NodeType::Repository)
            .into_iter()
            .filter_map(|node| node.repository().cloned())
            .collect();
        repositories.sort_by(|a, b| a.name.cmp(&b.name));

        let mut configs: Vec<_> = self
            .preorder()
            .into_iter()
            .filter(|node| node.node_type == NodeType::Config)
            .collect();
        // Stable sort keeps pre-order within a level
        configs.sort_by_key(|node| node.level());

        let mut merged = Config {
            version: String::new(),
            includes: Vec::new(),
            global: GlobalConfig::default(),
            repositories,
            groups: self.groups_for_display(),
            templates: BTreeMap::new(),
        };

        let top_level = configs
            .iter()
            .filter(|node| node.level() == 1)
            .filter_map(|node| node.config());
        for config in top_level {
            if merged.version.is_empty() {
                merged.version.clone_from(&config.version);
            }
            let global = &config.global;
            if merged.global.base_path.is_empty() {
                merged.global.base_path.clone_from(&global.base_path);
            }
            if merged.global.workers == 0 {
                merged.global.workers = global.workers;
            }
            if merged.global.timeout == 0 {
                merged.global.timeout = global.timeout;
            }
            for (key, value) in &global.environment {
                merged
                    .global
                    .environment
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        if merged.global.workers == 0 {
            merged.global.workers = MERGED_DEFAULT_WORKERS;
        }
        if merged.global.timeout == 0 {
            merged.global.timeout = MERGED_DEFAULT_TIMEOUT_SECS;
        }

        for config in configs.iter().filter_map(|node| node.config()) {
            for (name, template) in &config.templates {
                merged
                    .templates
                    .entry(name.clone())
                    .or_insert_with(|| template.clone());
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{GraphBuilder, RepositoryGraph};
    use crate::loader::MemoryLoader;
    use crate::types::{Config, Repository};
    use serde_json::Value;

    fn make_config(repos: &[&str]) -> Config {
        Config {
            repositories: repos
                .iter()
                .map(|name| Repository {
                    name: (*name).into(),
                    path: (*name).into(),
                    url: format!("https://example.com/{name}.git"),
                    ..Repository::default()
                })
                .collect(),
            ..Config::default()
        }
    }

    fn make_fleet() -> RepositoryGraph {
        let mut root = make_config(&["web", "api"]);
        root.version = "1.0".into();
        root.global.base_path = "/src".into();
        root.global.environment.insert("REGION".into(), "eu".into());
        root.includes = vec![
            "configs/backend/backend.yaml".into(),
            "configs/frontend/frontend.yaml".into(),
        ];
        root.groups.insert("all".into(), vec![]);
        root.templates.insert("build".into(), Value::from("make"));

        let mut backend = make_config(&["db"]);
        backend.global.workers = 50;
        backend.global.base_path = "/elsewhere".into();
        backend.groups.insert("all".into(), vec![]);
        backend.groups.insert("empty".into(), vec!["ghost".into()]);
        backend.templates.insert("build".into(), Value::from("cargo build"));
        backend.templates.insert("test".into(), Value::from("cargo test"));

        let mut frontend = make_config(&["ui"]);
        frontend.groups.insert("all".into(), vec![]);
        frontend.templates.insert("test".into(), Value::from("npm test"));

        let loader = MemoryLoader::new()
            .with("/fleet/root.yaml", root)
            .with("/fleet/configs/backend/backend.yaml", backend)
            .with("/fleet/configs/frontend/frontend.yaml", frontend);
        GraphBuilder::new(loader).build("/fleet/root.yaml").unwrap()
    }

    #[test]
    fn test_groups_for_display_disambiguates() {
        let graph = make_fleet();
        let groups = graph.groups_for_display();

        assert_eq!(groups["all"], vec!["api", "db", "ui", "web"]);
        assert_eq!(groups["backend-all"], vec!["db"]);
        assert_eq!(groups["frontend-all"], vec!["ui"]);
        assert_eq!(groups.len(), 4);
        // Explicit member names are resolved as written
        assert_eq!(groups["empty"], vec!["ghost"]);
    }

    #[test]
    fn test_merged_config() {
        let graph = make_fleet();
        let merged = graph.merged_config();

        let names: Vec<&str> = merged.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "db", "ui", "web"]);
        assert_eq!(merged.version, "1.0");
        assert_eq!(merged.global.base_path, "/src");
        assert_eq!(merged.global.workers, super::MERGED_DEFAULT_WORKERS);
        assert_eq!(merged.global.timeout, super::MERGED_DEFAULT_TIMEOUT_SECS);
        assert_eq!(merged.global.environment["REGION"], "eu");
        assert_eq!(merged.templates["build"], Value::from("make"));
        // backend is included before frontend
        assert_eq!(merged.templates["test"], Value::from("cargo test"));
        assert!(merged.includes.is_empty());
        assert_eq!(merged.groups, graph.groups_for_display());
    }

    #[test]
    fn test_empty_graph_projection() {
        let graph = RepositoryGraph::new();
        assert!(graph.groups_for_display().is_empty());
        let merged = graph.merged_config();
        assert!(merged.repositories.is_empty());
        assert_eq!(merged.global.workers, super::MERGED_DEFAULT_WORKERS);
    }
}
