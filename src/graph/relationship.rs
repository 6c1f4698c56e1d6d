// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Typed, directed edges between nodes

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Structural containment
    ParentChild,
    /// Group includes repository
    Includes,
    /// Config defines repository or group
    Defines,
    /// Inheritance link
    Inherits,
    /// Dependency link
    DependsOn,
    /// Trigger link
    Triggers,
    /// Entity carries a tag
    TaggedWith,
    /// Entity carries a label
    LabeledWith,
}

impl RelationType {
    /// Every relationship type
    pub const ALL: [Self; 8] = [
        Self::ParentChild,
        Self::Includes,
        Self::Defines,
        Self::Inherits,
        Self::DependsOn,
        Self::Triggers,
        Self::TaggedWith,
        Self::LabeledWith,
    ];

    /// Stable snake_case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentChild => "parent_child",
            Self::Includes => "includes",
            Self::Defines => "defines",
            Self::Inherits => "inherits",
            Self::DependsOn => "depends_on",
            Self::Triggers => "triggers",
            Self::TaggedWith => "tagged_with",
            Self::LabeledWith => "labeled_with",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge; immutable once added to a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    /// Unique ID
    pub id: String,
    /// Source node ID
    pub from: String,
    /// Target node ID
    pub to: String,
    /// Edge kind
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    /// Extension properties
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Relationship {
    /// Create a relationship with no properties
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            relation_type,
            properties: BTreeMap::new(),
        }
    }

    /// The endpoint opposite `node_id`, if `node_id` is an endpoint
    #[must_use]
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.from == node_id {
            Some(&self.to)
        } else if self.to == node_id {
            Some(&self.from)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_end() {
        let rel = Relationship::new("inc_g_r", "group_root_all", "repo_api", RelationType::Includes);
        assert_eq!(rel.other_end("group_root_all"), Some("repo_api"));
        assert_eq!(rel.other_end("repo_api"), Some("group_root_all"));
        assert_eq!(rel.other_end("repo_web"), None);
    }

    #[test]
    fn test_serialized_names() {
        let rel = Relationship::new("tagged_a_t", "a", "t", RelationType::TaggedWith);
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "tagged_with");
        assert!(json.get("properties").is_none());
        assert_eq!(RelationType::LabeledWith.to_string(), "labeled_with");
    }
}
