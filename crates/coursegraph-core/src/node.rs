use crate::{Level, NodeId, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One materialized node of the navigator tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub level: Level,
    /// Absent only for group nodes.
    pub parent_id: Option<NodeId>,
    /// Aggregate cardinality reported by the backend.
    pub count: u64,
    pub expanded: bool,
    pub loading: bool,
    pub errored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
}

impl GraphNode {
    /// Create a collapsed, idle node. Level, parent and resource type all
    /// follow from the id.
    pub fn new(id: NodeId, label: impl Into<String>, count: u64) -> Self {
        Self {
            level: id.level(),
            parent_id: id.parent(),
            resource_type: id.resource_type().cloned(),
            id,
            label: label.into(),
            count,
            expanded: false,
            loading: false,
            errored: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.level.is_terminal()
    }
}

/// Parent-to-child link. Never stored, always derived from the node set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub parent: NodeId,
    pub child: NodeId,
}

/// Derive `(parent, child)` edges in node order, skipping nodes whose parent
/// is not part of `nodes`.
pub fn derive_edges(nodes: &[GraphNode]) -> Vec<Edge> {
    let present: HashSet<&NodeId> = nodes.iter().map(|node| &node.id).collect();
    nodes
        .iter()
        .filter_map(|node| {
            let parent = node.parent_id.as_ref()?;
            present.contains(parent).then(|| Edge {
                parent: parent.clone(),
                child: node.id.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CourseId, GroupId, MajorId};

    #[test]
    fn test_new_node_derives_hierarchy_fields() {
        let id = NodeId::Type(GroupId(1), MajorId(2), CourseId(3), ResourceType::new("video"));
        let node = GraphNode::new(id.clone(), "Video", 4);
        assert_eq!(node.level, Level::Type);
        assert_eq!(
            node.parent_id,
            Some(NodeId::Course(GroupId(1), MajorId(2), CourseId(3)))
        );
        assert_eq!(node.resource_type, Some(ResourceType::new("video")));
        assert!(node.is_terminal());
        assert!(!node.expanded && !node.loading && !node.errored);
    }

    #[test]
    fn test_derive_edges_skips_orphans() {
        let group = GraphNode::new(NodeId::group(GroupId(1)), "G", 3);
        let major = GraphNode::new(NodeId::Major(GroupId(1), MajorId(1)), "M", 3);
        let orphan = GraphNode::new(NodeId::Major(GroupId(9), MajorId(1)), "Lost", 1);

        let edges = derive_edges(&[group.clone(), major.clone(), orphan]);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].parent, group.id);
        assert_eq!(edges[0].child, major.id);
    }
}
