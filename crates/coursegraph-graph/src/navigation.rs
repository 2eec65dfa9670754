use crate::error::NavigatorError;
use coursegraph_core::{ChildKey, GraphNode, NodeId, ResourceQuery};
use std::collections::HashMap;

/// Walk `parent_id` links from `id` up to its group, returning the chain
/// root first.
pub fn ancestor_chain<'a>(
    nodes: &'a HashMap<NodeId, GraphNode>,
    id: &NodeId,
) -> Result<Vec<&'a GraphNode>, NavigatorError> {
    let mut chain = Vec::with_capacity(id.level().depth() + 1);
    let mut current = nodes
        .get(id)
        .ok_or_else(|| NavigatorError::UnknownNode(id.clone()))?;
    chain.push(current);

    while let Some(parent_id) = &current.parent_id {
        current = nodes
            .get(parent_id)
            .ok_or_else(|| NavigatorError::Orphan(current.id.clone()))?;
        chain.push(current);
    }

    chain.reverse();
    Ok(chain)
}

/// Map a selected node to the filter understood by the resource list.
pub fn resolve_query(
    nodes: &HashMap<NodeId, GraphNode>,
    id: &NodeId,
) -> Result<ResourceQuery, NavigatorError> {
    let mut query = ResourceQuery::default();
    for node in ancestor_chain(nodes, id)? {
        match node.id.natural_key() {
            ChildKey::Group(group_id) => query.group_id = Some(group_id),
            ChildKey::Major(major_id) => query.major_id = Some(major_id),
            ChildKey::Course(course_id) => query.course_id = Some(course_id),
            ChildKey::Type(resource_type) => query.resource_type = Some(resource_type),
        }
    }
    Ok(query)
}
