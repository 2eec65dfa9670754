use crate::{CourseId, GroupId, MajorId, ResourceType};
use serde::{Deserialize, Serialize};

/// Filter accepted by the resource-listing view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_id: Option<MajorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
}

impl ResourceQuery {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_none()
            && self.major_id.is_none()
            && self.course_id.is_none()
            && self.resource_type.is_none()
    }

    /// Key/value pairs in hierarchy order, ready to be URL-encoded.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(group_id) = self.group_id {
            pairs.push(("group_id", group_id.to_string()));
        }
        if let Some(major_id) = self.major_id {
            pairs.push(("major_id", major_id.to_string()));
        }
        if let Some(course_id) = self.course_id {
            pairs.push(("course_id", course_id.to_string()));
        }
        if let Some(resource_type) = &self.resource_type {
            pairs.push(("resource_type", resource_type.to_string()));
        }
        pairs
    }
}
