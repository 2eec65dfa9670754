use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod geometry;
pub mod node;
pub mod query;

pub use geometry::{Rect, Vec2};
pub use node::{Edge, GraphNode, derive_edges};
pub use query::ResourceQuery;

// ============================================================================
// Natural keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MajorId(pub i64);

impl fmt::Display for MajorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub i64);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource kind as reported by the backend (`doc`, `video`, `ppt`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(pub String);

impl ResourceType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Group,
    Major,
    Course,
    Type,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Group, Level::Major, Level::Course, Level::Type];

    /// Zero-based depth of the level in the hierarchy.
    pub fn depth(self) -> usize {
        match self {
            Level::Group => 0,
            Level::Major => 1,
            Level::Course => 2,
            Level::Type => 3,
        }
    }

    pub fn child(self) -> Option<Level> {
        match self {
            Level::Group => Some(Level::Major),
            Level::Major => Some(Level::Course),
            Level::Course => Some(Level::Type),
            Level::Type => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.child().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Group => "group",
            Level::Major => "major",
            Level::Course => "course",
            Level::Type => "type",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a child row, tagged with the level it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildKey {
    Group(GroupId),
    Major(MajorId),
    Course(CourseId),
    Type(ResourceType),
}

impl ChildKey {
    pub fn level(&self) -> Level {
        match self {
            ChildKey::Group(_) => Level::Group,
            ChildKey::Major(_) => Level::Major,
            ChildKey::Course(_) => Level::Course,
            ChildKey::Type(_) => Level::Type,
        }
    }
}

// ============================================================================
// Node identity
// ============================================================================

/// Identity of a materialized node.
///
/// Each variant carries the full chain of natural keys from the group down, so
/// the same logical entity under the same ancestors always maps to the same id
/// regardless of when or in which order it was fetched.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub enum NodeId {
    Group(GroupId),
    Major(GroupId, MajorId),
    Course(GroupId, MajorId, CourseId),
    Type(GroupId, MajorId, CourseId, ResourceType),
}

impl NodeId {
    pub fn group(id: GroupId) -> Self {
        NodeId::Group(id)
    }

    pub fn level(&self) -> Level {
        match self {
            NodeId::Group(..) => Level::Group,
            NodeId::Major(..) => Level::Major,
            NodeId::Course(..) => Level::Course,
            NodeId::Type(..) => Level::Type,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            NodeId::Group(_) => None,
            NodeId::Major(g, _) => Some(NodeId::Group(*g)),
            NodeId::Course(g, m, _) => Some(NodeId::Major(*g, *m)),
            NodeId::Type(g, m, c, _) => Some(NodeId::Course(*g, *m, *c)),
        }
    }

    /// Id of the child identified by `key`, or `None` when `key` is not of the
    /// level directly below this node.
    pub fn child(&self, key: &ChildKey) -> Option<NodeId> {
        match (self, key) {
            (NodeId::Group(g), ChildKey::Major(m)) => Some(NodeId::Major(*g, *m)),
            (NodeId::Major(g, m), ChildKey::Course(c)) => Some(NodeId::Course(*g, *m, *c)),
            (NodeId::Course(g, m, c), ChildKey::Type(t)) => {
                Some(NodeId::Type(*g, *m, *c, t.clone()))
            }
            _ => None,
        }
    }

    pub fn natural_key(&self) -> ChildKey {
        match self {
            NodeId::Group(g) => ChildKey::Group(*g),
            NodeId::Major(_, m) => ChildKey::Major(*m),
            NodeId::Course(_, _, c) => ChildKey::Course(*c),
            NodeId::Type(_, _, _, t) => ChildKey::Type(t.clone()),
        }
    }

    pub fn group_id(&self) -> GroupId {
        match self {
            NodeId::Group(g) | NodeId::Major(g, _) | NodeId::Course(g, _, _) => *g,
            NodeId::Type(g, _, _, _) => *g,
        }
    }

    pub fn major_id(&self) -> Option<MajorId> {
        match self {
            NodeId::Group(_) => None,
            NodeId::Major(_, m) | NodeId::Course(_, m, _) => Some(*m),
            NodeId::Type(_, m, _, _) => Some(*m),
        }
    }

    pub fn course_id(&self) -> Option<CourseId> {
        match self {
            NodeId::Course(_, _, c) | NodeId::Type(_, _, c, _) => Some(*c),
            _ => None,
        }
    }

    pub fn resource_type(&self) -> Option<&ResourceType> {
        match self {
            NodeId::Type(_, _, _, t) => Some(t),
            _ => None,
        }
    }
}

/// Canonical text form, e.g. `group-7/major-3/course-12/type-doc`. The
/// resource type is percent-encoded so it can never contain a `/` or
/// surrounding whitespace.
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Group(g) => write!(f, "group-{g}"),
            NodeId::Major(g, m) => write!(f, "group-{g}/major-{m}"),
            NodeId::Course(g, m, c) => write!(f, "group-{g}/major-{m}/course-{c}"),
            NodeId::Type(g, m, c, t) => write!(
                f,
                "group-{g}/major-{m}/course-{c}/type-{}",
                urlencoding::encode(t.as_str())
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseNodeIdError {
    #[error("empty node id")]
    Empty,
    #[error("segment `{segment}` is not a valid {expected} key")]
    InvalidSegment {
        segment: String,
        expected: Level,
    },
    #[error("node id has {0} segments, expected at most 4")]
    TooManySegments(usize),
}

fn parse_numeric_segment(segment: &str, level: Level) -> Result<i64, ParseNodeIdError> {
    let prefix = format!("{}-", level.as_str());
    segment
        .strip_prefix(prefix.as_str())
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| ParseNodeIdError::InvalidSegment {
            segment: segment.to_string(),
            expected: level,
        })
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ParseNodeIdError::Empty);
        }

        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() > Level::ALL.len() {
            return Err(ParseNodeIdError::TooManySegments(segments.len()));
        }

        let group = GroupId(parse_numeric_segment(segments[0], Level::Group)?);
        let mut id = NodeId::Group(group);
        for segment in segments.iter().skip(1) {
            let key = match id.level().child() {
                Some(Level::Major) => {
                    ChildKey::Major(MajorId(parse_numeric_segment(segment, Level::Major)?))
                }
                Some(Level::Course) => {
                    ChildKey::Course(CourseId(parse_numeric_segment(segment, Level::Course)?))
                }
                Some(Level::Type) => match segment
                    .strip_prefix("type-")
                    .and_then(|value| urlencoding::decode(value).ok())
                {
                    Some(value) if !value.is_empty() => {
                        ChildKey::Type(ResourceType::new(value.into_owned()))
                    }
                    _ => {
                        return Err(ParseNodeIdError::InvalidSegment {
                            segment: segment.to_string(),
                            expected: Level::Type,
                        });
                    }
                },
                Some(Level::Group) | None => {
                    return Err(ParseNodeIdError::TooManySegments(segments.len()));
                }
            };
            let expected = key.level();
            id = id
                .child(&key)
                .ok_or_else(|| ParseNodeIdError::InvalidSegment {
                    segment: segment.to_string(),
                    expected,
                })?;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_order_and_terminal() {
        assert_eq!(Level::Group.child(), Some(Level::Major));
        assert_eq!(Level::Course.child(), Some(Level::Type));
        assert!(Level::Type.is_terminal());
        assert!(!Level::Group.is_terminal());
        for (depth, level) in Level::ALL.iter().enumerate() {
            assert_eq!(level.depth(), depth);
        }
    }

    #[test]
    fn test_child_rejects_wrong_level() {
        let group = NodeId::group(GroupId(1));
        assert!(group.child(&ChildKey::Course(CourseId(5))).is_none());
        assert!(group.child(&ChildKey::Group(GroupId(2))).is_none());

        let ty = NodeId::Type(GroupId(1), MajorId(2), CourseId(3), ResourceType::new("doc"));
        assert!(ty.child(&ChildKey::Type(ResourceType::new("video"))).is_none());
    }

    #[test]
    fn test_parent_chain_walks_to_group() {
        let ty = NodeId::Type(GroupId(7), MajorId(3), CourseId(12), ResourceType::new("doc"));
        let course = ty.parent().unwrap();
        let major = course.parent().unwrap();
        let group = major.parent().unwrap();
        assert_eq!(course, NodeId::Course(GroupId(7), MajorId(3), CourseId(12)));
        assert_eq!(major, NodeId::Major(GroupId(7), MajorId(3)));
        assert_eq!(group, NodeId::Group(GroupId(7)));
        assert!(group.parent().is_none());
    }

    #[test]
    fn test_display_format() {
        let ty = NodeId::Type(GroupId(7), MajorId(3), CourseId(12), ResourceType::new("doc"));
        assert_eq!(ty.to_string(), "group-7/major-3/course-12/type-doc");
        assert_eq!(NodeId::group(GroupId(7)).to_string(), "group-7");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert_eq!("".parse::<NodeId>(), Err(ParseNodeIdError::Empty));
        assert!("major-1".parse::<NodeId>().is_err());
        assert!("group-x".parse::<NodeId>().is_err());
        assert!("group-1/course-2".parse::<NodeId>().is_err());
        assert!("group-1/major-2/course-3/type-".parse::<NodeId>().is_err());
        assert!(matches!(
            "group-1/major-2/course-3/type-doc/extra".parse::<NodeId>(),
            Err(ParseNodeIdError::TooManySegments(5))
        ));
    }

    #[test]
    fn test_type_segment_is_escaped() {
        let id = NodeId::Type(
            GroupId(1),
            MajorId(2),
            CourseId(3),
            ResourceType::new("application/pdf"),
        );
        assert_eq!(
            id.to_string(),
            "group-1/major-2/course-3/type-application%2Fpdf"
        );
        assert_eq!(id.to_string().parse::<NodeId>(), Ok(id.clone()));

        let spaced = NodeId::Type(GroupId(1), MajorId(2), CourseId(3), ResourceType::new(" lab notes "));
        let json = serde_json::to_string(&spaced).unwrap();
        assert_eq!(json, r#""group-1/major-2/course-3/type-%20lab%20notes%20""#);
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spaced);
    }

    #[test]
    fn test_node_id_serializes_as_string() {
        let id = NodeId::Major(GroupId(1), MajorId(2));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""group-1/major-2""#);
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    fn node_id_strategy() -> impl Strategy<Value = NodeId> {
        (
            0i64..1000,
            proptest::option::of(0i64..1000),
            proptest::option::of(0i64..1000),
            proptest::option::of(prop_oneof![
                "[a-z][a-z_-]{0,8}",
                "[a-z /%+._-]{1,12}",
                "\\PC{1,10}",
            ]),
        )
            .prop_map(|(g, m, c, t)| {
                let mut id = NodeId::group(GroupId(g));
                if let Some(m) = m {
                    id = id.child(&ChildKey::Major(MajorId(m))).unwrap();
                    if let Some(c) = c {
                        id = id.child(&ChildKey::Course(CourseId(c))).unwrap();
                        if let Some(t) = t {
                            id = id.child(&ChildKey::Type(ResourceType::new(t))).unwrap();
                        }
                    }
                }
                id
            })
    }

    proptest! {
        #[test]
        fn prop_text_form_is_stable(id in node_id_strategy()) {
            let parsed: NodeId = id.to_string().parse().unwrap();
            prop_assert_eq!(&parsed, &id);
        }

        #[test]
        fn prop_child_of_parent_is_identity(id in node_id_strategy()) {
            if let Some(parent) = id.parent() {
                prop_assert_eq!(parent.child(&id.natural_key()), Some(id.clone()));
                prop_assert_eq!(parent.level().child(), Some(id.level()));
            }
        }
    }
}
