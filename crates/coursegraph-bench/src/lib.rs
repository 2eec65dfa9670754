use coursegraph_api::AggregateRow;
use coursegraph_core::{ChildKey, CourseId, GraphNode, GroupId, MajorId, NodeId};

/// Fully expanded group/major/course forest in preorder.
pub fn synthetic_forest(groups: i64, majors_per_group: i64, courses_per_major: i64) -> Vec<GraphNode> {
    let mut nodes = Vec::new();
    for g in 1..=groups {
        let group = NodeId::Group(GroupId(g));
        nodes.push(GraphNode::new(group, format!("Group {g}"), 1));
        for m in 1..=majors_per_group {
            let major_id = MajorId(g * 1_000 + m);
            nodes.push(GraphNode::new(
                NodeId::Major(GroupId(g), major_id),
                format!("Major {}", major_id.0),
                1,
            ));
            for c in 1..=courses_per_major {
                let course_id = CourseId(major_id.0 * 1_000 + c);
                nodes.push(GraphNode::new(
                    NodeId::Course(GroupId(g), major_id, course_id),
                    format!("Course {}", course_id.0),
                    1,
                ));
            }
        }
    }
    nodes
}

pub fn major_rows(count: i64) -> Vec<AggregateRow> {
    (1..=count)
        .map(|m| AggregateRow::new(ChildKey::Major(MajorId(m)), format!("Major {m}"), 1))
        .collect()
}

pub fn course_rows(count: i64) -> Vec<AggregateRow> {
    (1..=count)
        .map(|c| AggregateRow::new(ChildKey::Course(CourseId(c)), format!("Course {c}"), 1))
        .collect()
}
