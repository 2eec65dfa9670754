use crate::config::LayoutConfig;
use coursegraph_core::{Edge, GraphNode, NodeId, Rect, Vec2};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Positions of every laid-out node (centre points) plus the box enclosing
/// all node rectangles.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub positions: BTreeMap<NodeId, Vec2>,
    pub bounds: Rect,
}

impl LayoutResult {
    pub fn empty() -> Self {
        Self {
            positions: BTreeMap::new(),
            bounds: Rect::NOTHING,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, id: &NodeId) -> Option<Vec2> {
        self.positions.get(id).copied()
    }
}

/// A laid-out subtree in coordinates relative to its root.
///
/// `left[d]` / `right[d]` are the outermost node edges at relative depth `d`.
struct Subtree<'a> {
    members: Vec<(&'a NodeId, f32, usize)>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Subtree<'_> {
    fn shift(&mut self, dx: f32) {
        for member in &mut self.members {
            member.1 += dx;
        }
        for x in self.left.iter_mut().chain(self.right.iter_mut()) {
            *x += dx;
        }
    }
}

/// Tidy-tree layouter.
///
/// Top-level groups hang off a virtual super-root that is never emitted.
/// Depth runs along `y` in steps of `level_separation`; siblings are packed
/// left to right in input order, as close as the contours of their subtrees
/// allow, and each parent is centred over its first and last child.
#[derive(Debug, Clone, Default)]
pub struct TreeLayouter {
    config: LayoutConfig,
}

impl TreeLayouter {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn layout(&self, nodes: &[GraphNode], edges: &[Edge]) -> LayoutResult {
        let present: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
        let mut children: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for edge in edges {
            if present.contains(&edge.parent) && present.contains(&edge.child) {
                children.entry(&edge.parent).or_default().push(&edge.child);
            }
        }
        let roots: Vec<&NodeId> = nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| &n.id)
            .collect();
        if roots.is_empty() {
            return LayoutResult::empty();
        }

        // Subtrees of separate groups never interact until the final merge.
        let subtrees: Vec<Subtree<'_>> = roots
            .par_iter()
            .map(|root| self.layout_subtree(*root, &children, 0))
            .collect();
        let forest = self.merge_siblings(subtrees);

        let half = Vec2::new(self.config.node_width, self.config.node_height) * 0.5;
        let mut positions = BTreeMap::new();
        let mut bounds: Option<Rect> = None;
        for (id, x, depth) in forest.members {
            let center = Vec2::new(x, depth as f32 * self.config.level_separation);
            let rect = Rect::from_min_max(center - half, center + half);
            bounds = Some(bounds.map_or(rect, |b| b.union(&rect)));
            positions.insert(id.clone(), center);
        }

        let skipped = nodes.len().saturating_sub(positions.len());
        if skipped > 0 {
            tracing::warn!(skipped, "layout skipped nodes without a laid-out parent");
        }

        LayoutResult {
            positions,
            bounds: bounds.unwrap_or(Rect::NOTHING),
        }
    }

    fn layout_subtree<'a>(
        &self,
        id: &'a NodeId,
        children: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
        depth: usize,
    ) -> Subtree<'a> {
        let half_width = self.config.node_width / 2.0;
        let kids = children.get(id).map(Vec::as_slice).unwrap_or_default();
        if kids.is_empty() {
            return Subtree {
                members: vec![(id, 0.0, depth)],
                left: vec![-half_width],
                right: vec![half_width],
            };
        }

        let laid_out = kids
            .iter()
            .map(|child| self.layout_subtree(*child, children, depth + 1))
            .collect();
        let below = self.merge_siblings(laid_out);

        let mut members = Vec::with_capacity(below.members.len() + 1);
        members.push((id, 0.0, depth));
        members.extend(below.members);
        let mut left = vec![-half_width];
        left.extend(below.left);
        let mut right = vec![half_width];
        right.extend(below.right);
        Subtree {
            members,
            left,
            right,
        }
    }

    /// Pack sibling subtrees left to right and centre the row on `x = 0`.
    fn merge_siblings<'a>(&self, subtrees: Vec<Subtree<'a>>) -> Subtree<'a> {
        let mut merged = Subtree {
            members: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        };
        let mut last_x = 0.0;

        for (index, mut subtree) in subtrees.into_iter().enumerate() {
            if index > 0 {
                let shift = merged
                    .right
                    .iter()
                    .zip(&subtree.left)
                    .enumerate()
                    .map(|(d, (r, l))| r - l + self.gap(d))
                    .fold(f32::NEG_INFINITY, f32::max);
                subtree.shift(shift);
                last_x = shift;
            }

            for (d, (l, r)) in subtree.left.iter().zip(&subtree.right).enumerate() {
                if d < merged.left.len() {
                    merged.left[d] = merged.left[d].min(*l);
                    merged.right[d] = merged.right[d].max(*r);
                } else {
                    merged.left.push(*l);
                    merged.right.push(*r);
                }
            }
            merged.members.extend(subtree.members);
        }

        merged.shift(-last_x / 2.0);
        merged
    }

    /// Minimum gap between neighbouring node edges `depth` levels below the
    /// row being packed.
    fn gap(&self, depth: usize) -> f32 {
        if depth == 0 {
            self.config.sibling_separation
        } else {
            self.config.subtree_separation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::{CourseId, GroupId, MajorId, derive_edges};
    use proptest::prelude::*;

    fn group(g: i64) -> GraphNode {
        GraphNode::new(NodeId::Group(GroupId(g)), format!("G{g}"), 1)
    }

    fn major(g: i64, m: i64) -> GraphNode {
        GraphNode::new(NodeId::Major(GroupId(g), MajorId(m)), format!("M{m}"), 1)
    }

    fn course(g: i64, m: i64, c: i64) -> GraphNode {
        GraphNode::new(
            NodeId::Course(GroupId(g), MajorId(m), CourseId(c)),
            format!("C{c}"),
            1,
        )
    }

    fn run(nodes: &[GraphNode]) -> LayoutResult {
        TreeLayouter::default().layout(nodes, &derive_edges(nodes))
    }

    #[test]
    fn test_empty_input() {
        let result = run(&[]);
        assert!(result.is_empty());
        assert_eq!(result.bounds, Rect::NOTHING);
    }

    #[test]
    fn test_depth_axis_follows_level() {
        let nodes = vec![group(1), major(1, 1), course(1, 1, 1)];
        let result = run(&nodes);
        let spacing = LayoutConfig::default().level_separation;
        for node in &nodes {
            let pos = result.position(&node.id).unwrap();
            assert_eq!(pos.y, node.level.depth() as f32 * spacing);
        }
    }

    #[test]
    fn test_parent_is_centred_over_children() {
        let nodes = vec![group(1), major(1, 1), major(1, 2), major(1, 3)];
        let result = run(&nodes);
        let parent = result.position(&nodes[0].id).unwrap();
        let first = result.position(&nodes[1].id).unwrap();
        let last = result.position(&nodes[3].id).unwrap();
        assert!((parent.x - (first.x + last.x) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_siblings_keep_input_order() {
        let nodes = vec![group(1), group(2), major(2, 5), major(2, 4), group(3)];
        let result = run(&nodes);
        let x = |n: &GraphNode| result.position(&n.id).unwrap().x;
        assert!(x(&nodes[0]) < x(&nodes[1]));
        assert!(x(&nodes[1]) < x(&nodes[4]));
        assert!(x(&nodes[2]) < x(&nodes[3]));
    }

    #[test]
    fn test_orphans_are_excluded() {
        let nodes = vec![group(1), major(1, 1), course(1, 9, 9)];
        let result = run(&nodes);
        assert_eq!(result.positions.len(), 2);
        assert!(result.position(&nodes[2].id).is_none());
    }

    #[test]
    fn test_bounds_cover_node_boxes() {
        let nodes = vec![group(1), major(1, 1), major(1, 2)];
        let result = run(&nodes);
        let config = LayoutConfig::default();
        for pos in result.positions.values() {
            let rect = Rect::from_center_size(*pos, Vec2::new(config.node_width, config.node_height));
            assert!(result.bounds.min.x <= rect.min.x && result.bounds.max.x >= rect.max.x);
            assert!(result.bounds.min.y <= rect.min.y && result.bounds.max.y >= rect.max.y);
        }
    }

    /// Random forest of up to three levels, built in preorder.
    fn forest_strategy() -> impl Strategy<Value = Vec<GraphNode>> {
        prop::collection::vec(prop::collection::vec(0usize..4, 0..4), 1..5).prop_map(|groups| {
            let mut nodes = Vec::new();
            let mut next = 1;
            for (g, majors) in groups.iter().enumerate() {
                let g = g as i64 + 1;
                nodes.push(group(g));
                for courses in majors {
                    let m = next;
                    next += 1;
                    nodes.push(major(g, m));
                    for _ in 0..*courses {
                        nodes.push(course(g, m, next));
                        next += 1;
                    }
                }
            }
            nodes
        })
    }

    proptest! {
        #[test]
        fn test_layout_is_pure(nodes in forest_strategy()) {
            let edges = derive_edges(&nodes);
            let layouter = TreeLayouter::default();
            let first = layouter.layout(&nodes, &edges);
            let second = layouter.layout(&nodes, &edges);
            prop_assert_eq!(first.positions.len(), nodes.len());
            for (id, pos) in &first.positions {
                let other = second.positions[id];
                prop_assert_eq!(pos.x.to_bits(), other.x.to_bits());
                prop_assert_eq!(pos.y.to_bits(), other.y.to_bits());
            }
            prop_assert_eq!(first.bounds, second.bounds);
        }

        #[test]
        fn test_nodes_on_a_level_never_overlap(nodes in forest_strategy()) {
            let result = TreeLayouter::default().layout(&nodes, &derive_edges(&nodes));
            let config = LayoutConfig::default();
            let min_distance = config.node_width
                + config.sibling_separation.min(config.subtree_separation)
                - 1e-2;
            let placed: Vec<Vec2> = result.positions.values().copied().collect();
            for (i, a) in placed.iter().enumerate() {
                for b in &placed[i + 1..] {
                    if a.y == b.y {
                        prop_assert!((a.x - b.x).abs() >= min_distance);
                    }
                }
            }
        }
    }
}
