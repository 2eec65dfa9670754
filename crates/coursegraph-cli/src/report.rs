use coursegraph_api::AggregationClient;
use coursegraph_core::{GraphNode, Level, NodeId, Rect, ResourceQuery};
use coursegraph_graph::{Navigator, Notice, StoreStats, ViewTransform};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct Selection {
    pub id: NodeId,
    pub query: ResourceQuery,
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub label: String,
    pub level: Level,
    pub count: u64,
    pub expanded: bool,
    pub errored: bool,
    pub visible: bool,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

/// Final state of a CLI session.
#[derive(Debug, Serialize)]
pub struct Report {
    pub stats: StoreStats,
    pub nodes: Vec<NodeReport>,
    pub bounds: Rect,
    pub transform: ViewTransform,
    pub notices: Vec<Notice>,
    pub selection: Option<Selection>,
}

impl Report {
    pub fn capture<C: AggregationClient>(nav: &Navigator<C>, selection: Option<Selection>) -> Self {
        let layout = nav.layout();
        let visible: HashSet<NodeId> = nav.visible_nodes().into_iter().collect();
        let nodes = nav
            .nodes()
            .into_iter()
            .map(|node: GraphNode| {
                let position = layout.position(&node.id);
                NodeReport {
                    visible: visible.contains(&node.id),
                    x: position.map(|p| p.x),
                    y: position.map(|p| p.y),
                    id: node.id,
                    label: node.label,
                    level: node.level,
                    count: node.count,
                    expanded: node.expanded,
                    errored: node.errored,
                }
            })
            .collect();

        Self {
            stats: nav.store().stats(),
            nodes,
            bounds: layout.bounds,
            transform: nav.viewport().transform(),
            notices: nav.notices().to_vec(),
            selection,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            let indent = "  ".repeat(node.level.depth());
            let marker = if node.errored {
                "[!]"
            } else if node.level.is_terminal() {
                " - "
            } else if node.expanded {
                "[-]"
            } else {
                "[+]"
            };
            let _ = write!(out, "{indent}{marker} {} ({})  {}", node.label, node.count, node.id);
            if let (Some(x), Some(y)) = (node.x, node.y) {
                let _ = write!(out, "  @ ({x:.0}, {y:.0})");
            }
            out.push('\n');
        }

        let s = &self.stats;
        let _ = writeln!(
            out,
            "\n{} nodes: {} groups, {} majors, {} courses, {} types ({} errored)",
            s.total, s.groups, s.majors, s.courses, s.types, s.errored
        );
        let in_view = self.nodes.iter().filter(|n| n.visible).count();
        let _ = writeln!(out, "{in_view} of {} nodes in view", self.nodes.len());
        let _ = writeln!(
            out,
            "view: scale {:.2}, offset ({:.0}, {:.0}), bounds {:.0}x{:.0}",
            self.transform.scale,
            self.transform.translation.x,
            self.transform.translation.y,
            self.bounds.width(),
            self.bounds.height()
        );

        for notice in &self.notices {
            let line = match notice {
                Notice::Truncated {
                    parent,
                    received,
                    kept,
                } => match parent {
                    Some(parent) => format!("showing {kept} of {received} children of {parent}"),
                    None => format!("showing {kept} of {received} groups"),
                },
                Notice::SoftBudget { node_count, limit } => {
                    format!("{node_count} nodes on screen (more than {limit}); the view may be slow")
                }
                Notice::HardBudget {
                    node,
                    projected,
                    limit,
                } => format!(
                    "expanding {node} would show {projected} nodes (limit {limit}); collapse something first"
                ),
                Notice::LargeInitialGraph {
                    node_count,
                    threshold,
                } => format!("initial graph has {node_count} nodes (comfortable: {threshold})"),
            };
            let level = if notice.is_blocking() { "error" } else { "warning" };
            let _ = writeln!(out, "{level}: {line}");
        }

        if let Some(selection) = &self.selection {
            let _ = writeln!(out, "selected {}: {}", selection.id, selection.link);
        }
        out
    }
}
