//! Materialized node set of the navigator.
//!
//! Nodes live in an id-indexed arena with an explicit `parent -> children`
//! adjacency list, so collapse and merge never rescan the whole set. Fetches
//! are split into a `begin` half that hands out a [`FetchTicket`] and a
//! `complete` half that commits the result; the caller awaits the aggregation
//! call in between without holding a borrow of the store.

use crate::config::BudgetConfig;
use crate::error::NavigatorError;
use crate::navigation::ancestor_chain;
use coursegraph_api::{AggregateRow, AggregationRequest, FetchError};
use coursegraph_core::{ChildKey, Edge, GraphNode, Level, NodeId, derive_edges};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which budget policy a fetch is committed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// User-triggered expansion, checked against the soft and hard ceilings.
    Interactive,
    /// Best-effort major loading during root load, checked against the
    /// initial-expansion cap.
    Eager,
}

/// Handle for one outstanding fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub node_id: NodeId,
    pub seq: u64,
    pub purpose: FetchPurpose,
    pub request: AggregationRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Loading,
    Terminal,
    NotErrored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Collapsed { removed: usize },
    FetchStarted(FetchTicket),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Expanded {
        id: NodeId,
        added: usize,
        received: usize,
        kept: usize,
        total: usize,
        over_soft: bool,
    },
    Failed {
        id: NodeId,
        error: FetchError,
    },
    /// The result was discarded because committing it would have pushed the
    /// graph past `limit`.
    OverBudget {
        id: NodeId,
        projected: usize,
        limit: usize,
    },
    Stale {
        id: NodeId,
    },
}

/// Conditions surfaced to the user as banners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Truncated {
        parent: Option<NodeId>,
        received: usize,
        kept: usize,
    },
    SoftBudget {
        node_count: usize,
        limit: usize,
    },
    HardBudget {
        node: NodeId,
        projected: usize,
        limit: usize,
    },
    LargeInitialGraph {
        node_count: usize,
        threshold: usize,
    },
}

impl Notice {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Notice::HardBudget { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RootSummary {
    pub node_count: usize,
    pub groups: usize,
    pub expanded_groups: usize,
    pub large: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub groups: usize,
    pub majors: usize,
    pub courses: usize,
    pub types: usize,
    pub expanded: usize,
    pub loading: usize,
    pub errored: usize,
}

/// Node set captured after a root load, in preorder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub nodes: Vec<GraphNode>,
}

#[derive(Debug, Clone, Default)]
pub struct TreeStateStore {
    budget: BudgetConfig,
    nodes: HashMap<NodeId, GraphNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
    in_flight: HashMap<NodeId, u64>,
    next_ticket: u64,
    notices: Vec<Notice>,
}

impl TreeStateStore {
    pub fn new(budget: BudgetConfig) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_map(&self) -> &HashMap<NodeId, GraphNode> {
        &self.nodes
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children_of(&self, id: &NodeId) -> &[NodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes in preorder: groups in response order, children in the order
    /// they were attached.
    pub fn nodes(&self) -> Vec<GraphNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&NodeId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node.clone());
            }
            stack.extend(self.children_of(id).iter().rev());
        }
        out
    }

    pub fn edges(&self) -> Vec<Edge> {
        derive_edges(&self.nodes())
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            match node.level {
                Level::Group => stats.groups += 1,
                Level::Major => stats.majors += 1,
                Level::Course => stats.courses += 1,
                Level::Type => stats.types += 1,
            }
            stats.expanded += usize::from(node.expanded);
            stats.loading += usize::from(node.loading);
            stats.errored += usize::from(node.errored);
        }
        stats
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn has_blocking_notice(&self) -> bool {
        self.notices.iter().any(Notice::is_blocking)
    }

    pub fn dismiss_notice(&mut self, index: usize) -> Option<Notice> {
        (index < self.notices.len()).then(|| self.notices.remove(index))
    }

    pub fn dismiss_all(&mut self) {
        self.notices.clear();
    }

    fn notify(&mut self, notice: Notice) {
        tracing::warn!(?notice, "navigator notice");
        self.notices.push(notice);
    }

    // ------------------------------------------------------------------
    // Root load
    // ------------------------------------------------------------------

    /// Drop every node and outstanding ticket and return the group-level
    /// request.
    pub fn begin_root_load(&mut self) -> AggregationRequest {
        self.clear();
        AggregationRequest::new(
            Level::Group,
            self.budget.fetch_limit,
            self.budget.include_empty,
        )
    }

    /// Attach the group rows. Returns the number of groups attached.
    pub fn complete_root_load(&mut self, rows: Vec<AggregateRow>) -> usize {
        self.clear();
        let received = rows.len();
        let rows = self.dedupe_and_cap(None, Level::Group, rows);
        if rows.len() < received {
            self.notify(Notice::Truncated {
                parent: None,
                received,
                kept: rows.len(),
            });
        }

        for row in rows {
            if let ChildKey::Group(group_id) = row.key {
                let id = NodeId::Group(group_id);
                self.roots.push(id.clone());
                self.nodes
                    .insert(id.clone(), GraphNode::new(id, row.label, row.count));
            }
        }
        tracing::debug!(groups = self.roots.len(), "attached group nodes");
        self.roots.len()
    }

    /// Start an eager major fetch for a group during root load.
    pub fn begin_eager_expand(&mut self, id: &NodeId) -> Result<ToggleOutcome, NavigatorError> {
        self.begin_fetch(id, FetchPurpose::Eager)
    }

    /// Close a root load: records the size warning when the initial graph is
    /// larger than comfortable.
    pub fn finish_root_load(&mut self) -> RootSummary {
        let node_count = self.nodes.len();
        let expanded_groups = self
            .roots
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.expanded))
            .count();
        let large = node_count > self.budget.comfortable_threshold;
        if large {
            self.notify(Notice::LargeInitialGraph {
                node_count,
                threshold: self.budget.comfortable_threshold,
            });
        }
        RootSummary {
            node_count,
            groups: self.roots.len(),
            expanded_groups,
            large,
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.children.clear();
        self.roots.clear();
        self.in_flight.clear();
        self.notices.clear();
    }

    // ------------------------------------------------------------------
    // Expand / collapse
    // ------------------------------------------------------------------

    pub fn toggle_expand(&mut self, id: &NodeId) -> Result<ToggleOutcome, NavigatorError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NavigatorError::UnknownNode(id.clone()))?;
        if node.expanded {
            let removed = self.collapse(id);
            return Ok(ToggleOutcome::Collapsed { removed });
        }
        self.begin_fetch(id, FetchPurpose::Interactive)
    }

    /// Start a fetch for an errored node. Nodes that are not errored are left
    /// alone, so a retry can never collapse an expanded node.
    pub fn retry(&mut self, id: &NodeId) -> Result<ToggleOutcome, NavigatorError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NavigatorError::UnknownNode(id.clone()))?;
        if !node.errored {
            return Ok(ToggleOutcome::Ignored(IgnoreReason::NotErrored));
        }
        self.begin_fetch(id, FetchPurpose::Interactive)
    }

    fn begin_fetch(
        &mut self,
        id: &NodeId,
        purpose: FetchPurpose,
    ) -> Result<ToggleOutcome, NavigatorError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NavigatorError::UnknownNode(id.clone()))?;
        if node.loading {
            return Ok(ToggleOutcome::Ignored(IgnoreReason::Loading));
        }
        let Some(child_level) = node.level.child() else {
            return Ok(ToggleOutcome::Ignored(IgnoreReason::Terminal));
        };

        let request = ancestor_chain(&self.nodes, id)?.iter().fold(
            AggregationRequest::new(
                child_level,
                self.budget.fetch_limit,
                self.budget.include_empty,
            ),
            |request, ancestor| request.with_ancestor(&ancestor.id.natural_key()),
        );

        self.next_ticket += 1;
        let seq = self.next_ticket;
        self.in_flight.insert(id.clone(), seq);
        if let Some(node) = self.nodes.get_mut(id) {
            node.loading = true;
        }
        tracing::debug!(node = %id, seq, ?purpose, "fetch started");

        Ok(ToggleOutcome::FetchStarted(FetchTicket {
            node_id: id.clone(),
            seq,
            purpose,
            request,
        }))
    }

    /// Remove the whole subtree below `id` and mark it collapsed. Returns the
    /// number of nodes removed.
    fn collapse(&mut self, id: &NodeId) -> usize {
        let mut removed = 0;
        let mut stack = self.children.remove(id).unwrap_or_default();
        while let Some(child) = stack.pop() {
            if let Some(grandchildren) = self.children.remove(&child) {
                stack.extend(grandchildren);
            }
            self.in_flight.remove(&child);
            if self.nodes.remove(&child).is_some() {
                removed += 1;
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.expanded = false;
        }
        tracing::debug!(node = %id, removed, "collapsed subtree");
        removed
    }

    /// Commit or discard the result of a fetch started by this store.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<AggregateRow>, FetchError>,
    ) -> FetchOutcome {
        let id = ticket.node_id;
        let current = self.nodes.get(&id).is_some_and(|node| node.loading)
            && self.in_flight.get(&id) == Some(&ticket.seq);
        if !current {
            tracing::warn!(node = %id, seq = ticket.seq, "discarding stale fetch result");
            return FetchOutcome::Stale { id };
        }
        self.in_flight.remove(&id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.loading = false;
        }

        let rows = match result {
            Ok(rows) => rows,
            Err(error) => {
                tracing::debug!(node = %id, %error, "fetch failed");
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.errored = true;
                    node.expanded = false;
                }
                return FetchOutcome::Failed { id, error };
            }
        };

        let received = rows.len();
        let rows = self.dedupe_and_cap(Some(&id), ticket.request.level, rows);
        let kept = rows.len();
        let children: Vec<(NodeId, AggregateRow)> = rows
            .into_iter()
            .filter_map(|row| id.child(&row.key).map(|child| (child, row)))
            .collect();
        let new_nodes = children
            .iter()
            .filter(|(child, _)| !self.nodes.contains_key(child))
            .count();
        let projected = self.nodes.len() + new_nodes;

        let limit = match ticket.purpose {
            FetchPurpose::Interactive => self.budget.hard_ceiling,
            FetchPurpose::Eager => self
                .budget
                .initial_expansion_cap
                .min(self.budget.hard_ceiling),
        };
        if projected > limit {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.expanded = false;
                node.errored = false;
            }
            match ticket.purpose {
                FetchPurpose::Interactive => self.notify(Notice::HardBudget {
                    node: id.clone(),
                    projected,
                    limit,
                }),
                FetchPurpose::Eager => {
                    tracing::debug!(node = %id, projected, limit, "left collapsed on initial load")
                }
            }
            return FetchOutcome::OverBudget {
                id,
                projected,
                limit,
            };
        }

        if kept < received {
            self.notify(Notice::Truncated {
                parent: Some(id.clone()),
                received,
                kept,
            });
        }

        let added = self.attach_children(&id, children);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.expanded = true;
            node.errored = false;
        }

        let total = self.nodes.len();
        let over_soft =
            ticket.purpose == FetchPurpose::Interactive && total > self.budget.soft_ceiling;
        if over_soft {
            self.notify(Notice::SoftBudget {
                node_count: total,
                limit: self.budget.soft_ceiling,
            });
        }
        tracing::debug!(node = %id, added, total, "expanded");

        FetchOutcome::Expanded {
            id,
            added,
            received,
            kept,
            total,
            over_soft,
        }
    }

    /// Merge children under `parent`. Ids already present are updated in
    /// place; new ones are appended after the existing children.
    fn attach_children(&mut self, parent: &NodeId, children: Vec<(NodeId, AggregateRow)>) -> usize {
        let mut added = 0;
        for (child, row) in children {
            match self.nodes.get_mut(&child) {
                Some(existing) => {
                    existing.label = row.label;
                    existing.count = row.count;
                }
                None => {
                    self.nodes
                        .insert(child.clone(), GraphNode::new(child.clone(), row.label, row.count));
                    self.children.entry(parent.clone()).or_default().push(child);
                    added += 1;
                }
            }
        }
        if added == 0 {
            self.children.entry(parent.clone()).or_default();
        }
        added
    }

    /// Drop rows of the wrong level and repeated keys (first wins), then apply
    /// the per-expansion child cap.
    fn dedupe_and_cap(
        &self,
        parent: Option<&NodeId>,
        level: Level,
        rows: Vec<AggregateRow>,
    ) -> Vec<AggregateRow> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut out = Vec::with_capacity(rows.len().min(self.budget.child_cap));
        for row in rows {
            if row.key.level() != level {
                tracing::warn!(parent = ?parent, key = ?row.key, %level, "skipping row of wrong level");
                continue;
            }
            if !seen.insert(row.key.clone()) {
                tracing::debug!(parent = ?parent, key = ?row.key, "skipping duplicate row");
                continue;
            }
            out.push(row);
        }
        out.truncate(self.budget.child_cap);
        out
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            nodes: self.nodes(),
        }
    }

    /// Replace the node set with `snapshot`. Outstanding tickets are dropped,
    /// so fetches still in flight complete as stale.
    pub fn restore(&mut self, snapshot: &StoreSnapshot) {
        self.clear();
        for node in &snapshot.nodes {
            let mut node = node.clone();
            node.loading = false;
            match &node.parent_id {
                None => self.roots.push(node.id.clone()),
                Some(parent) if self.nodes.contains_key(parent) => self
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone()),
                Some(_) => {
                    tracing::warn!(node = %node.id, "dropping orphan from snapshot");
                    continue;
                }
            }
            if node.expanded {
                self.children.entry(node.id.clone()).or_default();
            }
            self.nodes.insert(node.id.clone(), node);
        }
    }
}
