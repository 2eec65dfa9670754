use crate::config::NavigatorConfig;
use crate::error::NavigatorError;
use crate::layout::{LayoutResult, TreeLayouter};
use crate::navigation::resolve_query;
use crate::store::{
    FetchOutcome, FetchTicket, IgnoreReason, Notice, RootSummary, StoreSnapshot, ToggleOutcome,
    TreeStateStore,
};
use crate::viewport::{ViewTransform, ViewportController};
use coursegraph_api::{AggregateRow, AggregationClient, FetchError};
use coursegraph_core::{Edge, GraphNode, NodeId, Rect, ResourceQuery, Vec2, derive_edges};
use coursegraph_events::telemetry::{Command, CommandSpan};
use coursegraph_events::{ActivationOrigin, BudgetKind, Event, EventBus};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootState {
    Empty,
    Loading,
    Ready,
    /// Group-level fetch failed; the whole view shows an error with a reload
    /// action.
    Failed(String),
}

/// Node set and camera captured right after a root load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSnapshot {
    pub store: StoreSnapshot,
    pub transform: ViewTransform,
}

/// Result of a toggle driven end to end by the navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleResult {
    Collapsed { removed: usize },
    Fetched(FetchOutcome),
    Ignored(IgnoreReason),
}

/// Lazy resource-graph navigator.
///
/// Owns the tree store, the current layout and the viewport, and drives
/// aggregation fetches through `C`. Every mutation recomputes the layout;
/// only a root load re-fits the camera. Events are queued on a bounded
/// [`EventBus`]; drain it to observe them.
pub struct Navigator<C> {
    client: C,
    config: NavigatorConfig,
    store: TreeStateStore,
    layouter: TreeLayouter,
    layout: LayoutResult,
    viewport: ViewportController,
    snapshot: Option<LoadSnapshot>,
    root_state: RootState,
    events: EventBus,
}

impl<C: AggregationClient> Navigator<C> {
    pub fn new(client: C, config: NavigatorConfig, viewport_size: Vec2) -> Self {
        Self {
            store: TreeStateStore::new(config.budget.clone()),
            layouter: TreeLayouter::new(config.layout.clone()),
            layout: LayoutResult::empty(),
            viewport: ViewportController::new(config.viewport.clone(), viewport_size),
            snapshot: None,
            root_state: RootState::Empty,
            events: EventBus::new(),
            client,
            config,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn store(&self) -> &TreeStateStore {
        &self.store
    }

    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn root_state(&self) -> &RootState {
        &self.root_state
    }

    pub fn snapshot(&self) -> Option<&LoadSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn nodes(&self) -> Vec<GraphNode> {
        self.store.nodes()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.store.edges()
    }

    pub fn notices(&self) -> &[Notice] {
        self.store.notices()
    }

    pub fn dismiss_notice(&mut self, index: usize) -> Option<Notice> {
        self.store.dismiss_notice(index)
    }

    pub fn dismiss_all_notices(&mut self) {
        self.store.dismiss_all();
    }

    fn relayout(&mut self) {
        let nodes = self.store.nodes();
        let edges = derive_edges(&nodes);
        self.layout = self.layouter.layout(&nodes, &edges);
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Rebuild the graph from scratch: groups first, then majors for as many
    /// groups as fit under the initial-expansion cap, one group at a time.
    pub async fn load_root(&mut self) -> Result<RootSummary, NavigatorError> {
        let span = CommandSpan::start(Command::LoadRoot);

        self.root_state = RootState::Loading;
        self.snapshot = None;
        self.events.publish(Event::RootLoadStarted);
        let request = self.store.begin_root_load();
        self.layout = LayoutResult::empty();

        let rows = match self.client.aggregate(&request).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::error!(%error, "resource graph root load failed");
                span.fail(error.code());
                self.root_state = RootState::Failed(error.to_string());
                self.events.publish(Event::RootLoadFailed {
                    error: error.to_string(),
                });
                return Err(NavigatorError::RootLoad(error));
            }
        };
        self.store.complete_root_load(rows);

        for group in self.store.root_ids().to_vec() {
            let ticket = match self.store.begin_eager_expand(&group) {
                Ok(ToggleOutcome::FetchStarted(ticket)) => ticket,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(node = %group, %err, "skipping eager expansion");
                    continue;
                }
            };
            let result = self.client.aggregate(&ticket.request).await;
            match self.store.complete_fetch(ticket, result) {
                FetchOutcome::Failed { id, error } => {
                    tracing::warn!(node = %id, %error, "eager major fetch failed");
                    self.events.publish(Event::NodeFetchFailed {
                        id,
                        error: error.to_string(),
                    });
                }
                outcome => tracing::debug!(?outcome, "eager major fetch"),
            }
        }

        let summary = self.store.finish_root_load();
        self.relayout();
        self.viewport.fit_to_bounds(self.layout.bounds);
        self.snapshot = Some(LoadSnapshot {
            store: self.store.snapshot(),
            transform: self.viewport.transform(),
        });
        self.root_state = RootState::Ready;

        tracing::info!(
            nodes = summary.node_count,
            groups = summary.groups,
            expanded_groups = summary.expanded_groups,
            "resource graph loaded"
        );
        self.events.publish(Event::RootLoaded {
            node_count: summary.node_count,
            expanded_groups: summary.expanded_groups,
        });
        for notice in self.store.notices().to_vec() {
            match notice {
                Notice::Truncated {
                    parent,
                    received,
                    kept,
                } => self.events.publish(Event::ResultTruncated {
                    id: parent,
                    received,
                    kept,
                }),
                Notice::LargeInitialGraph {
                    node_count,
                    threshold,
                } => self.events.publish(Event::BudgetWarning {
                    kind: BudgetKind::Comfortable,
                    node_count,
                    limit: threshold,
                }),
                _ => {}
            }
        }
        self.publish_viewport();

        span.succeed();
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Expand / collapse
    // ------------------------------------------------------------------

    /// First half of a toggle. Collapses are finished here; a started fetch
    /// must be handed back through [`Navigator::complete_fetch`].
    pub fn begin_toggle(&mut self, id: &NodeId) -> Result<ToggleOutcome, NavigatorError> {
        if self.root_state != RootState::Ready {
            return Err(NavigatorError::NotLoaded);
        }
        let outcome = self.store.toggle_expand(id)?;
        self.after_begin(id, &outcome);
        Ok(outcome)
    }

    /// First half of a retry for an errored node.
    pub fn begin_retry(&mut self, id: &NodeId) -> Result<ToggleOutcome, NavigatorError> {
        if self.root_state != RootState::Ready {
            return Err(NavigatorError::NotLoaded);
        }
        let outcome = self.store.retry(id)?;
        self.after_begin(id, &outcome);
        Ok(outcome)
    }

    fn after_begin(&mut self, id: &NodeId, outcome: &ToggleOutcome) {
        match outcome {
            ToggleOutcome::Collapsed { removed } => {
                self.relayout();
                self.events.publish(Event::NodeCollapsed {
                    id: id.clone(),
                    removed: *removed,
                });
            }
            ToggleOutcome::FetchStarted(_) => {
                self.events
                    .publish(Event::NodeFetchStarted { id: id.clone() });
            }
            ToggleOutcome::Ignored(reason) => {
                tracing::debug!(node = %id, ?reason, "toggle ignored");
            }
        }
    }

    /// Second half of a toggle: merge the fetch result, relayout and publish
    /// the outcome.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<AggregateRow>, FetchError>,
    ) -> FetchOutcome {
        let outcome = self.store.complete_fetch(ticket, result);
        let soft_ceiling = self.store.budget().soft_ceiling;
        match &outcome {
            FetchOutcome::Expanded {
                id,
                added,
                received,
                kept,
                total,
                over_soft,
            } => {
                self.relayout();
                self.events.publish(Event::NodeExpanded {
                    id: id.clone(),
                    added: *added,
                });
                if kept < received {
                    self.events.publish(Event::ResultTruncated {
                        id: Some(id.clone()),
                        received: *received,
                        kept: *kept,
                    });
                }
                if *over_soft {
                    self.events.publish(Event::BudgetWarning {
                        kind: BudgetKind::Soft,
                        node_count: *total,
                        limit: soft_ceiling,
                    });
                }
            }
            FetchOutcome::Failed { id, error } => {
                self.events.publish(Event::NodeFetchFailed {
                    id: id.clone(),
                    error: error.to_string(),
                });
            }
            FetchOutcome::OverBudget {
                id,
                projected,
                limit,
            } => {
                self.events.publish(Event::BudgetExceeded {
                    id: id.clone(),
                    projected: *projected,
                    limit: *limit,
                });
                self.events.publish(Event::BudgetWarning {
                    kind: BudgetKind::Hard,
                    node_count: self.store.len(),
                    limit: *limit,
                });
            }
            FetchOutcome::Stale { id } => {
                self.events.publish(Event::FetchDiscarded { id: id.clone() });
            }
        }
        outcome
    }

    async fn run_fetch(&mut self, ticket: FetchTicket) -> FetchOutcome {
        let span = CommandSpan::start(Command::ExpandNode);
        span.context(format_args!(
            "node={} level={}",
            ticket.node_id, ticket.request.level
        ));

        let result = self.client.aggregate(&ticket.request).await;
        let outcome = self.complete_fetch(ticket, result);
        match &outcome {
            FetchOutcome::Failed { error, .. } => span.fail(error.code()),
            FetchOutcome::OverBudget { .. } => span.fail("budget_exceeded"),
            _ => span.succeed(),
        }
        outcome
    }

    /// Expand a collapsed node (fetching its children) or collapse an
    /// expanded one.
    pub async fn toggle_expand(&mut self, id: &NodeId) -> Result<ToggleResult, NavigatorError> {
        match self.begin_toggle(id)? {
            ToggleOutcome::FetchStarted(ticket) => {
                Ok(ToggleResult::Fetched(self.run_fetch(ticket).await))
            }
            ToggleOutcome::Collapsed { removed } => Ok(ToggleResult::Collapsed { removed }),
            ToggleOutcome::Ignored(reason) => Ok(ToggleResult::Ignored(reason)),
        }
    }

    /// Re-run the expansion of a node whose last fetch failed.
    pub async fn retry(&mut self, id: &NodeId) -> Result<ToggleResult, NavigatorError> {
        match self.begin_retry(id)? {
            ToggleOutcome::FetchStarted(ticket) => {
                Ok(ToggleResult::Fetched(self.run_fetch(ticket).await))
            }
            ToggleOutcome::Collapsed { removed } => Ok(ToggleResult::Collapsed { removed }),
            ToggleOutcome::Ignored(reason) => Ok(ToggleResult::Ignored(reason)),
        }
    }

    /// Restore the node set and camera captured by the last root load.
    pub fn reset(&mut self) -> Result<(), NavigatorError> {
        let snapshot = self.snapshot.as_ref().ok_or(NavigatorError::NotLoaded)?;
        let span = CommandSpan::start(Command::ResetView);

        self.store.restore(&snapshot.store);
        self.viewport.restore(snapshot.transform);
        self.relayout();
        self.events.publish(Event::ViewReset);

        span.succeed();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    fn publish_viewport(&self) {
        let target = self.viewport.target();
        self.events.publish(Event::ViewportChanged {
            scale: target.scale,
            x: target.translation.x,
            y: target.translation.y,
        });
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.viewport.zoom_by(factor);
        self.publish_viewport();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.publish_viewport();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.publish_viewport();
    }

    pub fn zoom_at(&mut self, screen_point: Vec2, factor: f32) {
        self.viewport.zoom_at(screen_point, factor);
        self.publish_viewport();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.viewport.pan_by(delta);
        self.publish_viewport();
    }

    /// Explicit "fit" action. Expansions never call this.
    pub fn fit_to_view(&mut self) {
        self.viewport.fit_to_bounds(self.layout.bounds);
        self.publish_viewport();
    }

    /// Nodes whose box overlaps the visible part of the world, in preorder.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let view = self.viewport.visible_world_rect();
        let size = Vec2::new(self.config.layout.node_width, self.config.layout.node_height);
        self.store
            .nodes()
            .into_iter()
            .filter(|node| {
                self.layout
                    .position(&node.id)
                    .is_some_and(|center| view.intersects(&Rect::from_center_size(center, size)))
            })
            .map(|node| node.id)
            .collect()
    }

    /// Resize the view without re-fitting.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport.set_size(size);
    }

    pub fn tick(&mut self, dt: Duration) -> bool {
        self.viewport.tick(dt)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Resolve the resource-list filter for a selected node.
    pub fn activate(
        &self,
        id: &NodeId,
        origin: ActivationOrigin,
    ) -> Result<ResourceQuery, NavigatorError> {
        let query = resolve_query(self.store.node_map(), id)?;
        self.events.publish(Event::NodeActivated {
            id: id.clone(),
            origin,
            query: query.clone(),
        });
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_api::{CatalogFixture, MemoryAggregationClient};
    use coursegraph_core::{GroupId, Level, MajorId};

    fn navigator(catalog: CatalogFixture) -> Navigator<MemoryAggregationClient> {
        Navigator::new(
            MemoryAggregationClient::new(catalog),
            NavigatorConfig::default(),
            Vec2::new(1024.0, 768.0),
        )
    }

    #[tokio::test]
    async fn test_toggle_before_load_is_rejected() {
        let mut nav = navigator(CatalogFixture::synthetic(1, 1, 1, 1));
        let err = nav.toggle_expand(&NodeId::Group(GroupId(1))).await.unwrap_err();
        assert_eq!(err, NavigatorError::NotLoaded);
        assert_eq!(nav.reset(), Err(NavigatorError::NotLoaded));
    }

    #[tokio::test]
    async fn test_load_root_fits_view_once() {
        let mut nav = navigator(CatalogFixture::synthetic(2, 3, 2, 1));
        nav.load_root().await.unwrap();
        let fitted = nav.viewport().transform();
        assert!(nav.layout().bounds.width() > 0.0);

        nav.toggle_expand(&NodeId::Major(GroupId(1), MajorId(1)))
            .await
            .unwrap();
        assert_eq!(nav.viewport().transform(), fitted);
        assert_eq!(nav.layout().positions.len(), nav.store().len());
    }

    #[tokio::test]
    async fn test_root_failure_sets_failed_state_and_reload_recovers() {
        let mut nav = navigator(CatalogFixture::synthetic(2, 1, 1, 1));
        nav.client()
            .fail_level(Level::Group, 1, FetchError::Unavailable("maintenance".into()));

        let err = nav.load_root().await.unwrap_err();
        assert!(matches!(err, NavigatorError::RootLoad(_)));
        assert!(matches!(nav.root_state(), RootState::Failed(msg) if msg.contains("maintenance")));
        assert!(nav.store().is_empty());

        nav.load_root().await.unwrap();
        assert_eq!(nav.root_state(), &RootState::Ready);
        assert_eq!(nav.store().len(), 4);
    }

    #[tokio::test]
    async fn test_eager_failure_is_isolated_to_group() {
        let mut nav = navigator(CatalogFixture::synthetic(2, 2, 1, 1));
        nav.client()
            .fail_level(Level::Major, 1, FetchError::Transport("reset".into()));
        nav.load_root().await.unwrap();

        let first = nav.store().get(&NodeId::Group(GroupId(1))).unwrap();
        let second = nav.store().get(&NodeId::Group(GroupId(2))).unwrap();
        assert!(first.errored && !first.expanded);
        assert!(second.expanded && !second.errored);
        assert_eq!(nav.store().len(), 4);
    }

    #[tokio::test]
    async fn test_visible_nodes_track_the_camera() {
        let mut nav = navigator(CatalogFixture::synthetic(2, 3, 2, 1));
        nav.load_root().await.unwrap();
        assert_eq!(nav.visible_nodes().len(), nav.store().len());

        nav.pan_by(Vec2::new(1.0e6, 0.0));
        assert!(nav.visible_nodes().is_empty());
    }

    #[tokio::test]
    async fn test_undrained_events_stay_bounded() {
        let mut nav = navigator(CatalogFixture::synthetic(1, 2, 1, 1))
            .with_event_bus(EventBus::with_capacity(4));
        nav.load_root().await.unwrap();
        for _ in 0..50 {
            nav.pan_by(Vec2::new(1.0, 0.0));
        }
        assert_eq!(nav.events().len(), 4);
        assert!(
            nav.events()
                .drain()
                .iter()
                .all(|event| matches!(event, Event::ViewportChanged { .. }))
        );
    }

    #[tokio::test]
    async fn test_activate_publishes_query() {
        let mut nav = navigator(CatalogFixture::synthetic(1, 1, 1, 1));
        nav.load_root().await.unwrap();
        nav.events().drain();

        let major = NodeId::Major(GroupId(1), MajorId(1));
        let query = nav.activate(&major, ActivationOrigin::DoubleActivate).unwrap();
        assert_eq!(query.major_id, Some(MajorId(1)));
        assert!(matches!(
            nav.events().drain().as_slice(),
            [Event::NodeActivated { origin: ActivationOrigin::DoubleActivate, .. }]
        ));
    }
}
