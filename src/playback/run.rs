//! One playback of one route, stepped by hand.
//!
//! ```text
//! Idle → DrawingBaseLayer → AnimatingTrace{next} → DrawingFinalResult → Settled
//!            │                     │                      │               │
//!            └─────────────────────┴──────────┬───────────┴───────────────┘
//!                                             ▼
//!                                         Cancelled
//! ```
//!
//! Each [`advance`](PlaybackRun::advance) does the work of the current phase
//! and moves to the next one. Everything drawn goes through this run's own
//! [`PrimitiveRegistry`], which is what cancellation tears down.

use civic_types::{ExplorationStep, Geometry, GraphSkeleton, LngLat, NodeId, Route};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::surface::{LayerStyle, MapSurface, Palette, PrimitiveHandle, PrimitiveRegistry, SurfaceError};

const SKELETON_NODES: &str = "skeleton-nodes";
const SKELETON_EDGES: &str = "skeleton-edges";
const ROUTE_LINE: &str = "route-line";
const ROUTE_START: &str = "route-start";
const ROUTE_END: &str = "route-end";

/// Registry key of the edge `from → to`. The length prefix keeps ids that
/// contain the separator from colliding (`a → a-b` vs `a-a → b`).
fn edge_key(from: &NodeId, to: &NodeId) -> String {
    format!("edge-{}:{}-{}", from.as_str().len(), from, to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    DrawingBaseLayer,
    /// `next` is the position in the (index-ordered) step list to apply next.
    AnimatingTrace { next: usize },
    DrawingFinalResult,
    Settled,
    Cancelled,
}

impl PlaybackPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

pub struct PlaybackRun {
    route: Arc<Route>,
    skeleton: GraphSkeleton,
    palette: Palette,
    registry: PrimitiveRegistry,
    phase: PlaybackPhase,
    visited: HashMap<NodeId, LngLat>,
    drawn_edges: HashSet<(NodeId, NodeId)>,
    steps_applied: usize,
    created: Vec<String>,
}

impl PlaybackRun {
    pub fn new(route: Arc<Route>, palette: Palette) -> Self {
        let skeleton = route.skeleton();
        Self {
            route,
            skeleton,
            palette,
            registry: PrimitiveRegistry::new("playback"),
            phase: PlaybackPhase::Idle,
            visited: HashMap::new(),
            drawn_edges: HashSet::new(),
            steps_applied: 0,
            created: Vec::new(),
        }
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn fingerprint(&self) -> u64 {
        self.skeleton.fingerprint()
    }

    /// Trace steps applied so far, skips included.
    pub fn steps_applied(&self) -> usize {
        self.steps_applied
    }

    /// Keys of every primitive this run registered, in creation order. Kept
    /// after teardown.
    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn handles(&self) -> Vec<&PrimitiveHandle> {
        self.registry.handles()
    }

    pub fn has_skeleton(&self) -> bool {
        self.registry.contains(SKELETON_NODES)
    }

    /// Take over the previous run's skeleton when both routes reveal the same
    /// graph, so it is not removed and drawn again. Returns whether anything
    /// was adopted.
    pub fn adopt_skeleton(&mut self, previous: &mut PlaybackRun) -> bool {
        if previous.fingerprint() != self.fingerprint() || self.phase != PlaybackPhase::Idle {
            return false;
        }
        let mut adopted = false;
        for key in [SKELETON_NODES, SKELETON_EDGES] {
            if let Some(handle) = previous.registry.detach(key) {
                self.registry.adopt(handle);
                adopted = true;
            }
        }
        if adopted {
            tracing::debug!(fingerprint = self.fingerprint(), "reusing skeleton from previous playback");
        }
        adopted
    }

    /// Do the current phase's work and move on. Returns the new phase.
    ///
    /// On a surface error the phase is left unchanged; calling again retries
    /// the same work without registering anything twice.
    pub fn advance<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<PlaybackPhase, SurfaceError> {
        let next = match self.phase {
            PlaybackPhase::Idle => PlaybackPhase::DrawingBaseLayer,
            PlaybackPhase::DrawingBaseLayer => {
                self.draw_base_layer(surface)?;
                self.after_step(0)
            }
            PlaybackPhase::AnimatingTrace { next } => {
                let route = Arc::clone(&self.route);
                self.apply_step(surface, &route.steps()[next])?;
                self.steps_applied += 1;
                self.after_step(next + 1)
            }
            PlaybackPhase::DrawingFinalResult => {
                self.draw_final_result(surface)?;
                PlaybackPhase::Settled
            }
            terminal @ (PlaybackPhase::Settled | PlaybackPhase::Cancelled) => terminal,
        };
        if next != self.phase {
            tracing::debug!(from = ?self.phase, to = ?next, "playback phase");
        }
        self.phase = next;
        Ok(next)
    }

    /// Advance until `Settled` with no delays in between.
    pub fn run_to_end<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<PlaybackPhase, SurfaceError> {
        while !self.phase.is_terminal() {
            self.advance(surface)?;
        }
        Ok(self.phase)
    }

    fn after_step(&self, next: usize) -> PlaybackPhase {
        if next < self.route.steps().len() {
            PlaybackPhase::AnimatingTrace { next }
        } else {
            PlaybackPhase::DrawingFinalResult
        }
    }

    /// Register `key` unless this run already holds it.
    fn ensure<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        key: &str,
        geometry: Geometry,
        style: LayerStyle,
    ) -> Result<(), SurfaceError> {
        if self.registry.contains(key) {
            return Ok(());
        }
        self.registry.register(surface, key, &geometry, &style)?;
        self.created.push(key.to_string());
        Ok(())
    }

    fn draw_base_layer<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> Result<(), SurfaceError> {
        let nodes = self.skeleton.node_positions();
        let edges = self.skeleton.edge_segments();
        if !nodes.is_empty() {
            let style = self.palette.skeleton_nodes();
            self.ensure(surface, SKELETON_NODES, Geometry::MultiPoint(nodes), style)?;
        }
        if !edges.is_empty() {
            let style = self.palette.skeleton_edges();
            self.ensure(surface, SKELETON_EDGES, Geometry::MultiLineString(edges), style)?;
        }
        Ok(())
    }

    fn apply_step<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        step: &ExplorationStep,
    ) -> Result<(), SurfaceError> {
        if !step.action.draws() {
            tracing::trace!(index = step.index, "skip step");
            return Ok(());
        }
        let position = step.node.position;
        let style = self.palette.visited_node(step.action);
        self.ensure(surface, &format!("step-{}", step.index), Geometry::Point(position), style)?;

        if let Some(from) = &step.from {
            let pair = (from.clone(), step.node.id.clone());
            if from != &step.node.id && !self.drawn_edges.contains(&pair) {
                if let Some(&origin) = self.visited.get(from) {
                    let key = edge_key(from, &step.node.id);
                    let style = self.palette.visited_edge();
                    self.ensure(surface, &key, Geometry::LineString(vec![origin, position]), style)?;
                    self.drawn_edges.insert(pair);
                }
            }
        }
        self.visited.insert(step.node.id.clone(), position);
        Ok(())
    }

    fn draw_final_result<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> Result<(), SurfaceError> {
        if let Some(line) = Geometry::line(&self.route.path()) {
            let style = self.palette.route_line();
            self.ensure(surface, ROUTE_LINE, line, style)?;
        }
        let start = self.route.start().position;
        let end = self.route.end().position;
        let style = self.palette.endpoint(true);
        self.ensure(surface, ROUTE_START, Geometry::Point(start), style)?;
        let style = self.palette.endpoint(false);
        self.ensure(surface, ROUTE_END, Geometry::Point(end), style)?;
        Ok(())
    }

    /// Stop the run and remove everything it registered. From `Idle` this is
    /// a no-op. Returns the number of primitives removed.
    pub fn cancel<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        if self.phase == PlaybackPhase::Idle {
            return 0;
        }
        if self.phase != PlaybackPhase::Cancelled {
            tracing::info!(
                steps_applied = self.steps_applied,
                total_steps = self.route.steps().len(),
                "playback cancelled"
            );
        }
        self.phase = PlaybackPhase::Cancelled;
        self.teardown(surface)
    }

    /// Remove every primitive this run holds. Idempotent.
    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        self.registry.teardown(surface)
    }

    /// The surface is gone; drop bookkeeping without surface calls.
    pub fn forget_surface(&mut self) -> usize {
        self.registry.forget()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use civic_types::{GraphNode, StepAction};
    use pretty_assertions::assert_eq;

    fn node(id: &str, lng: f64) -> GraphNode {
        GraphNode::new(id, LngLat::new(lng, 37.5))
    }

    fn step(index: usize, id: &str, lng: f64, action: StepAction, from: Option<&str>) -> ExplorationStep {
        ExplorationStep {
            index,
            action,
            node: node(id, lng),
            from: from.map(NodeId::new),
            distance: lng,
        }
    }

    fn five_step_route() -> Arc<Route> {
        let steps = vec![
            step(0, "a", 127.00, StepAction::Start, None),
            step(1, "b", 127.01, StepAction::Visit, Some("a")),
            step(2, "c", 127.02, StepAction::Visit, Some("b")),
            step(3, "d", 127.03, StepAction::Visit, Some("c")),
            step(4, "e", 127.04, StepAction::Goal, Some("d")),
        ];
        let nodes = vec![node("a", 127.00), node("c", 127.02), node("e", 127.04)];
        Arc::new(Route::new(nodes, steps, 420.0, 60.0, "astar").unwrap())
    }

    #[test]
    fn test_primitives_are_created_in_step_order() {
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(five_step_route(), Palette::default());
        assert_eq!(run.run_to_end(&mut surface).unwrap(), PlaybackPhase::Settled);

        let steps: Vec<&str> = run
            .created()
            .iter()
            .map(String::as_str)
            .filter(|k| k.starts_with("step-"))
            .collect();
        assert_eq!(steps, vec!["step-0", "step-1", "step-2", "step-3", "step-4"]);
        assert_eq!(run.created().first().map(String::as_str), Some(SKELETON_NODES));
        assert_eq!(
            &run.created()[run.created().len() - 3..],
            &[ROUTE_LINE.to_string(), ROUTE_START.to_string(), ROUTE_END.to_string()]
        );
    }

    #[test]
    fn test_phases_in_order() {
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(five_step_route(), Palette::default());
        let mut phases = vec![run.phase()];
        while !run.phase().is_terminal() {
            phases.push(run.advance(&mut surface).unwrap());
        }
        assert_eq!(phases[0], PlaybackPhase::Idle);
        assert_eq!(phases[1], PlaybackPhase::DrawingBaseLayer);
        assert_eq!(phases[2], PlaybackPhase::AnimatingTrace { next: 0 });
        assert_eq!(phases[phases.len() - 2], PlaybackPhase::DrawingFinalResult);
        assert_eq!(phases[phases.len() - 1], PlaybackPhase::Settled);
    }

    #[test]
    fn test_cancel_after_third_step() {
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(five_step_route(), Palette::default());
        // Idle → base layer → skeleton drawn, then steps 0..=2.
        for _ in 0..5 {
            run.advance(&mut surface).unwrap();
        }
        assert_eq!(run.steps_applied(), 3);
        assert_eq!(run.phase(), PlaybackPhase::AnimatingTrace { next: 3 });

        let removed = run.cancel(&mut surface);
        assert_eq!(removed, run.created().len());
        assert!(run.created().iter().all(|k| k != "step-3" && k != "step-4"));
        assert!(run.created().contains(&"step-2".to_string()));
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.layer_count(), 0);

        // Nothing further happens once cancelled.
        assert_eq!(run.advance(&mut surface).unwrap(), PlaybackPhase::Cancelled);
        assert_eq!(run.cancel(&mut surface), 0);
    }

    #[test]
    fn test_repeated_edge_registered_once() {
        let steps = vec![
            step(0, "a", 127.00, StepAction::Start, None),
            step(1, "b", 127.01, StepAction::Visit, Some("a")),
            step(2, "b", 127.01, StepAction::Visit, Some("a")),
            step(3, "a", 127.00, StepAction::Visit, Some("b")),
        ];
        let route = Route::new(vec![node("a", 127.0), node("b", 127.01)], steps, 1.0, 1.0, "bfs").unwrap();
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(Arc::new(route), Palette::default());
        run.run_to_end(&mut surface).unwrap();

        let edges: Vec<&str> = run
            .created()
            .iter()
            .map(String::as_str)
            .filter(|k| k.starts_with("edge-"))
            .collect();
        // Ordered pairs: a→b once, b→a is a different pair.
        assert_eq!(edges, vec!["edge-1:a-b", "edge-1:b-a"]);
    }

    #[test]
    fn test_dashed_node_ids_keep_edges_distinct() {
        let steps = vec![
            step(0, "a", 127.00, StepAction::Start, None),
            step(1, "a-b", 127.01, StepAction::Visit, Some("a")),
            step(2, "c", 127.02, StepAction::Visit, Some("a-b")),
            step(3, "b-c", 127.03, StepAction::Goal, Some("a")),
        ];
        let nodes = vec![node("a", 127.0), node("b-c", 127.03)];
        let route = Route::new(nodes, steps, 1.0, 1.0, "bfs").unwrap();
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(Arc::new(route), Palette::default());
        run.run_to_end(&mut surface).unwrap();

        let edges: Vec<&str> = run
            .created()
            .iter()
            .map(String::as_str)
            .filter(|k| k.starts_with("edge-"))
            .collect();
        assert_eq!(edges, vec!["edge-1:a-a-b", "edge-3:a-b-c", "edge-1:a-b-c"]);
        // skeleton (2) + steps (4) + edges (3) + route line and endpoints (3)
        assert_eq!(surface.layer_count(), 12);
    }

    #[test]
    fn test_edge_key_is_unambiguous() {
        let a = edge_key(&NodeId::new("a"), &NodeId::new("a-b"));
        let b = edge_key(&NodeId::new("a-a"), &NodeId::new("b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_skip_step_advances_without_drawing() {
        let steps = vec![
            step(0, "a", 127.00, StepAction::Start, None),
            step(1, "x", 127.05, StepAction::Skip, Some("a")),
            step(2, "b", 127.01, StepAction::Goal, Some("a")),
        ];
        let route = Route::new(vec![node("a", 127.0), node("b", 127.01)], steps, 1.0, 1.0, "dijkstra").unwrap();
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(Arc::new(route), Palette::default());
        run.run_to_end(&mut surface).unwrap();

        assert_eq!(run.steps_applied(), 3);
        assert!(!run.created().iter().any(|k| k == "step-1"));
    }

    #[test]
    fn test_edge_needs_visited_origin() {
        let steps = vec![step(0, "b", 127.01, StepAction::Visit, Some("a"))];
        let route = Route::new(vec![node("a", 127.0), node("b", 127.01)], steps, 1.0, 1.0, "bfs").unwrap();
        let mut surface = RecordingSurface::new();
        let mut run = PlaybackRun::new(Arc::new(route), Palette::default());
        run.run_to_end(&mut surface).unwrap();
        assert!(!run.created().iter().any(|k| k.starts_with("edge-")));
    }

    #[test]
    fn test_not_ready_surface_retries_same_work() {
        let mut surface = RecordingSurface::loading();
        let mut run = PlaybackRun::new(five_step_route(), Palette::default());
        run.advance(&mut surface).unwrap();
        assert_eq!(run.advance(&mut surface), Err(SurfaceError::NotReady));
        assert_eq!(run.phase(), PlaybackPhase::DrawingBaseLayer);

        surface.mark_ready();
        assert_eq!(
            run.advance(&mut surface).unwrap(),
            PlaybackPhase::AnimatingTrace { next: 0 }
        );
        assert_eq!(run.handles().len(), 2);
    }

    #[test]
    fn test_same_graph_adopts_skeleton() {
        let mut surface = RecordingSurface::new();
        let mut first = PlaybackRun::new(five_step_route(), Palette::default());
        first.run_to_end(&mut surface).unwrap();

        let mut second = PlaybackRun::new(five_step_route(), Palette::default());
        assert!(second.adopt_skeleton(&mut first));
        assert!(second.has_skeleton());
        first.cancel(&mut surface);
        surface.take_ops();

        second.advance(&mut surface).unwrap();
        second.advance(&mut surface).unwrap();
        // Base layer already present: nothing registered for it.
        assert!(surface.ops().is_empty());
        assert_eq!(surface.layer_count(), 2);
    }
}
