//! Routes and the search traces that produced them.
//!
//! A `Route` is the terminal artifact of a server-side graph search: the
//! ordered path, its totals, and the full exploration trace. Traces are kept
//! in step-index order; replaying them in any other order is a bug.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::entity::{check_position, EntityId};
use crate::error::{ValidationError, Violation, Violations};
use crate::geometry::LngLat;
use crate::raw::{RawNode, RawRouteResponse, RawStep};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EntityId> for NodeId {
    fn from(id: EntityId) -> Self {
        Self(id.to_string())
    }
}

/// A road-network node with a known position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub position: LngLat,
    pub name: Option<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, position: LngLat) -> Self {
        Self {
            id: NodeId::new(id),
            position,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Start,
    Visit,
    Skip,
    Goal,
}

impl StepAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "START" => Some(Self::Start),
            "VISIT" | "EXPLORE" => Some(Self::Visit),
            "SKIP" => Some(Self::Skip),
            "GOAL" | "FOUND" => Some(Self::Goal),
            _ => None,
        }
    }

    /// Whether the step puts something new on the map.
    pub fn draws(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// One step of a search trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorationStep {
    pub index: usize,
    pub action: StepAction,
    pub node: GraphNode,
    /// Node the search moved from, when the step follows an edge.
    pub from: Option<NodeId>,
    /// Accumulated distance at this step, in metres.
    pub distance: f64,
}

// ============================================================================
// ROUTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    nodes: Vec<GraphNode>,
    steps: Vec<ExplorationStep>,
    total_distance_m: f64,
    total_time_s: f64,
    algorithm: String,
}

impl Route {
    /// Build a route. Steps are put in index order; fewer than two path
    /// nodes or a repeated step index is rejected.
    pub fn new(
        nodes: Vec<GraphNode>,
        mut steps: Vec<ExplorationStep>,
        total_distance_m: f64,
        total_time_s: f64,
        algorithm: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        if nodes.len() < 2 {
            violations.push(Violation::TooFewNodes(nodes.len()));
        }
        if !total_distance_m.is_finite() {
            violations.push(Violation::NotFinite {
                field: "totalDistance",
            });
        }
        if !total_time_s.is_finite() {
            violations.push(Violation::NotFinite { field: "totalTime" });
        }
        steps.sort_by_key(|s| s.index);
        for pair in steps.windows(2) {
            if pair[0].index == pair[1].index {
                violations.push(Violation::DuplicateStepIndex(pair[0].index));
            }
        }
        let algorithm = algorithm.into();
        violations.finish("route", None, || {
            Some(Self {
                nodes,
                steps,
                total_distance_m,
                total_time_s,
                algorithm,
            })
        })
    }

    /// Validate a route search response.
    pub fn from_response(raw: &RawRouteResponse) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        if !raw.success {
            violations.push(Violation::Unsuccessful);
        }
        let nodes: Vec<GraphNode> = raw
            .node_details
            .iter()
            .filter_map(|n| node_from_raw(n, &mut violations))
            .collect();
        let steps: Vec<ExplorationStep> = raw
            .exploration_steps
            .iter()
            .filter_map(|s| step_from_raw(s, &mut violations))
            .collect();

        if let Err(mut err) = violations.finish("route", None, || Some(())) {
            // Structural checks from `new` still apply so callers see them all.
            if let Err(structural) = Route::new(nodes, steps, 0.0, 0.0, "") {
                err.violations.extend(structural.violations);
            }
            return Err(err);
        }

        Route::new(
            nodes,
            steps,
            raw.total_distance.unwrap_or(0.0),
            raw.total_time.unwrap_or(0.0),
            raw.algorithm.clone().unwrap_or_else(|| "unknown".to_string()),
        )
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn steps(&self) -> &[ExplorationStep] {
        &self.steps
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn total_time_s(&self) -> f64 {
        self.total_time_s
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn start(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn end(&self) -> &GraphNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn path(&self) -> Vec<LngLat> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Static graph this route was searched on, as far as the route reveals it.
    pub fn skeleton(&self) -> GraphSkeleton {
        GraphSkeleton::from_route(self)
    }
}

fn node_from_raw(raw: &RawNode, violations: &mut Violations) -> Option<GraphNode> {
    let id = raw.id.as_ref().and_then(|id| id.normalized());
    if id.is_none() {
        violations.push(Violation::MissingId);
    }
    let position = check_position(raw.lat, raw.lng, violations);
    Some(GraphNode {
        id: NodeId(id?),
        position: position?,
        name: raw.name.clone(),
    })
}

fn step_from_raw(raw: &RawStep, violations: &mut Violations) -> Option<ExplorationStep> {
    if raw.step.is_none() {
        violations.push(Violation::MissingField { field: "step" });
    }
    let action = match raw.action.as_deref() {
        None => {
            violations.push(Violation::MissingField { field: "action" });
            None
        }
        Some(a) => {
            let action = StepAction::parse(a);
            if action.is_none() {
                violations.push(Violation::UnknownAction(a.to_string()));
            }
            action
        }
    };
    let node = node_from_raw(
        &RawNode {
            id: raw.node_id.clone(),
            lat: raw.lat,
            lng: raw.lng,
            name: None,
        },
        violations,
    );
    let distance = raw.distance.unwrap_or(0.0);
    if !distance.is_finite() {
        violations.push(Violation::NotFinite { field: "distance" });
    }
    Some(ExplorationStep {
        index: raw.step?,
        action: action?,
        node: node?,
        from: raw
            .from_node_id
            .as_ref()
            .and_then(|id| id.normalized())
            .map(NodeId),
        distance,
    })
}

// ============================================================================
// GRAPH SKELETON
// ============================================================================

/// Every node and edge a route reveals: the path plus everything the trace
/// touched. Drawn once per distinct graph as the neutral base layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSkeleton {
    nodes: Vec<GraphNode>,
    edges: Vec<(NodeId, NodeId)>,
    fingerprint: u64,
}

impl GraphSkeleton {
    pub fn from_route(route: &Route) -> Self {
        let mut positions: HashMap<NodeId, LngLat> = HashMap::new();
        let mut nodes = Vec::new();
        let candidates = route
            .nodes()
            .iter()
            .chain(route.steps().iter().map(|s| &s.node));
        for node in candidates {
            if !positions.contains_key(&node.id) {
                positions.insert(node.id.clone(), node.position);
                nodes.push(node.clone());
            }
        }

        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut edges = Vec::new();
        let path_edges = route
            .nodes()
            .windows(2)
            .map(|w| (w[0].id.clone(), w[1].id.clone()));
        let trace_edges = route
            .steps()
            .iter()
            .filter_map(|s| s.from.clone().map(|from| (from, s.node.id.clone())));
        for (from, to) in path_edges.chain(trace_edges) {
            if from == to || !positions.contains_key(&from) {
                continue;
            }
            // Undirected: one segment per node pair.
            let key = if from <= to {
                (from.clone(), to.clone())
            } else {
                (to.clone(), from.clone())
            };
            if seen.insert(key) {
                edges.push((from, to));
            }
        }

        let mut hasher = DefaultHasher::new();
        for node in &nodes {
            node.id.hash(&mut hasher);
            node.position.lng.to_bits().hash(&mut hasher);
            node.position.lat.to_bits().hash(&mut hasher);
        }
        for edge in &edges {
            edge.hash(&mut hasher);
        }

        Self {
            nodes,
            edges,
            fingerprint: hasher.finish(),
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Identifies the graph; equal fingerprints mean the same skeleton.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn node_positions(&self) -> Vec<LngLat> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Edge segments as coordinate pairs.
    pub fn edge_segments(&self) -> Vec<Vec<LngLat>> {
        let positions: HashMap<&NodeId, LngLat> =
            self.nodes.iter().map(|n| (&n.id, n.position)).collect();
        self.edges
            .iter()
            .filter_map(|(a, b)| Some(vec![*positions.get(a)?, *positions.get(b)?]))
            .collect()
    }
}
