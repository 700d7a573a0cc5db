//! Timed playback of a saved route response against a shared surface.

use std::path::Path;
use std::time::Duration;

use civic_layers::fetch::parse_route;
use civic_layers::surface::{lock, shared, Palette, RecordingSurface};
use civic_layers::{PlaybackEngine, PlaybackOutcome, PlaybackPhase, SurfaceReconciler};
use civic_layers::{mapper, CircleDescriptor, MarkerDescriptor, SelectHandler};
use civic_types::{Incident, Route};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fixture_route() -> Route {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/route.json");
    let text = std::fs::read_to_string(path).unwrap();
    parse_route(&text).unwrap()
}

#[test]
fn fixture_steps_are_index_ordered() {
    let route = fixture_route();
    let indices: Vec<usize> = route.steps().iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(route.algorithm(), "astar");
    assert_eq!(route.start().id.as_str(), "n1");
    assert_eq!(route.end().id.as_str(), "n5");
}

#[tokio::test(start_paused = true)]
async fn step_creation_follows_index_order() {
    let surface = shared(RecordingSurface::new());
    let mut engine = PlaybackEngine::new(surface, Palette::default(), Duration::from_millis(50));
    engine.start(fixture_route()).await;
    assert_eq!(engine.wait().await, PlaybackOutcome::Settled);

    let steps: Vec<String> = engine
        .created()
        .into_iter()
        .filter(|k| k.starts_with("step-"))
        .collect();
    // Step 4 is a skip and draws nothing.
    assert_eq!(steps, vec!["step-0", "step-1", "step-2", "step-3", "step-5"]);
    assert_eq!(engine.phase(), PlaybackPhase::Settled);
}

#[tokio::test(start_paused = true)]
async fn playback_teardown_leaves_zone_layers_alone() {
    let surface = shared(RecordingSurface::new());

    let raw = vec![
        json!({"id": 1, "lat": 37.566, "lng": 126.978, "severity": "high", "kind": "accident"}),
        json!({"id": 2, "lat": 37.570, "lng": 126.988, "severity": "low", "kind": "roadwork"}),
    ];
    let batch = mapper::to_entities::<Incident>(&raw);
    let zones = mapper::to_zones(&batch.items, &Default::default(), 16);
    let mut zone_layer: SurfaceReconciler<CircleDescriptor> =
        SurfaceReconciler::new("zones", Palette::default());
    zone_layer.reconcile_shared(&surface, mapper::to_circle_descriptors(&zones).into());
    let mut marker_layer: SurfaceReconciler<MarkerDescriptor<Incident>> =
        SurfaceReconciler::new("markers", Palette::default());
    marker_layer.reconcile_shared(
        &surface,
        mapper::to_marker_descriptors(&batch.items, &SelectHandler::noop()).into(),
    );
    assert_eq!(lock(&surface).layer_count(), 4);

    let mut engine = PlaybackEngine::new(surface.clone(), Palette::default(), Duration::from_millis(50));
    engine.start(fixture_route()).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(lock(&surface).layer_count() > 4);

    let outcome = engine.shutdown().await;
    assert_eq!(outcome, PlaybackOutcome::Cancelled { steps_applied: 2 });
    assert_eq!(lock(&surface).layer_count(), 4);
    assert_eq!(zone_layer.len(), 2);
    assert_eq!(marker_layer.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn new_route_mid_playback_never_overlaps() {
    let surface = shared(RecordingSurface::new());
    let mut engine = PlaybackEngine::new(surface.clone(), Palette::default(), Duration::from_millis(50));

    engine.start(fixture_route()).await;
    tokio::time::sleep(Duration::from_millis(75)).await;
    let previous = engine.start(fixture_route()).await;
    assert_eq!(previous, PlaybackOutcome::Cancelled { steps_applied: 1 });

    // Same graph: the skeleton is carried over, everything else was removed.
    assert_eq!(lock(&surface).layer_count(), 2);

    assert_eq!(engine.wait().await, PlaybackOutcome::Settled);
    // skeleton 2 + step points 5 + edges 4 + route line and endpoints 3
    assert_eq!(lock(&surface).layer_count(), 14);
}
