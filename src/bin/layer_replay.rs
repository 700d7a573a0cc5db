//! Layer Replay CLI
//!
//! Runs the layer pipeline offline against an in-memory surface:
//! 1. Loads layer configuration (layers.yaml)
//! 2. Maps a saved entity payload into zones and markers and reconciles them
//!    (plus area boundaries, when given)
//! 3. (Optional) Replays a saved route search response as a timed playback
//! 4. Tears everything down and prints a summary
//!
//! Usage:
//!   cargo run --features cli --bin layer_replay -- \
//!     --kind incident \
//!     --entities fixtures/incidents.json \
//!     --areas fixtures/areas.json \
//!     --route fixtures/route.json \
//!     --instant

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use civic_layers::civic_types::{Branch, DomainEntity, Incident, SecurityReport};
use civic_layers::fetch::parse_route;
use civic_layers::mapper;
use civic_layers::surface::{lock, shared, RecordingSurface};
use civic_layers::{
    AreaDescriptor, EntitySource, LayerConfig, LayerFeed, PlaybackEngine, PlaybackOutcome, ReconcileOutcome,
    SharedSurface, StaticSource, SurfaceReconciler,
};

/// Replay entity layers and route playback against a headless surface
#[derive(Parser, Debug)]
#[command(name = "layer_replay")]
struct Args {
    /// Layer configuration file (defaults to $CIVIC_LAYERS_CONFIG or config/layers.yaml)
    #[arg(long, env = "CIVIC_LAYERS_CONFIG")]
    config: Option<PathBuf>,

    /// Entity kind contained in the payload
    #[arg(long, value_enum, default_value = "incident")]
    kind: Kind,

    /// Entity payload: `{ "entities": [...] }` or a bare array
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Area boundary payload, same envelope as entities
    #[arg(long)]
    areas: Option<PathBuf>,

    /// Route search response to replay
    #[arg(long)]
    route: Option<PathBuf>,

    /// Override the configured delay between trace steps
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Replay the trace without delays
    #[arg(long)]
    instant: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Incident,
    Branch,
    SecurityReport,
}

#[derive(Debug, Default, Serialize)]
struct LayerSummary {
    entities: usize,
    skipped: usize,
    zones_added: usize,
    markers_added: usize,
    high_priority: usize,
    /// Layers on the surface with zones and markers both drawn.
    surface_layers: usize,
}

#[derive(Debug, Serialize)]
struct AreaSummary {
    valid: usize,
    skipped: usize,
    drawn: usize,
}

#[derive(Debug, Serialize)]
struct PlaybackSummary {
    algorithm: String,
    steps: usize,
    primitives_created: usize,
    outcome: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    generated_at: DateTime<Utc>,
    layers: Option<LayerSummary>,
    areas: Option<AreaSummary>,
    playback: Option<PlaybackSummary>,
    peak_layers: usize,
    remaining_after_teardown: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LayerConfig::load(path)?,
        None => LayerConfig::from_env()?,
    };

    let surface = shared(RecordingSurface::new());
    let mut peak_layers = 0;

    let mut zones: Option<SurfaceReconciler<civic_layers::CircleDescriptor>> = None;
    let layers = match &args.entities {
        Some(path) => {
            let (summary, reconciler) = match args.kind {
                Kind::Incident => replay_entities::<Incident>(&config, &surface, path).await?,
                Kind::Branch => replay_entities::<Branch>(&config, &surface, path).await?,
                Kind::SecurityReport => {
                    replay_entities::<SecurityReport>(&config, &surface, path).await?
                }
            };
            zones = Some(reconciler);
            peak_layers = summary.surface_layers;
            Some(summary)
        }
        None => None,
    };
    let mut area_layers = None;
    let areas = match &args.areas {
        Some(path) => {
            let raw = StaticSource::from_file(path)
                .fetch()
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let batch = mapper::to_areas(&raw);
            let descriptors: Arc<[AreaDescriptor]> = mapper::to_area_descriptors(&batch.items).into();
            let mut reconciler = SurfaceReconciler::new("areas", config.palette.clone());
            let drawn = applied(reconciler.reconcile_shared(&surface, descriptors));
            peak_layers = peak_layers.max(lock(&surface).layer_count());
            area_layers = Some(reconciler);
            Some(AreaSummary {
                valid: batch.items.len(),
                skipped: batch.skipped(),
                drawn,
            })
        }
        None => None,
    };

    let playback = match &args.route {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let route = parse_route(&text)
                .with_context(|| format!("Invalid route in {}", path.display()))?;

            let delay = if args.instant {
                Duration::ZERO
            } else {
                args.delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.playback.step_delay())
            };

            let algorithm = route.algorithm().to_string();
            let steps = route.steps().len();
            let mut engine = PlaybackEngine::new(surface.clone(), config.palette.clone(), delay)
                .on_route_found(|route| {
                    tracing::info!(
                        distance_m = route.total_distance_m(),
                        time_s = route.total_time_s(),
                        "route found"
                    );
                });
            engine.start(route).await;
            let outcome = engine.wait().await;
            let primitives_created = engine.created().len();
            peak_layers = peak_layers.max(lock(&surface).layer_count());
            engine.shutdown().await;

            Some(PlaybackSummary {
                algorithm,
                steps,
                primitives_created,
                outcome: describe(outcome),
            })
        }
        None => None,
    };

    if let Some(mut reconciler) = zones {
        reconciler.teardown(&mut *lock(&surface));
    }
    if let Some(mut reconciler) = area_layers {
        reconciler.teardown(&mut *lock(&surface));
    }

    let summary = Summary {
        generated_at: Utc::now(),
        layers,
        areas,
        playback,
        peak_layers,
        remaining_after_teardown: lock(&surface).layer_count(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Map, reconcile zones and markers, then tear the markers down again. The
/// zone reconciler is handed back so zones stay visible under the playback.
async fn replay_entities<E: DomainEntity>(
    config: &LayerConfig,
    surface: &SharedSurface<RecordingSurface>,
    path: &Path,
) -> Result<(LayerSummary, SurfaceReconciler<civic_layers::CircleDescriptor>)> {
    let feed: LayerFeed<E, _> = LayerFeed::new(
        StaticSource::from_file(path),
        config.zones.radius_table(),
        config.zones.segments,
        |entity: &E| tracing::info!(id = %entity.id(), "selected"),
    );
    let snapshot = feed
        .refresh()
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let mut zones = SurfaceReconciler::new("zones", config.palette.clone());
    let mut markers = SurfaceReconciler::new("markers", config.palette.clone());
    let zones_added = applied(zones.reconcile_shared(surface, feed.circles()));
    let markers_added = applied(markers.reconcile_shared(surface, feed.markers()));
    let surface_layers = lock(surface).layer_count();
    markers.teardown(&mut *lock(surface));

    let summary = LayerSummary {
        entities: snapshot.entities().len(),
        skipped: snapshot.skipped(),
        zones_added,
        markers_added,
        high_priority: snapshot
            .entities()
            .iter()
            .filter(|e| e.is_high_priority())
            .count(),
        surface_layers,
    };
    Ok((summary, zones))
}

fn applied(outcome: ReconcileOutcome) -> usize {
    match outcome {
        ReconcileOutcome::Applied(report) => report.added,
        ReconcileOutcome::Deferred => 0,
    }
}

fn describe(outcome: PlaybackOutcome) -> String {
    match outcome {
        PlaybackOutcome::Idle => "idle".to_string(),
        PlaybackOutcome::Settled => "settled".to_string(),
        PlaybackOutcome::Cancelled { steps_applied } => {
            format!("cancelled after {} steps", steps_applied)
        }
    }
}

fn print_summary(summary: &Summary) {
    println!("Layer replay ({})", summary.generated_at.to_rfc3339());
    if let Some(layers) = &summary.layers {
        println!(
            "  entities: {} valid, {} skipped, {} high priority",
            layers.entities, layers.skipped, layers.high_priority
        );
        println!(
            "  surface: {} zones, {} markers",
            layers.zones_added, layers.markers_added
        );
    }
    if let Some(areas) = &summary.areas {
        println!(
            "  areas: {} valid, {} skipped, {} drawn",
            areas.valid, areas.skipped, areas.drawn
        );
    }
    if let Some(playback) = &summary.playback {
        println!(
            "  playback: {} over {} steps, {} primitives, {}",
            playback.algorithm, playback.steps, playback.primitives_created, playback.outcome
        );
    }
    println!("  peak layers: {}", summary.peak_layers);
    println!("  remaining after teardown: {}", summary.remaining_after_teardown);
}
