//! civic-layers - layer synchronization and exploration playback
//!
//! Keeps a stateful map surface in step with backend data for a civic
//! dashboard, and replays route-search traces on top of it.
//!
//! ## Data flow
//! Upstream JSON -> Mapper (validate, derive zones) -> Feed snapshot ->
//! Descriptors -> Reconciler -> Map surface
//!
//! Route response -> Route -> Playback engine -> Map surface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use civic_layers::{LayerConfig, LayerFeed, StaticSource, SurfaceReconciler};
//! use civic_layers::surface::RecordingSurface;
//! use civic_types::{DomainEntity, Incident};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = LayerConfig::from_env()?;
//! let feed: LayerFeed<Incident, _> = LayerFeed::new(
//!     StaticSource::from_file("incidents.json"),
//!     config.zones.radius_table(),
//!     config.zones.segments,
//!     |incident: &Incident| println!("selected {}", incident.id()),
//! );
//! feed.refresh().await?;
//!
//! let mut surface = RecordingSurface::new();
//! let mut zones = SurfaceReconciler::new("zones", config.palette.clone());
//! zones.reconcile(&mut surface, feed.circles());
//! # Ok(())
//! # }
//! ```

// Configuration (layers.yaml)
pub mod config;

// Rendering surface abstraction and typed primitive registry
pub mod surface;

// Raw -> domain -> descriptor pipeline
pub mod descriptor;
pub mod mapper;

// Upstream sources and the derivation feed
pub mod feed;
pub mod fetch;

// Surface synchronization
pub mod popup;
pub mod reconcile;

// Route trace replay
pub mod playback;

pub use civic_types;

pub use config::LayerConfig;
pub use descriptor::{AreaDescriptor, CircleDescriptor, MarkerDescriptor, SelectHandler};
pub use feed::{FeedSnapshot, FeedState, LayerFeed};
pub use fetch::{
    CachedSource, EntitySource, FetchError, HttpEntitySource, RouteClient, RouteQuery,
    StaticSource,
};
pub use mapper::Batch;
pub use playback::{PlaybackEngine, PlaybackOutcome, PlaybackPhase, PlaybackRun};
pub use popup::{place_popup, PopupAnchor, PopupPlacement};
pub use reconcile::{ReconcileOutcome, ReconcileReport, SurfaceFeature, SurfaceReconciler};
pub use surface::{MapSurface, SharedSurface, SurfaceError};
