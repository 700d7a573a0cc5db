//! Rendering surface abstraction.
//!
//! The engine needs four mutating operations from a map renderer (add/remove
//! source, add/remove layer), a readiness flag, and a projection/bounds query
//! for popup placement. Anything exposing that set can be driven by the
//! reconciler and the playback engine.
//!
//! Primitives are only ever created through [`OwnerTag`] / [`PrimitiveRegistry`],
//! which hand back opaque [`PrimitiveHandle`]s. Teardown works from handles,
//! never from reconstructed id strings, so one component cannot remove
//! another component's primitives.

mod handle;
pub mod recording;
mod style;

pub use handle::{LayerId, OwnerTag, PrimitiveHandle, PrimitiveRegistry, SourceId};
pub use recording::{RecordingSurface, SurfaceOp};
pub use style::{LayerKind, LayerStyle, Palette};

use civic_types::{Geometry, LngLat};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("surface has not finished loading")]
    NotReady,

    #[error("surface was destroyed")]
    Destroyed,

    #[error("source '{0}' already exists")]
    DuplicateSource(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("source '{0}' does not exist")]
    UnknownSource(String),

    #[error("layer '{0}' does not exist")]
    UnknownLayer(String),

    #[error("source '{source_id}' is still used by layer '{layer_id}'")]
    SourceInUse { source_id: String, layer_id: String },

    /// The renderer refused the primitive (bad style, bad data).
    #[error("surface rejected '{id}': {reason}")]
    Rejected { id: String, reason: String },
}

impl SurfaceError {
    /// The primitive is already gone; removal can treat this as success.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Self::UnknownSource(_) | Self::UnknownLayer(_) | Self::Destroyed
        )
    }
}

/// Pixel position on the surface, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Geographic bounds of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }
}

/// Minimal capability set of a stateful map renderer.
pub trait MapSurface {
    /// Style and assets are loaded; sources and layers may be added.
    fn is_ready(&self) -> bool;

    fn add_source(&mut self, id: &SourceId, data: &Geometry) -> Result<(), SurfaceError>;

    fn add_layer(
        &mut self,
        id: &LayerId,
        source: &SourceId,
        style: &LayerStyle,
    ) -> Result<(), SurfaceError>;

    fn remove_layer(&mut self, id: &LayerId) -> Result<(), SurfaceError>;

    fn remove_source(&mut self, id: &SourceId) -> Result<(), SurfaceError>;

    /// Screen position of a coordinate, if the surface has a viewport.
    fn project(&self, coord: LngLat) -> Option<ScreenPoint>;

    fn bounds(&self) -> Option<Bounds>;

    /// Viewport size in pixels `(width, height)`.
    fn size(&self) -> Option<(f64, f64)>;
}

/// One surface shared by the reconciler and the playback engine.
///
/// Locks are held only for synchronous surface work, never across `.await`.
pub type SharedSurface<S> = Arc<Mutex<S>>;

pub fn shared<S: MapSurface>(surface: S) -> SharedSurface<S> {
    Arc::new(Mutex::new(surface))
}

/// Lock a shared surface. A poisoned lock still guards a usable surface, so
/// the guard is recovered rather than propagating the panic.
pub fn lock<S>(surface: &SharedSurface<S>) -> MutexGuard<'_, S> {
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
