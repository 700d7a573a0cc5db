//! Headless in-memory surface.
//!
//! Enforces the same add/remove rules a real map renderer does (no duplicate
//! ids, no removing a source still used by a layer, nothing before the style
//! has loaded) and keeps a log of every mutation. Used by the tests and by
//! the `layer_replay` binary.

use civic_types::{Geometry, LngLat};
use std::collections::BTreeMap;

use super::{Bounds, LayerId, LayerStyle, MapSurface, ScreenPoint, SourceId, SurfaceError};

/// One successful mutation of the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    AddSource(String),
    AddLayer(String),
    RemoveLayer(String),
    RemoveSource(String),
}

impl SurfaceOp {
    pub fn is_add(&self) -> bool {
        matches!(self, SurfaceOp::AddSource(_) | SurfaceOp::AddLayer(_))
    }

    pub fn id(&self) -> &str {
        match self {
            SurfaceOp::AddSource(id)
            | SurfaceOp::AddLayer(id)
            | SurfaceOp::RemoveLayer(id)
            | SurfaceOp::RemoveSource(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Viewport {
    bounds: Bounds,
    width: f64,
    height: f64,
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    ready: bool,
    destroyed: bool,
    fail_next_layer: bool,
    sources: BTreeMap<String, Geometry>,
    layers: BTreeMap<String, (String, LayerStyle)>,
    ops: Vec<SurfaceOp>,
    viewport: Option<Viewport>,
}

impl RecordingSurface {
    /// A surface whose style has already loaded.
    pub fn new() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    /// A surface still loading its style; call [`mark_ready`](Self::mark_ready) later.
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn with_viewport(mut self, bounds: Bounds, width: f64, height: f64) -> Self {
        self.viewport = Some(Viewport {
            bounds,
            width,
            height,
        });
        self
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Simulate the map being torn down: every source and layer disappears
    /// and further calls fail with `Destroyed`.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.ready = false;
        self.sources.clear();
        self.layers.clear();
    }

    /// Make the next `add_layer` call fail with `Rejected`. Readiness is
    /// unaffected.
    pub fn fail_next_layer(&mut self) {
        self.fail_next_layer = true;
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Return and clear the mutation log.
    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn has_source(&self, id: &SourceId) -> bool {
        self.sources.contains_key(id.as_str())
    }

    pub fn has_layer(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id.as_str())
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn geometry(&self, id: &SourceId) -> Option<&Geometry> {
        self.sources.get(id.as_str())
    }

    pub fn style(&self, id: &LayerId) -> Option<&LayerStyle> {
        self.layers.get(id.as_str()).map(|(_, style)| style)
    }

    fn check_usable(&self) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        if !self.ready {
            return Err(SurfaceError::NotReady);
        }
        Ok(())
    }
}

impl MapSurface for RecordingSurface {
    fn is_ready(&self) -> bool {
        self.ready && !self.destroyed
    }

    fn add_source(&mut self, id: &SourceId, data: &Geometry) -> Result<(), SurfaceError> {
        self.check_usable()?;
        if self.sources.contains_key(id.as_str()) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        tracing::trace!(source = %id, "add source");
        self.sources.insert(id.to_string(), data.clone());
        self.ops.push(SurfaceOp::AddSource(id.to_string()));
        Ok(())
    }

    fn add_layer(
        &mut self,
        id: &LayerId,
        source: &SourceId,
        style: &LayerStyle,
    ) -> Result<(), SurfaceError> {
        self.check_usable()?;
        if std::mem::take(&mut self.fail_next_layer) {
            return Err(SurfaceError::Rejected {
                id: id.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        if self.layers.contains_key(id.as_str()) {
            return Err(SurfaceError::DuplicateLayer(id.to_string()));
        }
        if !self.sources.contains_key(source.as_str()) {
            return Err(SurfaceError::UnknownSource(source.to_string()));
        }
        tracing::trace!(layer = %id, source = %source, "add layer");
        self.layers
            .insert(id.to_string(), (source.to_string(), style.clone()));
        self.ops.push(SurfaceOp::AddLayer(id.to_string()));
        Ok(())
    }

    fn remove_layer(&mut self, id: &LayerId) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        if self.layers.remove(id.as_str()).is_none() {
            return Err(SurfaceError::UnknownLayer(id.to_string()));
        }
        self.ops.push(SurfaceOp::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &SourceId) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Err(SurfaceError::Destroyed);
        }
        if let Some((layer_id, _)) = self
            .layers
            .iter()
            .find(|(_, (source, _))| source == id.as_str())
        {
            return Err(SurfaceError::SourceInUse {
                source_id: id.to_string(),
                layer_id: layer_id.clone(),
            });
        }
        if self.sources.remove(id.as_str()).is_none() {
            return Err(SurfaceError::UnknownSource(id.to_string()));
        }
        self.ops.push(SurfaceOp::RemoveSource(id.to_string()));
        Ok(())
    }

    /// Linear projection of the viewport bounds onto its pixel size.
    fn project(&self, coord: LngLat) -> Option<ScreenPoint> {
        let vp = self.viewport?;
        let span_x = vp.bounds.east - vp.bounds.west;
        let span_y = vp.bounds.north - vp.bounds.south;
        if span_x <= 0.0 || span_y <= 0.0 {
            return None;
        }
        Some(ScreenPoint {
            x: (coord.lng - vp.bounds.west) / span_x * vp.width,
            y: (vp.bounds.north - coord.lat) / span_y * vp.height,
        })
    }

    fn bounds(&self) -> Option<Bounds> {
        self.viewport.map(|vp| vp.bounds)
    }

    fn size(&self) -> Option<(f64, f64)> {
        self.viewport.map(|vp| (vp.width, vp.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{LayerKind, PrimitiveRegistry};

    #[test]
    fn test_loading_surface_rejects_adds() {
        let mut surface = RecordingSurface::loading();
        let mut registry = PrimitiveRegistry::new("t");
        let err = registry
            .register(
                &mut surface,
                "a",
                &Geometry::Point(LngLat::new(0.0, 0.0)),
                &LayerStyle::new(LayerKind::Circle, "#000"),
            )
            .unwrap_err();
        assert_eq!(err, SurfaceError::NotReady);
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn test_project_maps_bounds_to_pixels() {
        let surface = RecordingSurface::new().with_viewport(
            Bounds::new(126.0, 37.0, 128.0, 38.0),
            200.0,
            100.0,
        );
        let p = surface.project(LngLat::new(127.0, 37.5)).unwrap();
        assert_eq!(p, ScreenPoint { x: 100.0, y: 50.0 });
    }

    #[test]
    fn test_destroyed_surface_drops_everything() {
        let mut surface = RecordingSurface::new();
        let mut registry = PrimitiveRegistry::new("t");
        registry
            .register(
                &mut surface,
                "a",
                &Geometry::Point(LngLat::new(0.0, 0.0)),
                &LayerStyle::new(LayerKind::Circle, "#000"),
            )
            .unwrap();
        surface.destroy();
        assert_eq!(surface.source_count(), 0);
        assert!(!surface.is_ready());
        // Removal against a destroyed surface is treated as already done.
        assert_eq!(registry.teardown(&mut surface), 1);
    }
}
