//! Render-ready descriptors: the final shape handed to the surface layer.

use civic_types::{Area, DomainEntity, EntityId, Geometry, Level, LngLat, Zone, ZoneId};
use std::fmt;
use std::sync::Arc;

use crate::reconcile::SurfaceFeature;
use crate::surface::{LayerStyle, Palette};

/// Click/selection callback for markers.
///
/// Wrapped once by its owner and cloned from then on; clones share identity,
/// which is what memoized projections key on.
pub struct SelectHandler<E>(Arc<dyn Fn(&E) + Send + Sync>);

impl<E> SelectHandler<E> {
    pub fn new(f: impl Fn(&E) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Handler that ignores selections.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn call(&self, entity: &E) {
        (self.0)(entity)
    }

    /// Same underlying callback (not merely an equal one).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Clone for SelectHandler<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> fmt::Debug for SelectHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelectHandler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// A point marker bound to its entity and selection callback.
#[derive(Debug, Clone)]
pub struct MarkerDescriptor<E> {
    pub id: EntityId,
    pub position: LngLat,
    pub level: Level,
    pub label: String,
    pub high_priority: bool,
    entity: E,
    on_select: SelectHandler<E>,
}

impl<E: DomainEntity> MarkerDescriptor<E> {
    pub fn new(entity: &E, on_select: &SelectHandler<E>) -> Self {
        Self {
            id: entity.id().clone(),
            position: entity.position(),
            level: entity.level(),
            label: entity.label(),
            high_priority: entity.is_high_priority(),
            entity: entity.clone(),
            on_select: on_select.clone(),
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Fire the bound selection callback for this marker's entity.
    pub fn select(&self) {
        self.on_select.call(&self.entity);
    }
}

/// A zone circle ready for the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleDescriptor {
    pub id: ZoneId,
    pub entity_id: EntityId,
    pub center: LngLat,
    pub radius_m: f64,
    pub level: Level,
    pub ring: Arc<[LngLat]>,
}

impl From<&Zone> for CircleDescriptor {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id().clone(),
            entity_id: zone.entity_id().clone(),
            center: zone.center(),
            radius_m: zone.radius_m(),
            level: zone.level(),
            ring: Arc::clone(zone.ring()),
        }
    }
}

/// An area boundary ready for the surface. The ring is closed on the way to
/// the surface, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaDescriptor {
    pub id: EntityId,
    pub name: Option<String>,
    pub level: Level,
    pub boundary: Arc<[LngLat]>,
}

impl From<&Area> for AreaDescriptor {
    fn from(area: &Area) -> Self {
        Self {
            id: area.id().clone(),
            name: area.name().map(str::to_string),
            level: area.level(),
            boundary: Arc::clone(area.boundary()),
        }
    }
}

impl<E: DomainEntity> SurfaceFeature for MarkerDescriptor<E> {
    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn geometry(&self) -> Option<Geometry> {
        self.position
            .is_valid()
            .then_some(Geometry::Point(self.position))
    }

    fn style(&self, palette: &Palette) -> LayerStyle {
        palette.marker(self.level)
    }
}

impl SurfaceFeature for CircleDescriptor {
    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn geometry(&self) -> Option<Geometry> {
        Geometry::polygon(&self.ring)
    }

    fn style(&self, palette: &Palette) -> LayerStyle {
        palette.zone(self.level)
    }
}

impl SurfaceFeature for AreaDescriptor {
    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn geometry(&self) -> Option<Geometry> {
        Geometry::polygon(&self.boundary)
    }

    fn style(&self, palette: &Palette) -> LayerStyle {
        palette.zone(self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_identity_survives_clone() {
        let a: SelectHandler<u32> = SelectHandler::noop();
        let b = a.clone();
        let c: SelectHandler<u32> = SelectHandler::noop();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_degenerate_ring_has_no_geometry() {
        let circle = CircleDescriptor {
            id: ZoneId::for_entity(&serde_json::from_str("\"x\"").unwrap()),
            entity_id: serde_json::from_str("\"x\"").unwrap(),
            center: LngLat::new(0.0, 0.0),
            radius_m: 10.0,
            level: Level::Low,
            ring: Arc::from(vec![LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)]),
        };
        assert!(circle.geometry().is_none());
    }
}
