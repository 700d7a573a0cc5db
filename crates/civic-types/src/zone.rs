//! Circular influence zones derived from entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::{DomainEntity, EntityId};
use crate::geometry::{circle_polygon, LngLat};
use crate::level::Level;

/// Zone identity, `zone-<entity id>`, distinct from the entity's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn for_entity(entity: &EntityId) -> Self {
        Self(format!("zone-{}", entity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Zone radius per level, in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusTable {
    /// Used for levels missing from `by_level`.
    #[serde(default = "default_radius_m")]
    pub default_m: f64,
    #[serde(default)]
    pub by_level: BTreeMap<Level, f64>,
}

fn default_radius_m() -> f64 {
    150.0
}

impl Default for RadiusTable {
    fn default() -> Self {
        Self {
            default_m: default_radius_m(),
            by_level: BTreeMap::from([
                (Level::Low, 100.0),
                (Level::Medium, 200.0),
                (Level::High, 350.0),
                (Level::Critical, 500.0),
            ]),
        }
    }
}

impl RadiusTable {
    pub fn radius_for(&self, level: Level) -> f64 {
        self.by_level.get(&level).copied().unwrap_or(self.default_m)
    }
}

/// A circular zone around an entity. The ring is computed once here and
/// shared, never recomputed per render.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    id: ZoneId,
    entity_id: EntityId,
    center: LngLat,
    radius_m: f64,
    level: Level,
    ring: Arc<[LngLat]>,
}

impl Zone {
    pub fn from_entity<E: DomainEntity>(entity: &E, radii: &RadiusTable, segments: usize) -> Self {
        let radius_m = radii.radius_for(entity.level());
        let ring = circle_polygon(entity.position(), radius_m, segments);
        Self {
            id: ZoneId::for_entity(entity.id()),
            entity_id: entity.id().clone(),
            center: entity.position(),
            radius_m,
            level: entity.level(),
            ring: ring.into(),
        }
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn center(&self) -> LngLat {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Closed ring: first vertex equals last, at least four vertices.
    pub fn ring(&self) -> &Arc<[LngLat]> {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Incident;
    use crate::raw::{RawId, RawIncident};

    fn incident(level: &str) -> Incident {
        Incident::from_raw(&RawIncident {
            id: Some(RawId::Text("inc-1".into())),
            lat: Some(37.5),
            lng: Some(127.0),
            severity: Some(level.into()),
            kind: Some("hazard".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_zone_id_is_prefixed() {
        let zone = Zone::from_entity(&incident("high"), &RadiusTable::default(), 16);
        assert_eq!(zone.id().as_str(), "zone-inc-1");
        assert_eq!(zone.entity_id().as_str(), "inc-1");
        assert_eq!(zone.radius_m(), 350.0);
    }

    #[test]
    fn test_ring_is_closed() {
        let zone = Zone::from_entity(&incident("low"), &RadiusTable::default(), 24);
        let ring = zone.ring();
        assert!(ring.len() >= 4);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_missing_level_uses_default_radius() {
        let radii = RadiusTable {
            default_m: 42.0,
            by_level: BTreeMap::new(),
        };
        let zone = Zone::from_entity(&incident("critical"), &radii, 8);
        assert_eq!(zone.radius_m(), 42.0);
    }

    #[test]
    fn test_radius_table_from_yaml_like_json() {
        let radii: RadiusTable =
            serde_json::from_str(r#"{"by_level": {"high": 400.0}}"#).unwrap();
        assert_eq!(radii.radius_for(Level::High), 400.0);
        assert_eq!(radii.radius_for(Level::Low), 150.0);
    }
}
