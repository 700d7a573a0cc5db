//! Area boundaries drawn by the backend (restricted zones, event perimeters).
//!
//! Boundary points arrive as bare 2-tuples. When the record declares its
//! `axisOrder` that order is applied as-is; otherwise each tuple goes through
//! the ±90 heuristic of [`normalize_coordinates`].

use serde::Serialize;
use std::sync::Arc;

use crate::entity::{check_id, check_level, check_position, EntityId};
use crate::error::{ValidationError, Violations};
use crate::geometry::{normalize_coordinates, with_axis_order, LngLat};
use crate::level::Level;
use crate::raw::RawArea;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Area {
    id: EntityId,
    name: Option<String>,
    level: Level,
    boundary: Arc<[LngLat]>,
}

impl Area {
    pub const KIND: &'static str = "area";

    /// Validate an area record. Every boundary point must be a valid position
    /// once put in `(lng, lat)` order. A boundary too short to close a ring is
    /// accepted here; it simply never reaches the surface.
    pub fn from_raw(raw: &RawArea) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        let id = check_id(raw.id.as_ref(), &mut violations);
        let level = check_level(raw.level.as_deref(), "level", &mut violations);

        let canonical = match raw.axis_order {
            Some(order) => with_axis_order(&raw.points, order),
            None => normalize_coordinates(&raw.points),
        };
        let boundary: Vec<LngLat> = canonical
            .iter()
            .filter_map(|p| check_position(Some(p.lat), Some(p.lng), &mut violations))
            .collect();

        let reported_id = id.as_ref().map(|id| id.to_string());
        violations.finish(Self::KIND, reported_id, || {
            Some(Self {
                id: id?,
                name: raw.name.clone().filter(|s| !s.trim().is_empty()),
                level: level?,
                boundary: boundary.into(),
            })
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Boundary in canonical order, not closed.
    pub fn boundary(&self) -> &Arc<[LngLat]> {
        &self.boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AxisOrder;
    use crate::raw::RawId;

    fn raw(points: Vec<[f64; 2]>, axis_order: Option<AxisOrder>) -> RawArea {
        RawArea {
            id: Some(RawId::from("park")),
            name: Some("Olympic Park".into()),
            level: Some("high".into()),
            points,
            axis_order,
        }
    }

    #[test]
    fn test_lat_first_tuples_are_swapped() {
        let area = Area::from_raw(&raw(
            vec![[37.52, 127.12], [37.52, 127.13], [37.51, 127.13]],
            None,
        ))
        .unwrap();
        assert_eq!(area.boundary()[0], LngLat::new(127.12, 37.52));
        assert_eq!(area.level(), Level::High);
    }

    #[test]
    fn test_declared_order_wins_over_heuristic() {
        // Both axes within ±90: only the declared order can place these.
        let area = Area::from_raw(&raw(
            vec![[10.0, 20.0], [10.0, 21.0], [11.0, 21.0]],
            Some(AxisOrder::LatLng),
        ))
        .unwrap();
        assert_eq!(area.boundary()[0], LngLat::new(20.0, 10.0));
    }

    #[test]
    fn test_out_of_range_point_rejects_area() {
        let err = Area::from_raw(&raw(vec![[127.0, 37.5], [127.0, 95.0]], Some(AxisOrder::LngLat)))
            .unwrap_err();
        assert_eq!(err.codes(), vec!["LATITUDE_OUT_OF_RANGE"]);
        assert_eq!(err.id.as_deref(), Some("park"));
    }
}
