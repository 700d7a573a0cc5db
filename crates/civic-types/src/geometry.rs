//! Coordinate helpers: axis normalization, ring closing, circle polygons.
//!
//! All coordinates leaving this module are canonical `(lng, lat)` pairs, the
//! order GeoJSON expects.

use serde::{Deserialize, Serialize};

/// Metres per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Minimum number of segments for a circle approximation.
const MIN_SEGMENTS: usize = 3;

/// A canonical `(lng, lat)` position. Serializes as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// True when both axes are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

/// Axis order of a raw coordinate tuple, declared by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    LatLng,
    LngLat,
}

/// Convert tuples of a known axis order into canonical positions.
pub fn with_axis_order(points: &[[f64; 2]], order: AxisOrder) -> Vec<LngLat> {
    points
        .iter()
        .map(|&[a, b]| match order {
            AxisOrder::LngLat => LngLat::new(a, b),
            AxisOrder::LatLng => LngLat::new(b, a),
        })
        .collect()
}

/// Guess the axis order of each tuple and return canonical positions.
///
/// A tuple whose first axis fits within ±90 while the second does not must be
/// `(lat, lng)` and is swapped. Every other tuple is taken as `(lng, lat)`.
/// When both axes fit within ±90 the order cannot be told apart and the tuple
/// passes through unchanged; prefer [`with_axis_order`] when the order is known.
pub fn normalize_coordinates(points: &[[f64; 2]]) -> Vec<LngLat> {
    points
        .iter()
        .map(|&[a, b]| {
            if a.abs() <= 90.0 && b.abs() > 90.0 {
                LngLat::new(b, a)
            } else {
                LngLat::new(a, b)
            }
        })
        .collect()
}

/// Close a ring by repeating its first vertex at the end.
///
/// Returns `None` for fewer than 3 points. The input is never modified.
pub fn close_ring(points: &[LngLat]) -> Option<Vec<LngLat>> {
    if points.len() < 3 {
        return None;
    }
    let mut ring = points.to_vec();
    if points.first() != points.last() {
        ring.push(points[0]);
    }
    Some(ring)
}

/// Closed ring approximating a circle around `center`.
///
/// Uses an equirectangular projection (longitude offsets scaled by
/// `cos(latitude)`), which holds for radii up to a few kilometres. Not valid
/// near the poles or across the antimeridian.
pub fn circle_polygon(center: LngLat, radius_m: f64, segments: usize) -> Vec<LngLat> {
    let segments = segments.max(MIN_SEGMENTS);
    let radius = if radius_m.is_finite() { radius_m.max(0.0) } else { 0.0 };
    let lat_scale = METERS_PER_DEGREE;
    let lng_scale = METERS_PER_DEGREE * center.lat.to_radians().cos();

    let mut ring: Vec<LngLat> = (0..segments)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * (i as f64) / (segments as f64);
            let dx = radius * theta.cos();
            let dy = radius * theta.sin();
            let dlng = if lng_scale.abs() > f64::EPSILON {
                dx / lng_scale
            } else {
                0.0
            };
            LngLat::new(center.lng + dlng, center.lat + dy / lat_scale)
        })
        .collect();
    ring.push(ring[0]);
    ring
}

// =============================================================================
// GEOJSON GEOMETRY
// =============================================================================

/// Geometry handed to the rendering surface, shaped like a GeoJSON geometry
/// object (`{"type": "Polygon", "coordinates": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LngLat),
    MultiPoint(Vec<LngLat>),
    LineString(Vec<LngLat>),
    MultiLineString(Vec<Vec<LngLat>>),
    Polygon(Vec<Vec<LngLat>>),
}

impl Geometry {
    /// Single-ring polygon. `None` when the ring cannot be closed or has
    /// fewer than four vertices once closed.
    pub fn polygon(points: &[LngLat]) -> Option<Self> {
        let ring = close_ring(points)?;
        if ring.len() < 4 {
            return None;
        }
        Some(Geometry::Polygon(vec![ring]))
    }

    /// Line through at least two points.
    pub fn line(points: &[LngLat]) -> Option<Self> {
        (points.len() >= 2).then(|| Geometry::LineString(points.to_vec()))
    }

    /// Total number of positions in the geometry.
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::MultiPoint(points) | Geometry::LineString(points) => points.len(),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().map(Vec::len).sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pts(raw: &[[f64; 2]]) -> Vec<LngLat> {
        raw.iter().copied().map(LngLat::from).collect()
    }

    #[test]
    fn test_close_ring_appends_first_vertex() {
        let ring = close_ring(&pts(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])).unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_close_ring_rejects_two_points() {
        assert!(close_ring(&pts(&[[0.0, 0.0], [1.0, 1.0]])).is_none());
    }

    #[test]
    fn test_close_ring_keeps_closed_ring() {
        let closed = pts(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        let ring = close_ring(&closed).unwrap();
        assert_eq!(ring, closed);
    }

    #[test]
    fn test_normalize_swaps_lat_first_tuples() {
        // Seoul given as (lat, lng)
        let out = normalize_coordinates(&[[37.56, 126.97], [126.98, 37.57]]);
        assert_eq!(out[0], LngLat::new(126.97, 37.56));
        assert_eq!(out[1], LngLat::new(126.98, 37.57));
    }

    #[test]
    fn test_normalize_passes_ambiguous_through() {
        let out = normalize_coordinates(&[[10.0, 45.0]]);
        assert_eq!(out[0], LngLat::new(10.0, 45.0));
    }

    #[test]
    fn test_explicit_axis_order() {
        let out = with_axis_order(&[[45.0, 10.0]], AxisOrder::LatLng);
        assert_eq!(out[0], LngLat::new(10.0, 45.0));
    }

    #[test]
    fn test_circle_polygon_is_closed() {
        let ring = circle_polygon(LngLat::new(127.0, 37.5), 300.0, 32);
        assert_eq!(ring.len(), 33);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_circle_polygon_radius_is_roughly_metres() {
        let center = LngLat::new(0.0, 0.0);
        let ring = circle_polygon(center, 1_000.0, 4);
        // theta = 90deg lands due north
        let north = ring[1];
        let metres = (north.lat - center.lat) * METERS_PER_DEGREE;
        assert!((metres - 1_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_circle_polygon_clamps_segments() {
        let ring = circle_polygon(LngLat::new(0.0, 0.0), 10.0, 1);
        assert_eq!(ring.len(), MIN_SEGMENTS + 1);
    }

    #[test]
    fn test_geometry_serializes_as_geojson() {
        let geometry = Geometry::Point(LngLat::new(126.9, 37.5));
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "Point", "coordinates": [126.9, 37.5]})
        );
    }

    #[test]
    fn test_polygon_rejects_degenerate_ring() {
        let closed_triangle_of_two = pts(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        assert!(Geometry::polygon(&closed_triangle_of_two).is_none());
        assert!(Geometry::polygon(&pts(&[[0.0, 0.0]])).is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_point() -> impl Strategy<Value = LngLat> {
        (-180.0f64..180.0, -90.0f64..90.0).prop_map(|(lng, lat)| LngLat::new(lng, lat))
    }

    proptest! {
        #[test]
        fn closed_ring_starts_and_ends_on_same_vertex(points in prop::collection::vec(arb_point(), 0..20)) {
            match close_ring(&points) {
                None => prop_assert!(points.len() < 3),
                Some(ring) => {
                    prop_assert!(ring.len() >= 3);
                    prop_assert_eq!(ring.first(), ring.last());
                    prop_assert_eq!(&ring[..points.len()], &points[..]);
                }
            }
        }

        #[test]
        fn circle_ring_is_closed_with_four_or_more_vertices(
            center in (-179.0f64..179.0, -80.0f64..80.0),
            radius in 0.0f64..5_000.0,
            segments in 0usize..128,
        ) {
            let ring = circle_polygon(LngLat::new(center.0, center.1), radius, segments);
            prop_assert!(ring.len() >= 4);
            prop_assert_eq!(ring.first(), ring.last());
        }
    }
}
