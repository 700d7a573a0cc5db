//! Popup placement for a selected entity.

use civic_types::LngLat;
use serde::Serialize;

use crate::surface::{MapSurface, ScreenPoint};

/// Gap between the point and the popup edge, in pixels.
const POPUP_OFFSET_PX: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupAnchor {
    /// Popup sits above the point.
    Above,
    /// Not enough room above; popup hangs below the point.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopupPlacement {
    pub point: ScreenPoint,
    pub anchor: PopupAnchor,
}

/// Where to show a popup of `popup_height` pixels for `coord`.
///
/// `None` when the surface has no viewport or the coordinate is outside the
/// visible bounds.
pub fn place_popup<S: MapSurface + ?Sized>(
    surface: &S,
    coord: LngLat,
    popup_height: f64,
) -> Option<PopupPlacement> {
    let bounds = surface.bounds()?;
    if !bounds.contains(coord) {
        return None;
    }
    let point = surface.project(coord)?;
    let anchor = if point.y - POPUP_OFFSET_PX - popup_height < 0.0 {
        PopupAnchor::Below
    } else {
        PopupAnchor::Above
    };
    Some(PopupPlacement { point, anchor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Bounds, RecordingSurface};

    fn surface() -> RecordingSurface {
        RecordingSurface::new().with_viewport(Bounds::new(126.0, 37.0, 128.0, 38.0), 800.0, 600.0)
    }

    #[test]
    fn test_room_above_anchors_above() {
        let placement = place_popup(&surface(), LngLat::new(127.0, 37.2), 150.0).unwrap();
        assert_eq!(placement.anchor, PopupAnchor::Above);
    }

    #[test]
    fn test_near_top_edge_flips_below() {
        let placement = place_popup(&surface(), LngLat::new(127.0, 37.95), 150.0).unwrap();
        assert_eq!(placement.anchor, PopupAnchor::Below);
        assert!(placement.point.y < 150.0);
    }

    #[test]
    fn test_outside_bounds_is_none() {
        assert!(place_popup(&surface(), LngLat::new(129.0, 37.5), 100.0).is_none());
        assert!(place_popup(&RecordingSurface::new(), LngLat::new(127.0, 37.5), 100.0).is_none());
    }
}
