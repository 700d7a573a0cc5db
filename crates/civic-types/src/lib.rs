//! Shared types for civic-layers
//!
//! Everything here is pure and I/O-free: coordinate helpers, the validated
//! domain models built from backend payloads, and the raw payload shapes
//! themselves.
//!
//! ## Rules
//!
//! 1. Raw payload types accept anything the backend might send (all fields
//!    optional); validation happens in the `from_raw` factories, which report
//!    every violation at once.
//! 2. Domain models are construct-then-freeze: private fields, accessors only.
//! 3. Geometry serializes as GeoJSON geometry objects.
//! 4. Raw coordinate tuples of unknown axis order go through
//!    [`normalize_coordinates`]; use [`with_axis_order`] when the order is
//!    known. [`Area::from_raw`] applies whichever the record declares.

pub mod area;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod level;
pub mod raw;
pub mod route;
pub mod zone;

pub use area::Area;
pub use entity::{
    Branch, BranchCategory, DomainEntity, EntityId, Incident, IncidentKind, ReportCategory,
    SecurityReport,
};
pub use error::{ValidationError, Violation};
pub use geometry::{
    circle_polygon, close_ring, normalize_coordinates, with_axis_order, AxisOrder, Geometry,
    LngLat,
};
pub use level::Level;
pub use route::{ExplorationStep, GraphNode, GraphSkeleton, NodeId, Route, StepAction};
pub use zone::{RadiusTable, Zone, ZoneId};
