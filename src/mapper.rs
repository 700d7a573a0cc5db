//! Mapper pipeline: raw records → domain models → render descriptors.
//!
//! Every function here is pure apart from logging. Order is preserved end to
//! end: output `i` corresponds to input `i` unless that input was skipped.

use civic_types::raw::{RawArea, RawRouteResponse};
use civic_types::{Area, DomainEntity, RadiusTable, Route, ValidationError, Violation, Zone};
use serde::Deserialize;

use crate::descriptor::{AreaDescriptor, CircleDescriptor, MarkerDescriptor, SelectHandler};

/// Valid entities from one batch plus what was dropped along the way.
#[derive(Debug, Clone)]
pub struct Batch<E> {
    pub items: Vec<E>,
    pub errors: Vec<ValidationError>,
}

impl<E> Batch<E> {
    pub fn skipped(&self) -> usize {
        self.errors.len()
    }
}

impl<E> Default for Batch<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Decode and validate each raw JSON item on its own. A bad item is logged
/// and skipped; it never aborts the batch.
pub fn to_entities<E: DomainEntity>(raw: &[serde_json::Value]) -> Batch<E> {
    decode_batch(E::KIND, raw, |record: &E::Raw| E::from_raw(record))
}

/// Same as [`to_entities`] for records that are already decoded.
pub fn records_to_entities<E: DomainEntity>(raw: &[E::Raw]) -> Batch<E> {
    let mut batch = Batch::default();
    for (position, record) in raw.iter().enumerate() {
        push_result(E::KIND, &mut batch, position, E::from_raw(record));
    }
    log_batch(E::KIND, &batch);
    batch
}

/// Area boundaries, validated one by one like entities. Points in either
/// axis order are put in `(lng, lat)` order here.
pub fn to_areas(raw: &[serde_json::Value]) -> Batch<Area> {
    decode_batch(Area::KIND, raw, |record: &RawArea| Area::from_raw(record))
}

fn decode_batch<R, T>(
    kind: &'static str,
    raw: &[serde_json::Value],
    build: impl Fn(&R) -> Result<T, ValidationError>,
) -> Batch<T>
where
    R: for<'de> Deserialize<'de>,
{
    let mut batch = Batch::default();
    for (position, item) in raw.iter().enumerate() {
        let result = R::deserialize(item)
            .map_err(|e| ValidationError::new(kind, None, vec![Violation::Malformed(e.to_string())]))
            .and_then(|record| build(&record));
        push_result(kind, &mut batch, position, result);
    }
    log_batch(kind, &batch);
    batch
}

fn push_result<T>(
    kind: &'static str,
    batch: &mut Batch<T>,
    position: usize,
    result: Result<T, ValidationError>,
) {
    match result {
        Ok(item) => batch.items.push(item),
        Err(e) => {
            tracing::warn!(
                kind,
                position,
                id = e.id.as_deref().unwrap_or("-"),
                error = %e,
                "skipping invalid record"
            );
            batch.errors.push(e);
        }
    }
}

fn log_batch<T>(kind: &'static str, batch: &Batch<T>) {
    tracing::debug!(
        kind,
        valid = batch.items.len(),
        skipped = batch.skipped(),
        "mapped batch"
    );
}

/// One zone per entity. Levels missing from `radii` use its default radius.
pub fn to_zones<E: DomainEntity>(entities: &[E], radii: &RadiusTable, segments: usize) -> Vec<Zone> {
    entities
        .iter()
        .map(|entity| Zone::from_entity(entity, radii, segments))
        .collect()
}

pub fn to_marker_descriptors<E: DomainEntity>(
    entities: &[E],
    on_select: &SelectHandler<E>,
) -> Vec<MarkerDescriptor<E>> {
    entities
        .iter()
        .map(|entity| MarkerDescriptor::new(entity, on_select))
        .collect()
}

pub fn to_circle_descriptors(zones: &[Zone]) -> Vec<CircleDescriptor> {
    zones.iter().map(CircleDescriptor::from).collect()
}

pub fn to_area_descriptors(areas: &[Area]) -> Vec<AreaDescriptor> {
    areas.iter().map(AreaDescriptor::from).collect()
}

/// Validate a route search response before anything is rendered from it.
pub fn to_route(raw: &RawRouteResponse) -> Result<Route, ValidationError> {
    Route::from_response(raw).map_err(|e| {
        tracing::warn!(error = %e, "rejecting route response");
        e
    })
}
