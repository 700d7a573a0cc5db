//! Domain entities built from backend records.
//!
//! Each kind exposes a single validating factory (`DomainEntity::from_raw`)
//! and is immutable afterwards. Factories report every violation they find.

mod branch;
mod incident;
mod security;

pub use branch::{Branch, BranchCategory};
pub use incident::{Incident, IncidentKind};
pub use security::{ReportCategory, SecurityReport};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ValidationError, Violation, Violations};
use crate::geometry::LngLat;
use crate::level::Level;
use crate::raw::RawId;

/// Identity of a domain entity, normalized to a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Behaviour shared by every entity kind the dashboard renders.
pub trait DomainEntity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Raw backend record this entity is built from.
    type Raw: DeserializeOwned + Send;

    /// Short name used in errors and logs.
    const KIND: &'static str;

    /// Validate a raw record. Either every rule holds or an error listing
    /// each broken rule is returned.
    fn from_raw(raw: &Self::Raw) -> Result<Self, ValidationError>;

    fn id(&self) -> &EntityId;
    fn position(&self) -> LngLat;
    fn level(&self) -> Level;

    /// Human readable label for markers and popups.
    fn label(&self) -> String;

    fn is_high_priority(&self) -> bool;
}

// ============================================================================
// SHARED FIELD CHECKS
// ============================================================================

pub(crate) fn check_id(raw: Option<&RawId>, violations: &mut Violations) -> Option<EntityId> {
    match raw.and_then(RawId::normalized) {
        Some(id) => Some(EntityId(id)),
        None => {
            violations.push(Violation::MissingId);
            None
        }
    }
}

pub(crate) fn check_position(
    lat: Option<f64>,
    lng: Option<f64>,
    violations: &mut Violations,
) -> Option<LngLat> {
    let lat = check_axis(lat, "lat", 90.0, Violation::LatitudeOutOfRange, violations);
    let lng = check_axis(lng, "lng", 180.0, Violation::LongitudeOutOfRange, violations);
    Some(LngLat::new(lng?, lat?))
}

fn check_axis(
    value: Option<f64>,
    field: &'static str,
    bound: f64,
    out_of_range: fn(f64) -> Violation,
    violations: &mut Violations,
) -> Option<f64> {
    match value {
        None => {
            violations.push(Violation::MissingField { field });
            None
        }
        Some(v) if !v.is_finite() => {
            violations.push(Violation::NotFinite { field });
            None
        }
        Some(v) if v.abs() > bound => {
            violations.push(out_of_range(v));
            None
        }
        Some(v) => Some(v),
    }
}

pub(crate) fn check_level(
    raw: Option<&str>,
    field: &'static str,
    violations: &mut Violations,
) -> Option<Level> {
    match raw {
        None => {
            violations.push(Violation::MissingField { field });
            None
        }
        Some(s) => {
            let level = Level::parse(s);
            if level.is_none() {
                violations.push(Violation::UnknownLevel(s.to_string()));
            }
            level
        }
    }
}

pub(crate) fn check_category<T>(
    raw: Option<&str>,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
    violations: &mut Violations,
) -> Option<T> {
    match raw {
        None => {
            violations.push(Violation::MissingField { field });
            None
        }
        Some(s) => {
            let category = parse(s);
            if category.is_none() {
                violations.push(Violation::UnknownCategory(s.to_string()));
            }
            category
        }
    }
}

/// Optional RFC 3339 timestamp; present-but-unparsable is a violation.
pub(crate) fn check_timestamp(
    raw: Option<&str>,
    violations: &mut Violations,
) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            violations.push(Violation::InvalidTimestamp(raw.to_string()));
            None
        }
    }
}

/// Lowercased key with spaces and dashes folded to underscores.
pub(crate) fn category_key(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_position_reports_both_axes() {
        let mut violations = Violations::default();
        let pos = check_position(Some(999.0), None, &mut violations);
        assert!(pos.is_none());
        let err = violations.finish::<()>("test", None, || Some(())).unwrap_err();
        assert_eq!(err.codes(), vec!["LATITUDE_OUT_OF_RANGE", "MISSING_FIELD"]);
    }

    #[test]
    fn test_category_key_folds_separators() {
        assert_eq!(category_key(" Post-Office "), "post_office");
        assert_eq!(category_key("road work"), "road_work");
    }
}
