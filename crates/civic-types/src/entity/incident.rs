//! Traffic incidents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    category_key, check_category, check_id, check_level, check_position, check_timestamp,
    DomainEntity, EntityId,
};
use crate::error::{ValidationError, Violations};
use crate::geometry::LngLat;
use crate::level::Level;
use crate::raw::RawIncident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Accident,
    Roadwork,
    Congestion,
    Closure,
    Hazard,
}

impl IncidentKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match category_key(raw).as_str() {
            "accident" | "collision" => Some(Self::Accident),
            "roadwork" | "road_work" | "construction" => Some(Self::Roadwork),
            "congestion" | "jam" => Some(Self::Congestion),
            "closure" | "road_closure" => Some(Self::Closure),
            "hazard" | "obstacle" => Some(Self::Hazard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accident => "accident",
            Self::Roadwork => "roadwork",
            Self::Congestion => "congestion",
            Self::Closure => "closure",
            Self::Hazard => "hazard",
        }
    }
}

/// A traffic incident reported on the road network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    id: EntityId,
    position: LngLat,
    severity: Level,
    kind: IncidentKind,
    description: Option<String>,
    reported_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn severity(&self) -> Level {
        self.severity
    }

    pub fn kind(&self) -> IncidentKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        self.reported_at
    }

    /// Closures block the road entirely.
    pub fn is_blocking(&self) -> bool {
        self.kind == IncidentKind::Closure
    }
}

impl DomainEntity for Incident {
    type Raw = RawIncident;
    const KIND: &'static str = "incident";

    fn from_raw(raw: &RawIncident) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        let id = check_id(raw.id.as_ref(), &mut violations);
        let position = check_position(raw.lat, raw.lng, &mut violations);
        let severity = check_level(raw.severity.as_deref(), "severity", &mut violations);
        let kind = check_category(
            raw.kind.as_deref(),
            "kind",
            IncidentKind::parse,
            &mut violations,
        );
        let reported_at = check_timestamp(raw.reported_at.as_deref(), &mut violations);

        let reported_id = id.as_ref().map(|id| id.to_string());
        violations.finish(Self::KIND, reported_id, || {
            Some(Self {
                id: id?,
                position: position?,
                severity: severity?,
                kind: kind?,
                description: raw
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
                reported_at,
            })
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn position(&self) -> LngLat {
        self.position
    }

    fn level(&self) -> Level {
        self.severity
    }

    fn label(&self) -> String {
        match &self.description {
            Some(description) => format!("{} ({})", description, self.kind.as_str()),
            None => format!("{} incident", self.kind.as_str()),
        }
    }

    fn is_high_priority(&self) -> bool {
        self.severity.is_high_or_above()
    }
}
