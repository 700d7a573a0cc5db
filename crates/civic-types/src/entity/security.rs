//! Citizen security reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    category_key, check_category, check_id, check_level, check_position, check_timestamp,
    DomainEntity, EntityId,
};
use crate::error::{ValidationError, Violations};
use crate::geometry::LngLat;
use crate::level::Level;
use crate::raw::RawSecurityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    Theft,
    Assault,
    Vandalism,
    Suspicious,
    Fire,
    Flood,
}

impl ReportCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match category_key(raw).as_str() {
            "theft" | "robbery" => Some(Self::Theft),
            "assault" | "violence" => Some(Self::Assault),
            "vandalism" => Some(Self::Vandalism),
            "suspicious" | "suspicious_activity" => Some(Self::Suspicious),
            "fire" => Some(Self::Fire),
            "flood" | "flooding" => Some(Self::Flood),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theft => "theft",
            Self::Assault => "assault",
            Self::Vandalism => "vandalism",
            Self::Suspicious => "suspicious",
            Self::Fire => "fire",
            Self::Flood => "flood",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityReport {
    id: EntityId,
    position: LngLat,
    level: Level,
    category: ReportCategory,
    summary: Option<String>,
    reported_at: Option<DateTime<Utc>>,
}

impl SecurityReport {
    pub fn category(&self) -> ReportCategory {
        self.category
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        self.reported_at
    }

    /// Environmental hazards rather than crimes.
    pub fn is_hazard(&self) -> bool {
        matches!(self.category, ReportCategory::Fire | ReportCategory::Flood)
    }
}

impl DomainEntity for SecurityReport {
    type Raw = RawSecurityReport;
    const KIND: &'static str = "security_report";

    fn from_raw(raw: &RawSecurityReport) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        let id = check_id(raw.id.as_ref(), &mut violations);
        let position = check_position(raw.lat, raw.lng, &mut violations);
        let level = check_level(raw.level.as_deref(), "level", &mut violations);
        let category = check_category(
            raw.category.as_deref(),
            "category",
            ReportCategory::parse,
            &mut violations,
        );
        let reported_at = check_timestamp(raw.reported_at.as_deref(), &mut violations);

        let reported_id = id.as_ref().map(|id| id.to_string());
        violations.finish(Self::KIND, reported_id, || {
            Some(Self {
                id: id?,
                position: position?,
                level: level?,
                category: category?,
                summary: raw.summary.clone().filter(|s| !s.trim().is_empty()),
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
        self.level
    }

    fn label(&self) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| format!("{} report", self.category.as_str()))
    }

    fn is_high_priority(&self) -> bool {
        self.level.is_high_or_above()
            || matches!(self.category, ReportCategory::Fire | ReportCategory::Assault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawId;

    #[test]
    fn test_fire_is_high_priority_hazard() {
        let raw = RawSecurityReport {
            id: Some(RawId::Int(3)),
            lat: Some(35.1),
            lng: Some(129.0),
            level: Some("low".into()),
            category: Some("fire".into()),
            ..Default::default()
        };
        let report = SecurityReport::from_raw(&raw).unwrap();
        assert!(report.is_hazard());
        assert!(report.is_high_priority());
        assert_eq!(report.label(), "fire report");
    }

    #[test]
    fn test_empty_record_lists_all_required_fields() {
        let err = SecurityReport::from_raw(&RawSecurityReport::default()).unwrap_err();
        assert_eq!(err.violations.len(), 5);
        assert_eq!(err.id, None);
    }
}
