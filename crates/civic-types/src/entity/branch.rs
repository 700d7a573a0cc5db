//! Public service branches (banks, post offices, ...).

use serde::{Deserialize, Serialize};

use super::{category_key, check_category, check_id, check_level, check_position, DomainEntity, EntityId};
use crate::error::{ValidationError, Violation, Violations};
use crate::geometry::LngLat;
use crate::level::Level;
use crate::raw::RawBranch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchCategory {
    Bank,
    PostOffice,
    Government,
    Clinic,
}

impl BranchCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match category_key(raw).as_str() {
            "bank" => Some(Self::Bank),
            "post_office" | "post" => Some(Self::PostOffice),
            "government" | "civic_center" | "community_center" => Some(Self::Government),
            "clinic" | "health_center" => Some(Self::Clinic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::PostOffice => "post_office",
            Self::Government => "government",
            Self::Clinic => "clinic",
        }
    }
}

/// A branch office with its current crowding level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    id: EntityId,
    name: String,
    position: LngLat,
    level: Level,
    category: BranchCategory,
    open: bool,
}

impl Branch {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> BranchCategory {
        self.category
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl DomainEntity for Branch {
    type Raw = RawBranch;
    const KIND: &'static str = "branch";

    fn from_raw(raw: &RawBranch) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        let id = check_id(raw.id.as_ref(), &mut violations);
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if name.is_none() {
            violations.push(Violation::MissingField { field: "name" });
        }
        let position = check_position(raw.lat, raw.lng, &mut violations);
        let level = check_level(raw.level.as_deref(), "level", &mut violations);
        let category = check_category(
            raw.category.as_deref(),
            "category",
            BranchCategory::parse,
            &mut violations,
        );

        let reported_id = id.as_ref().map(|id| id.to_string());
        violations.finish(Self::KIND, reported_id, || {
            Some(Self {
                id: id?,
                name: name?,
                position: position?,
                level: level?,
                category: category?,
                // Branches without an explicit flag are assumed open.
                open: raw.open.unwrap_or(true),
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
        self.name.clone()
    }

    fn is_high_priority(&self) -> bool {
        self.open && self.level.is_high_or_above()
    }
}
