//! Validation error types.

use thiserror::Error;

/// One broken rule found while validating a raw record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("id is missing or empty")]
    MissingId,

    #[error("{field} is missing")]
    MissingField { field: &'static str },

    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),

    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("route needs at least 2 nodes, got {0}")]
    TooFewNodes(usize),

    #[error("exploration step index {0} appears more than once")]
    DuplicateStepIndex(usize),

    #[error("unknown step action '{0}'")]
    UnknownAction(String),

    #[error("timestamp '{0}' is not RFC 3339")]
    InvalidTimestamp(String),

    #[error("record does not match the expected shape: {0}")]
    Malformed(String),

    #[error("backend reported an unsuccessful search")]
    Unsuccessful,
}

impl Violation {
    /// Stable error code for this rule.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingId => "MISSING_ID",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::LatitudeOutOfRange(_) => "LATITUDE_OUT_OF_RANGE",
            Self::LongitudeOutOfRange(_) => "LONGITUDE_OUT_OF_RANGE",
            Self::NotFinite { .. } => "NOT_FINITE",
            Self::UnknownLevel(_) => "UNKNOWN_LEVEL",
            Self::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Self::TooFewNodes(_) => "TOO_FEW_NODES",
            Self::DuplicateStepIndex(_) => "DUPLICATE_STEP_INDEX",
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Self::Malformed(_) => "MALFORMED",
            Self::Unsuccessful => "UNSUCCESSFUL",
        }
    }
}

/// A record failed validation. Carries every violation found, not just the first.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {kind}{}: {}", format_id(.id), format_violations(.violations))]
pub struct ValidationError {
    /// Kind of record being built (e.g. "incident", "route").
    pub kind: &'static str,
    /// Offending record id, when one could be read.
    pub id: Option<String>,
    pub violations: Vec<Violation>,
}

fn format_id(id: &Option<String>) -> String {
    id.as_deref()
        .map(|id| format!(" '{}'", id))
        .unwrap_or_default()
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(kind: &'static str, id: Option<String>, violations: Vec<Violation>) -> Self {
        Self {
            kind,
            id,
            violations,
        }
    }

    /// Codes of every violation, in the order they were found.
    pub fn codes(&self) -> Vec<&'static str> {
        self.violations.iter().map(Violation::code).collect()
    }
}

/// Collects violations while a factory inspects a raw record.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<Violation>);

impl Violations {
    pub(crate) fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected error.
    ///
    /// `value` is only evaluated on success so half-built records are never
    /// produced.
    pub(crate) fn finish<T>(
        self,
        kind: &'static str,
        id: Option<String>,
        value: impl FnOnce() -> Option<T>,
    ) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            if let Some(value) = value() {
                return Ok(value);
            }
        }
        Err(ValidationError::new(kind, id, self.0))
    }
}
