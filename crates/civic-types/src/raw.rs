//! Raw backend payloads.
//!
//! These mirror what the dashboard backend sends and are deliberately loose:
//! every field is optional so that a bad record produces a `ValidationError`
//! listing what is wrong, instead of a deserialization failure that hides
//! everything after the first problem.

use serde::{Deserialize, Serialize};

use crate::geometry::AxisOrder;

/// Record id as sent by the backend: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    /// Id as a trimmed, non-empty string.
    pub fn normalized(&self) -> Option<String> {
        match self {
            RawId::Int(n) => Some(n.to_string()),
            RawId::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        RawId::Text(s.to_string())
    }
}

impl From<i64> for RawId {
    fn from(n: i64) -> Self {
        RawId::Int(n)
    }
}

/// `{ "entities": [...] }` envelope shared by every entity endpoint.
///
/// Items stay as JSON values so each one is decoded and validated on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityEnvelope {
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
}

// ============================================================================
// ENTITY PAYLOADS
// ============================================================================

/// Traffic incident record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIncident {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default, alias = "level")]
    pub severity: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reported_at: Option<String>,
}

/// Service branch (bank, post office, ...) record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBranch {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default, alias = "congestion")]
    pub level: Option<String>,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub open: Option<bool>,
}

/// Citizen security report record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecurityReport {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default, alias = "severity")]
    pub level: Option<String>,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reported_at: Option<String>,
}

/// Area boundary record. `points` may be `(lat, lng)` or `(lng, lat)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArea {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "severity")]
    pub level: Option<String>,
    #[serde(default, alias = "coordinates", alias = "boundary")]
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub axis_order: Option<AxisOrder>,
}

// ============================================================================
// ROUTE PAYLOADS
// ============================================================================

/// Response of the route search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRouteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub node_details: Vec<RawNode>,
    #[serde(default)]
    pub exploration_steps: Vec<RawStep>,
    #[serde(default)]
    pub total_distance: Option<f64>,
    #[serde(default)]
    pub total_time: Option<f64>,
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Node on the found path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One step of the search trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    #[serde(default, alias = "index")]
    pub step: Option<usize>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub node_id: Option<RawId>,
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude")]
    pub lng: Option<f64>,
    #[serde(default, alias = "parentId")]
    pub from_node_id: Option<RawId>,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_id_accepts_numbers_and_strings() {
        let ids: Vec<RawId> = serde_json::from_str(r#"[7, "  a-1 ", ""]"#).unwrap();
        assert_eq!(ids[0].normalized().as_deref(), Some("7"));
        assert_eq!(ids[1].normalized().as_deref(), Some("a-1"));
        assert_eq!(ids[2].normalized(), None);
    }

    #[test]
    fn test_route_response_reads_camel_case() {
        let raw: RawRouteResponse = serde_json::from_str(
            r#"{
                "success": true,
                "nodeDetails": [{"id": 1, "lat": 37.5, "lng": 127.0}],
                "explorationSteps": [{"step": 0, "action": "START", "nodeId": 1, "lat": 37.5, "lng": 127.0}],
                "totalDistance": 1200.5,
                "totalTime": 300,
                "algorithm": "astar"
            }"#,
        )
        .unwrap();
        assert!(raw.success);
        assert_eq!(raw.node_details.len(), 1);
        assert_eq!(raw.exploration_steps[0].action.as_deref(), Some("START"));
        assert_eq!(raw.total_time, Some(300.0));
    }
}
