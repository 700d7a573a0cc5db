//! Layer paint styles and the config-driven palette they come from.

use civic_types::{Level, StepAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Fill,
    Line,
    Circle,
}

/// Paint for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub kind: LayerKind,
    pub color: String,
    pub opacity: f32,
    /// Line width or circle radius in pixels; unused for fills.
    pub size: f32,
}

impl LayerStyle {
    pub fn new(kind: LayerKind, color: impl Into<String>) -> Self {
        Self {
            kind,
            color: color.into(),
            opacity: 1.0,
            size: 1.0,
        }
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = size.max(0.0);
        self
    }
}

/// Colours and sizes for every visual role. Loaded from the `palette`
/// section of the layer config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub level_colors: BTreeMap<Level, String>,
    pub zone_opacity: f32,
    pub marker_radius: f32,
    pub skeleton_color: String,
    pub skeleton_opacity: f32,
    pub skeleton_width: f32,
    pub visited_color: String,
    pub goal_color: String,
    pub visited_radius: f32,
    pub visited_edge_width: f32,
    pub route_color: String,
    pub route_width: f32,
    pub start_color: String,
    pub end_color: String,
    pub endpoint_radius: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            level_colors: BTreeMap::from([
                (Level::Low, "#4caf50".to_string()),
                (Level::Medium, "#ffc107".to_string()),
                (Level::High, "#ff5722".to_string()),
                (Level::Critical, "#b71c1c".to_string()),
            ]),
            zone_opacity: 0.25,
            marker_radius: 6.0,
            skeleton_color: "#9e9e9e".to_string(),
            skeleton_opacity: 0.4,
            skeleton_width: 1.0,
            visited_color: "#42a5f5".to_string(),
            goal_color: "#7e57c2".to_string(),
            visited_radius: 4.0,
            visited_edge_width: 2.0,
            route_color: "#e91e63".to_string(),
            route_width: 5.0,
            start_color: "#2e7d32".to_string(),
            end_color: "#c62828".to_string(),
            endpoint_radius: 9.0,
        }
    }
}

const FALLBACK_COLOR: &str = "#607d8b";

impl Palette {
    pub fn level_color(&self, level: Level) -> &str {
        self.level_colors
            .get(&level)
            .map(String::as_str)
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn zone(&self, level: Level) -> LayerStyle {
        LayerStyle::new(LayerKind::Fill, self.level_color(level)).opacity(self.zone_opacity)
    }

    pub fn marker(&self, level: Level) -> LayerStyle {
        LayerStyle::new(LayerKind::Circle, self.level_color(level)).size(self.marker_radius)
    }

    pub fn skeleton_nodes(&self) -> LayerStyle {
        LayerStyle::new(LayerKind::Circle, &self.skeleton_color)
            .opacity(self.skeleton_opacity)
            .size(self.skeleton_width * 2.0)
    }

    pub fn skeleton_edges(&self) -> LayerStyle {
        LayerStyle::new(LayerKind::Line, &self.skeleton_color)
            .opacity(self.skeleton_opacity)
            .size(self.skeleton_width)
    }

    pub fn visited_node(&self, action: StepAction) -> LayerStyle {
        let color = match action {
            StepAction::Goal => &self.goal_color,
            _ => &self.visited_color,
        };
        LayerStyle::new(LayerKind::Circle, color).size(self.visited_radius)
    }

    pub fn visited_edge(&self) -> LayerStyle {
        LayerStyle::new(LayerKind::Line, &self.visited_color)
            .opacity(0.8)
            .size(self.visited_edge_width)
    }

    pub fn route_line(&self) -> LayerStyle {
        LayerStyle::new(LayerKind::Line, &self.route_color).size(self.route_width)
    }

    pub fn endpoint(&self, is_start: bool) -> LayerStyle {
        let color = if is_start {
            &self.start_color
        } else {
            &self.end_color
        };
        LayerStyle::new(LayerKind::Circle, color).size(self.endpoint_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_is_more_emphasised_than_skeleton() {
        let palette = Palette::default();
        assert!(palette.route_line().size > palette.skeleton_edges().size);
        assert!(palette.route_line().opacity > palette.skeleton_edges().opacity);
    }

    #[test]
    fn test_missing_level_colour_falls_back() {
        let palette = Palette {
            level_colors: BTreeMap::new(),
            ..Palette::default()
        };
        assert_eq!(palette.zone(Level::High).color, FALLBACK_COLOR);
    }
}
