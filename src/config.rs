//! Layer configuration
//!
//! Loads `layers.yaml`: upstream endpoints, zone radii, playback timing and
//! the palette.

use anyhow::{bail, Context, Result};
use civic_types::{Level, RadiusTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::surface::Palette;

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "CIVIC_LAYERS_CONFIG";

const DEFAULT_RELATIVE_PATH: &str = "config/layers.yaml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub api: ApiConfig,
    pub zones: ZoneConfig,
    pub playback: PlaybackConfig,
    pub palette: Palette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Entity kind (`incident`, `branch`, `security_report`) → path.
    pub paths: BTreeMap<String, String>,
    pub route_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            timeout_ms: 10_000,
            paths: BTreeMap::from([
                ("incident".to_string(), "traffic/incidents".to_string()),
                ("branch".to_string(), "branches".to_string()),
                ("security_report".to_string(), "security/reports".to_string()),
            ]),
            route_path: "routes/search".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn path_for(&self, kind: &str) -> Option<&str> {
        self.paths.get(kind).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Vertices per zone circle.
    pub segments: usize,
    pub default_radius_m: f64,
    pub radius_by_level: BTreeMap<Level, f64>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        let table = RadiusTable::default();
        Self {
            segments: 32,
            default_radius_m: table.default_m,
            radius_by_level: table.by_level,
        }
    }
}

impl ZoneConfig {
    pub fn radius_table(&self) -> RadiusTable {
        RadiusTable {
            default_m: self.default_radius_m,
            by_level: self.radius_by_level.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub step_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { step_delay_ms: 120 }
    }
}

impl PlaybackConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl LayerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading layer configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: LayerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config file: `$CIVIC_LAYERS_CONFIG`, then
    /// `config/layers.yaml` in the working directory, then next to the crate
    /// manifest. Falls back to defaults when none exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return Self::load(explicit);
        }
        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => {
                info!("No layer configuration found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_RELATIVE_PATH)];
        if let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") {
            paths.push(Path::new(&dir).join(DEFAULT_RELATIVE_PATH));
        }
        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.zones.segments < 3 {
            bail!("zones.segments must be at least 3, got {}", self.zones.segments);
        }
        if !(self.zones.default_radius_m.is_finite() && self.zones.default_radius_m > 0.0) {
            bail!("zones.default_radius_m must be positive");
        }
        for (level, radius) in &self.zones.radius_by_level {
            if !(radius.is_finite() && *radius > 0.0) {
                bail!("zones.radius_by_level.{} must be positive", level);
            }
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        LayerConfig::default().validate().unwrap();
        assert_eq!(
            LayerConfig::default().zones.radius_table(),
            RadiusTable::default()
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "zones:\n  segments: 12\n  radius_by_level:\n    critical: 800\nplayback:\n  step_delay_ms: 5"
        )
        .unwrap();

        let config = LayerConfig::load(file.path()).unwrap();
        assert_eq!(config.zones.segments, 12);
        assert_eq!(config.zones.radius_table().radius_for(Level::Critical), 800.0);
        // Levels absent from the file fall back to the default radius.
        assert_eq!(config.zones.radius_table().radius_for(Level::Low), 150.0);
        assert_eq!(config.playback.step_delay(), Duration::from_millis(5));
        assert_eq!(config.api, ApiConfig::default());
    }

    #[test]
    fn test_invalid_segments_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "zones:\n  segments: 2").unwrap();
        let err = LayerConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("segments"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_RELATIVE_PATH);
        let config = LayerConfig::load(path).unwrap();
        assert!(config.api.path_for("incident").is_some());
        assert!(config.api.path_for("branch").is_some());
        assert!(config.api.path_for("security_report").is_some());
    }
}
