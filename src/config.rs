use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gestures: GestureSettings,
    pub radial: RadialSettings,
    pub autosave: AutoSaveSettings,
    pub canvas: CanvasSettings,
    pub location: Option<Coordinates>,
    pub geocode: GeocodeSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub swipe_distance: f64,
    pub swipe_max_duration_ms: u64,
    pub swipe_min_velocity: f64,
    pub long_press_ms: u64,
    pub double_tap_ms: u64,
    pub drag_threshold: f64,
    pub pinch_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadialSettings {
    pub distance_per_option: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    pub interval_ms: u64,
    pub debounce_ms: u64,
}

/// Pixel size of one terminal cell on the day canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub cell_width: f64,
    pub cell_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub cache_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gestures: GestureSettings::default(),
            radial: RadialSettings::default(),
            autosave: AutoSaveSettings::default(),
            canvas: CanvasSettings::default(),
            location: None,
            geocode: GeocodeSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for GestureSettings {
    fn default() -> Self {
        GestureSettings {
            swipe_distance: 50.0,
            swipe_max_duration_ms: 300,
            swipe_min_velocity: 0.3,
            long_press_ms: 500,
            double_tap_ms: 300,
            drag_threshold: 10.0,
            pinch_threshold: 30.0,
        }
    }
}

impl Default for RadialSettings {
    fn default() -> Self {
        RadialSettings {
            distance_per_option: 30.0,
            radius: 60.0,
        }
    }
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        AutoSaveSettings {
            interval_ms: 5_000,
            debounce_ms: 1_000,
        }
    }
}

impl Default for CanvasSettings {
    fn default() -> Self {
        CanvasSettings {
            cell_width: 8.0,
            cell_height: 16.0,
        }
    }
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        GeocodeSettings {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            cache_ttl_secs: 3_600,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("gesture thresholds must be positive")]
    NonPositiveThreshold,
    #[error("canvas cell size must be positive")]
    InvalidCell,
    #[error("radial distance per option must be positive")]
    InvalidRadialStep,
}

impl Settings {
    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let settings: Settings = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {:?}", path))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gestures;
        if g.swipe_distance <= 0.0
            || g.swipe_min_velocity <= 0.0
            || g.drag_threshold <= 0.0
            || g.pinch_threshold <= 0.0
        {
            return Err(ConfigError::NonPositiveThreshold);
        }
        if self.canvas.cell_width <= 0.0 || self.canvas.cell_height <= 0.0 {
            return Err(ConfigError::InvalidCell);
        }
        if self.radial.distance_per_option <= 0.0 {
            return Err(ConfigError::InvalidRadialStep);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.gestures.long_press_ms, 500);
        assert_eq!(settings.autosave.interval_ms, 5_000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "gestures:\n  long_press_ms: 700\nlocation:\n  lat: 13.75\n  lng: 100.5\n",
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.gestures.long_press_ms, 700);
        assert_eq!(settings.gestures.swipe_distance, 50.0);
        assert_eq!(
            settings.location,
            Some(Coordinates {
                lat: 13.75,
                lng: 100.5
            })
        );
        assert_eq!(settings.radial, RadialSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "gestures: [not, a, map]\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        let mut settings = Settings::default();
        settings.canvas.cell_width = 0.0;
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidCell)));
    }
}
