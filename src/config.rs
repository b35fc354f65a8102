use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Smallest building radius accepted; below this GPS jitter alone splits a building.
pub const MIN_BUILDING_RADIUS_M: f64 = 1.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub geocode: GeocodeConfig,
}

/// Clustering policy. The defaults are product-tuned values, not derived ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Geohash length used as the flat-mode bucket key (7 is roughly 150 m).
    #[serde(default = "default_geohash_precision")]
    pub geohash_precision: u8,

    /// Building-mode radius around a bucket's reference photo.
    #[serde(default = "default_building_radius_m")]
    pub building_radius_m: f64,

    /// Flat-mode session boundary. Deliberately wide: sparse jobsite visits
    /// weeks apart still belong to one job.
    #[serde(default = "default_max_gap_days")]
    pub max_gap_days: u32,

    /// Session boundary inside a building bucket (one session per visit).
    /// Buckets mode splits on this, not on `max_gap_days`: two photos of the
    /// same building days apart are one bucket with two sessions.
    #[serde(default = "default_visit_gap_minutes")]
    pub visit_gap_minutes: u64,

    /// Gap that separates sub-runs inside one visit for unit detection.
    #[serde(default = "default_unit_gap_minutes")]
    pub unit_gap_minutes: u64,

    /// GPS accuracy radius above which a photo counts as low-accuracy.
    #[serde(default = "default_low_accuracy_threshold_m")]
    pub low_accuracy_threshold_m: f64,

    #[serde(default = "default_min_session_size")]
    pub min_session_size: usize,

    /// Clusters smaller than this are noise even with good accuracy.
    #[serde(default = "default_min_group_photos")]
    pub min_group_photos: usize,

    #[serde(default = "default_max_minority_ratio")]
    pub max_minority_ratio: f64,

    #[serde(default = "default_min_unit_photos")]
    pub min_unit_photos: usize,
}

fn default_geohash_precision() -> u8 {
    7
}

fn default_building_radius_m() -> f64 {
    250.0
}

fn default_max_gap_days() -> u32 {
    60
}

fn default_visit_gap_minutes() -> u64 {
    12 * 60
}

fn default_unit_gap_minutes() -> u64 {
    10
}

fn default_low_accuracy_threshold_m() -> f64 {
    100.0
}

fn default_min_session_size() -> usize {
    5
}

fn default_min_group_photos() -> usize {
    2
}

fn default_max_minority_ratio() -> f64 {
    0.3
}

fn default_min_unit_photos() -> usize {
    3
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            geohash_precision: default_geohash_precision(),
            building_radius_m: default_building_radius_m(),
            max_gap_days: default_max_gap_days(),
            visit_gap_minutes: default_visit_gap_minutes(),
            unit_gap_minutes: default_unit_gap_minutes(),
            low_accuracy_threshold_m: default_low_accuracy_threshold_m(),
            min_session_size: default_min_session_size(),
            min_group_photos: default_min_group_photos(),
            max_minority_ratio: default_max_minority_ratio(),
            min_unit_photos: default_min_unit_photos(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.geohash_precision) {
            return Err(ConfigError::GeohashPrecision(self.geohash_precision));
        }

        for (field, value) in [
            ("building_radius_m", self.building_radius_m),
            ("low_accuracy_threshold_m", self.low_accuracy_threshold_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.building_radius_m < MIN_BUILDING_RADIUS_M {
            return Err(ConfigError::BuildingRadius {
                value: self.building_radius_m,
                min: MIN_BUILDING_RADIUS_M,
            });
        }

        if self.max_gap_days == 0 {
            return Err(ConfigError::ZeroDuration { field: "max_gap_days" });
        }
        if self.visit_gap_minutes == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "visit_gap_minutes",
            });
        }
        if self.unit_gap_minutes == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "unit_gap_minutes",
            });
        }
        if self.unit_gap_minutes >= self.visit_gap_minutes {
            return Err(ConfigError::UnitGapTooWide {
                unit_gap_minutes: self.unit_gap_minutes,
                visit_gap_minutes: self.visit_gap_minutes,
            });
        }

        for (field, value) in [
            ("min_session_size", self.min_session_size),
            ("min_group_photos", self.min_group_photos),
            ("min_unit_photos", self.min_unit_photos),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount { field });
            }
        }

        // A minority must never be able to outnumber the majority.
        if !(self.max_minority_ratio > 0.0 && self.max_minority_ratio < 0.5) {
            return Err(ConfigError::MinorityRatio(self.max_minority_ratio));
        }

        Ok(())
    }

    pub fn max_gap(&self) -> Duration {
        Duration::days(i64::from(self.max_gap_days))
    }

    pub fn visit_gap(&self) -> Duration {
        Duration::minutes(self.visit_gap_minutes as i64)
    }

    pub fn unit_gap(&self) -> Duration {
        Duration::minutes(self.unit_gap_minutes as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "heic".to_string(),
        "heif".to_string(),
        "tif".to_string(),
        "tiff".to_string(),
        "png".to_string(),
        "webp".to_string(),
    ]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Label buckets and groups with a reverse-geocoded address.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,

    /// Nominatim's usage policy requires an identifying User-Agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_geocode_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u32,
}

fn default_geocode_endpoint() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("rescue-cluster/{}", env!("CARGO_PKG_VERSION"))
}

fn default_geocode_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_hours() -> u32 {
    24
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_geocode_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocode_timeout_secs(),
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rescue-cluster")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ClusterConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_toml_merges_over_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cluster]
            max_gap_days = 30
            low_accuracy_threshold_m = 50.0
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster.max_gap_days, 30);
        assert_eq!(config.cluster.low_accuracy_threshold_m, 50.0);
        assert_eq!(config.cluster.geohash_precision, 7);
        assert_eq!(config.cluster.min_session_size, 5);
        assert!(!config.geocode.enabled);
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let config = ClusterConfig {
            low_accuracy_threshold_m: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "low_accuracy_threshold_m",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_degenerate_building_radius() {
        let config = ClusterConfig {
            building_radius_m: 1e-300,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BuildingRadius {
                value: 1e-300,
                min: MIN_BUILDING_RADIUS_M,
            })
        );

        let config = ClusterConfig {
            building_radius_m: MIN_BUILDING_RADIUS_M,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            ClusterConfig {
                geohash_precision: 0,
                ..Default::default()
            },
            ClusterConfig {
                building_radius_m: f64::NAN,
                ..Default::default()
            },
            ClusterConfig {
                max_gap_days: 0,
                ..Default::default()
            },
            ClusterConfig {
                min_session_size: 0,
                ..Default::default()
            },
            ClusterConfig {
                max_minority_ratio: 0.5,
                ..Default::default()
            },
            ClusterConfig {
                unit_gap_minutes: 720,
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{:?} should be rejected", config);
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.cluster.building_radius_m = 120.0;
        config.geocode.enabled = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.cluster, config.cluster);
        assert!(loaded.geocode.enabled);
    }
}
