//! Clustering core.
//!
//! Turns a list of photo records into suggested jobs. Everything here is
//! pure and synchronous: no I/O, no clock, no randomness. The same input
//! and configuration always produce the same output.

pub mod buildings;
pub mod geo;
pub mod geohash;
pub mod grid;
pub mod groups;
pub mod quality;
pub mod session;
pub mod units;

pub use buildings::{Assignment, BuildingBucket, BuildingSuggestions, Session, UnitLabel};
pub use geo::GeoPoint;
pub use groups::{CandidateGroup, GroupStats, GroupSuggestions};
pub use session::DateRange;
pub use units::UnitSuggestion;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ClusterConfig;
use crate::error::ConfigError;
use crate::photo::{RejectedPhoto, RescuePhoto};

/// Summary counts attached to every result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub total_photos: usize,
    pub clustered_count: usize,
    pub cluster_count: usize,
    pub session_count: usize,
    pub unlocated_count: usize,
    pub noise_count: usize,
    pub rejected_count: usize,
}

impl ClusterStats {
    /// Photos that still need a human decision outside any cluster.
    pub fn needs_attention(&self) -> usize {
        self.unlocated_count + self.noise_count
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// Flat candidate groups keyed by geohash cell and session.
    #[default]
    Groups,
    /// Building buckets with visits and suggested units.
    Buckets,
}

impl FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "groups" | "flat" => Ok(ClusterMode::Groups),
            "buckets" | "buildings" => Ok(ClusterMode::Buckets),
            other => Err(format!("unknown cluster mode '{}' (expected groups or buckets)", other)),
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterMode::Groups => write!(f, "groups"),
            ClusterMode::Buckets => write!(f, "buckets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ClusterResult {
    Groups(GroupSuggestions),
    Buckets(BuildingSuggestions),
}

impl ClusterResult {
    pub fn mode(&self) -> ClusterMode {
        match self {
            ClusterResult::Groups(_) => ClusterMode::Groups,
            ClusterResult::Buckets(_) => ClusterMode::Buckets,
        }
    }

    pub fn stats(&self) -> &ClusterStats {
        match self {
            ClusterResult::Groups(r) => &r.stats,
            ClusterResult::Buckets(r) => &r.stats,
        }
    }

    pub fn unlocated_photo_ids(&self) -> &[String] {
        match self {
            ClusterResult::Groups(r) => &r.unlocated_photo_ids,
            ClusterResult::Buckets(r) => &r.unlocated_photo_ids,
        }
    }

    pub fn noise_gps_photo_ids(&self) -> &[String] {
        match self {
            ClusterResult::Groups(r) => &r.noise_gps_photo_ids,
            ClusterResult::Buckets(r) => &r.noise_gps_photo_ids,
        }
    }

    pub fn rejected(&self) -> &[RejectedPhoto] {
        match self {
            ClusterResult::Groups(r) => &r.rejected,
            ClusterResult::Buckets(r) => &r.rejected,
        }
    }

    /// Every photo id placed in a group or bucket.
    pub fn clustered_photo_ids(&self) -> Vec<&str> {
        match self {
            ClusterResult::Groups(r) => r
                .groups
                .iter()
                .flat_map(|g| g.photo_ids.iter().map(String::as_str))
                .collect(),
            ClusterResult::Buckets(r) => r
                .buckets
                .iter()
                .flat_map(|b| b.photo_ids.iter().map(String::as_str))
                .collect(),
        }
    }
}

/// Validated configuration plus the two clustering entry points.
#[derive(Debug, Clone)]
pub struct Clusterer {
    config: ClusterConfig,
}

impl Clusterer {
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn suggest_groups(&self, photos: &[RescuePhoto]) -> GroupSuggestions {
        let result = groups::suggest_groups(photos, &self.config);
        tracing::info!(
            photos = result.stats.total_photos,
            groups = result.stats.cluster_count,
            unlocated = result.stats.unlocated_count,
            noise = result.stats.noise_count,
            rejected = result.stats.rejected_count,
            "Suggested candidate groups"
        );
        result
    }

    pub fn building_buckets(&self, photos: &[RescuePhoto]) -> BuildingSuggestions {
        let result = buildings::building_buckets(photos, &self.config);
        tracing::info!(
            photos = result.stats.total_photos,
            buckets = result.stats.cluster_count,
            sessions = result.stats.session_count,
            unlocated = result.stats.unlocated_count,
            noise = result.stats.noise_count,
            rejected = result.stats.rejected_count,
            "Suggested building buckets"
        );
        result
    }

    pub fn cluster(&self, photos: &[RescuePhoto], mode: ClusterMode) -> ClusterResult {
        match mode {
            ClusterMode::Groups => ClusterResult::Groups(self.suggest_groups(photos)),
            ClusterMode::Buckets => ClusterResult::Buckets(self.building_buckets(photos)),
        }
    }
}

/// One-shot clustering with an explicit configuration.
pub fn cluster(
    photos: &[RescuePhoto],
    config: &ClusterConfig,
    mode: ClusterMode,
) -> Result<ClusterResult, ConfigError> {
    Ok(Clusterer::new(config.clone())?.cluster(photos, mode))
}
