//! Self-Rescue photo clustering.
//!
//! Takes a flat list of timestamped, optionally geotagged photos and proposes
//! candidate jobs: location + time groups (flat mode) or building buckets
//! with per-visit sessions and suggested units (buckets mode). Photos that
//! cannot be placed confidently are reported as unlocated or noise. Nothing
//! here persists or applies a grouping; a human confirms every suggestion.

pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod geocode;
pub mod logging;
pub mod mock;
pub mod photo;
pub mod review;
pub mod scanner;

pub use cluster::{
    cluster, BuildingBucket, BuildingSuggestions, CandidateGroup, ClusterMode, ClusterResult,
    Clusterer, GroupSuggestions, Session,
};
pub use config::{ClusterConfig, Config};
pub use error::{ConfigError, PhotoError};
pub use photo::RescuePhoto;
