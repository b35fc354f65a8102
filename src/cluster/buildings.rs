//! Buckets mode: building-level buckets split into visits, with suggested
//! units where a visit contains a clearly separate minority run.

use serde::{Deserialize, Serialize};

use super::geo::{centroid, GeoPoint};
use super::geohash;
use super::grid::BuildingIndex;
use super::quality::NoisePolicy;
use super::session::{split_sessions, DateRange};
use super::units::{detect_units, UnitPolicy, UnitSuggestion, PRIMARY_UNIT};
use super::ClusterStats;
use crate::config::ClusterConfig;
use crate::photo::{ingest, Ingested, LocatedPhoto, RejectedPhoto, RescuePhoto};

/// Human decision for a session. The clustering core always emits
/// `Unassigned`; only the caller moves a session to `Assigned`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Assignment {
    #[default]
    Unassigned,
    Assigned {
        #[serde(rename = "unitId")]
        unit_id: String,
    },
}

/// One visit to a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    /// Member ids in capture order.
    pub photo_ids: Vec<String>,
    pub date_range: DateRange,
    pub count: usize,
    pub assignment: Assignment,
    /// Present only when the visit looks like it spans more than one unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_units: Vec<UnitSuggestion>,
}

impl Session {
    pub fn assign(&mut self, unit_id: impl Into<String>) {
        self.assignment = Assignment::Assigned {
            unit_id: unit_id.into(),
        };
    }

    pub fn unassign(&mut self) {
        self.assignment = Assignment::Unassigned;
    }

    pub fn is_subdivided(&self) -> bool {
        self.suggested_units.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitLabel {
    pub unit_id: String,
    pub label: String,
}

impl UnitLabel {
    pub fn new(unit_id: &str) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            label: format!("Unit {}", unit_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingBucket {
    pub bucket_id: String,
    /// Derived, not authoritative; replaced by a geocoded address when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<GeoPoint>,
    pub photo_ids: Vec<String>,
    pub sessions: Vec<Session>,
    /// Unit labels observed in any session; empty when nothing was subdivided.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingSuggestions {
    /// Ordered by the capture time of each bucket's first photo.
    pub buckets: Vec<BuildingBucket>,
    pub unlocated_photo_ids: Vec<String>,
    pub noise_gps_photo_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedPhoto>,
    pub stats: ClusterStats,
}

pub fn derived_label(point: GeoPoint) -> String {
    format!("Building near {:.5}, {:.5}", point.lat, point.lng)
}

pub(crate) fn building_buckets(
    photos: &[RescuePhoto],
    config: &ClusterConfig,
) -> BuildingSuggestions {
    let Ingested {
        located,
        unlocated_ids,
        rejected,
    } = ingest(photos);
    let noise_policy = NoisePolicy::from(config);
    let unit_policy = UnitPolicy::from(config);

    // Earliest photos seed buckets, so bucket order follows capture time.
    let mut ordered: Vec<&LocatedPhoto> = located.iter().collect();
    ordered.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then_with(|| a.id.cmp(&b.id)));

    let mut index = BuildingIndex::new(config.building_radius_m);
    let mut members: Vec<Vec<&LocatedPhoto>> = Vec::new();
    for photo in ordered {
        let bucket = index.assign(photo.point);
        if bucket == members.len() {
            members.push(Vec::new());
        }
        members[bucket].push(photo);
    }
    tracing::debug!(
        buckets = members.len(),
        radius_m = config.building_radius_m,
        "Bucketed located photos by building radius"
    );

    let mut buckets = Vec::new();
    let mut noise: Vec<&LocatedPhoto> = Vec::new();

    for (n, bucket_members) in members.into_iter().enumerate() {
        if noise_policy.is_noise(&bucket_members) {
            noise.extend(bucket_members);
            continue;
        }

        let Some(seed) = index.seed(n) else {
            continue;
        };
        let bucket_id = format!("bkt_{}_{}", n + 1, geohash::encode(seed.lat, seed.lng, 7));
        if let Some(bucket) = building_bucket(bucket_id, bucket_members, config, &unit_policy) {
            buckets.push(bucket);
        }
    }

    noise.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then_with(|| a.id.cmp(&b.id)));

    let clustered_count = buckets.iter().map(|b| b.photo_ids.len()).sum();
    let session_count = buckets.iter().map(|b| b.sessions.len()).sum();
    let stats = ClusterStats {
        total_photos: photos.len(),
        clustered_count,
        cluster_count: buckets.len(),
        session_count,
        unlocated_count: unlocated_ids.len(),
        noise_count: noise.len(),
        rejected_count: rejected.len(),
    };

    BuildingSuggestions {
        buckets,
        unlocated_photo_ids: unlocated_ids,
        noise_gps_photo_ids: noise.into_iter().map(|p| p.id.clone()).collect(),
        rejected,
        stats,
    }
}

fn building_bucket(
    bucket_id: String,
    members: Vec<&LocatedPhoto>,
    config: &ClusterConfig,
    unit_policy: &UnitPolicy,
) -> Option<BuildingBucket> {
    let center = centroid(members.iter().map(|p| p.point))?;
    let photo_ids: Vec<String> = members.iter().map(|p| p.id.clone()).collect();

    let mut sessions = Vec::new();
    for (i, visit) in split_sessions(members, config.visit_gap())
        .into_iter()
        .enumerate()
    {
        let Some(date_range) = DateRange::of(&visit) else {
            continue;
        };
        let suggested_units = detect_units(&visit, unit_policy).unwrap_or_default();

        sessions.push(Session {
            session_id: format!("{}_ses_{}", bucket_id, i + 1),
            photo_ids: visit.iter().map(|p| p.id.clone()).collect(),
            date_range,
            count: visit.len(),
            assignment: Assignment::Unassigned,
            suggested_units,
        });
    }

    let units = observed_units(&sessions);
    if !units.is_empty() {
        tracing::debug!(
            bucket = %bucket_id,
            units = units.len(),
            "Suggested separate units within building"
        );
    }

    Some(BuildingBucket {
        bucket_id,
        suggested_label: Some(derived_label(center)),
        centroid: Some(center),
        photo_ids,
        sessions,
        units,
    })
}

/// Primary unit plus every minority label, in first-seen order.
fn observed_units(sessions: &[Session]) -> Vec<UnitLabel> {
    let mut ids: Vec<&str> = Vec::new();
    for unit in sessions.iter().flat_map(|s| s.suggested_units.iter()) {
        if !ids.contains(&unit.unit_id.as_str()) {
            ids.push(&unit.unit_id);
        }
    }

    if ids.is_empty() {
        return Vec::new();
    }
    if let Some(pos) = ids.iter().position(|id| *id == PRIMARY_UNIT) {
        let primary = ids.remove(pos);
        ids.insert(0, primary);
    }
    ids.into_iter().map(UnitLabel::new).collect()
}
