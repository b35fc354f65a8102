//! Flat mode: one candidate group per (geohash cell, session).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::geo::{centroid, GeoPoint};
use super::geohash;
use super::quality::NoisePolicy;
use super::session::{split_sessions, DateRange};
use super::ClusterStats;
use crate::config::ClusterConfig;
use crate::geocode::SuggestedAddress;
use crate::photo::{ingest, Ingested, LocatedPhoto, RejectedPhoto, RescuePhoto};

/// A proposed job: photos taken at one place within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateGroup {
    pub group_id: String,
    pub geohash: String,
    /// Member ids in capture order.
    pub photo_ids: Vec<String>,
    pub centroid: GeoPoint,
    pub date_range: DateRange,
    pub stats: GroupStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_address: Option<SuggestedAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub count: usize,
    pub low_accuracy_count: usize,
    pub span_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSuggestions {
    /// Ordered by start time, then group id.
    pub groups: Vec<CandidateGroup>,
    pub unlocated_photo_ids: Vec<String>,
    pub noise_gps_photo_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedPhoto>,
    pub stats: ClusterStats,
}

pub(crate) fn suggest_groups(photos: &[RescuePhoto], config: &ClusterConfig) -> GroupSuggestions {
    let Ingested {
        located,
        unlocated_ids,
        rejected,
    } = ingest(photos);
    let policy = NoisePolicy::from(config);

    // Ordered map so identical input always walks buckets the same way.
    let mut buckets: BTreeMap<String, Vec<&LocatedPhoto>> = BTreeMap::new();
    for photo in &located {
        let key = geohash::encode(photo.point.lat, photo.point.lng, config.geohash_precision);
        buckets.entry(key).or_default().push(photo);
    }
    tracing::debug!(
        buckets = buckets.len(),
        precision = config.geohash_precision,
        "Bucketed located photos by geohash"
    );

    let mut groups = Vec::new();
    let mut noise: Vec<&LocatedPhoto> = Vec::new();

    for (geohash, members) in buckets {
        for (n, session) in split_sessions(members, config.max_gap())
            .into_iter()
            .enumerate()
        {
            if policy.is_noise(&session) {
                noise.extend(session);
                continue;
            }

            let group_id = format!("grp_{}_{}", geohash, n + 1);
            if let Some(group) = candidate_group(group_id, &geohash, &session, &policy) {
                groups.push(group);
            }
        }
    }

    groups.sort_by(|a, b| {
        a.date_range
            .start
            .cmp(&b.date_range.start)
            .then_with(|| a.group_id.cmp(&b.group_id))
    });
    noise.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then_with(|| a.id.cmp(&b.id)));

    let clustered_count = groups.iter().map(|g| g.photo_ids.len()).sum();
    let stats = ClusterStats {
        total_photos: photos.len(),
        clustered_count,
        cluster_count: groups.len(),
        session_count: groups.len(),
        unlocated_count: unlocated_ids.len(),
        noise_count: noise.len(),
        rejected_count: rejected.len(),
    };

    GroupSuggestions {
        groups,
        unlocated_photo_ids: unlocated_ids,
        noise_gps_photo_ids: noise.into_iter().map(|p| p.id.clone()).collect(),
        rejected,
        stats,
    }
}

fn candidate_group(
    group_id: String,
    geohash: &str,
    session: &[&LocatedPhoto],
    policy: &NoisePolicy,
) -> Option<CandidateGroup> {
    let centroid = centroid(session.iter().map(|p| p.point))?;
    let date_range = DateRange::of(session)?;

    Some(CandidateGroup {
        group_id,
        geohash: geohash.to_string(),
        photo_ids: session.iter().map(|p| p.id.clone()).collect(),
        centroid,
        date_range,
        stats: GroupStats {
            count: session.len(),
            low_accuracy_count: policy.low_accuracy_count(session.iter().copied()),
            span_minutes: date_range.span_minutes(),
        },
        suggested_address: None,
    })
}
