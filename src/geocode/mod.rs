//! Reverse geocoding for human-readable cluster labels.
//!
//! Lives outside the clustering core: the core only ever produces derived
//! labels, and callers that want addresses run [`label_buckets`] or
//! [`label_groups`] on its output with a geocoder of their choosing.

mod cache;
mod nominatim;

pub use cache::GeocodeCache;
pub use nominatim::{format_address, NominatimAddress, NominatimGeocoder, NominatimResponse};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cluster::geo::GeoPoint;
use crate::cluster::{BuildingBucket, CandidateGroup};
use crate::config::GeocodeConfig;

pub const SOURCE_REVERSE_GEOCODE: &str = "reverse_geocode";

/// How much an address suggestion can be trusted. A reverse-geocoded
/// address is never more than a suggestion, so there is no "high".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAddress {
    pub formatted: String,
    pub source: String,
    pub confidence: Confidence,
}

impl SuggestedAddress {
    pub fn new(formatted: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            formatted: formatted.into(),
            source: SOURCE_REVERSE_GEOCODE.to_string(),
            confidence,
        }
    }
}

/// Coordinates to address lookup.
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` means the service answered but had no usable address.
    fn reverse(&self, point: GeoPoint) -> Result<Option<SuggestedAddress>>;

    fn provider_name(&self) -> &'static str;
}

/// A geocoder behind a [`GeocodeCache`].
pub struct CachedGeocoder<G> {
    inner: G,
    cache: GeocodeCache,
}

impl<G: ReverseGeocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: GeocodeCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for CachedGeocoder<G> {
    fn reverse(&self, point: GeoPoint) -> Result<Option<SuggestedAddress>> {
        let now = Utc::now();
        if let Some(hit) = self.cache.get(point, now) {
            tracing::trace!(lat = point.lat, lng = point.lng, "Geocode cache hit");
            return Ok(hit);
        }

        let address = self.inner.reverse(point)?;
        self.cache.insert(point, address.clone(), now);
        Ok(address)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

/// Nominatim with a cache, configured from `[geocode]`.
pub fn create_geocoder(config: &GeocodeConfig) -> CachedGeocoder<NominatimGeocoder> {
    CachedGeocoder::new(
        NominatimGeocoder::new(config),
        GeocodeCache::with_ttl_hours(config.cache_ttl_hours),
    )
}

fn building_label(address: &SuggestedAddress) -> String {
    format!("{} (Building)", address.formatted)
}

/// Replace derived bucket labels with geocoded ones where a lookup succeeds.
/// Returns how many buckets were relabelled.
pub fn label_buckets(buckets: &mut [BuildingBucket], geocoder: &dyn ReverseGeocoder) -> usize {
    let mut labelled = 0;
    for bucket in buckets.iter_mut() {
        let Some(centroid) = bucket.centroid else {
            continue;
        };
        match geocoder.reverse(centroid) {
            Ok(Some(address)) => {
                bucket.suggested_label = Some(building_label(&address));
                labelled += 1;
            }
            Ok(None) => {
                tracing::debug!(bucket = %bucket.bucket_id, "No address for bucket");
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %bucket.bucket_id,
                    provider = geocoder.provider_name(),
                    "Reverse geocoding failed: {}",
                    e
                );
            }
        }
    }
    labelled
}

/// Attach address suggestions to candidate groups. Returns how many got one.
pub fn label_groups(groups: &mut [CandidateGroup], geocoder: &dyn ReverseGeocoder) -> usize {
    let mut labelled = 0;
    for group in groups.iter_mut() {
        match geocoder.reverse(group.centroid) {
            Ok(Some(address)) => {
                group.suggested_address = Some(address);
                labelled += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    group = %group.group_id,
                    provider = geocoder.provider_name(),
                    "Reverse geocoding failed: {}",
                    e
                );
            }
        }
    }
    labelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterMode, ClusterResult, Clusterer};
    use crate::config::ClusterConfig;
    use crate::photo::RescuePhoto;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeocoder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedGeocoder {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl ReverseGeocoder for FixedGeocoder {
        fn reverse(&self, _point: GeoPoint) -> Result<Option<SuggestedAddress>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("service unavailable"));
            }
            Ok(Some(SuggestedAddress::new("Burnaby – 8290 Kingsway", Confidence::Medium)))
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn photos() -> Vec<RescuePhoto> {
        (0..3)
            .map(|i| RescuePhoto {
                photo_id: format!("p{}", i),
                taken_at_utc: format!("2024-02-0{}T10:00:00Z", i + 1),
                lat: Some(49.2276),
                lng: Some(-122.9931),
                ..Default::default()
            })
            .collect()
    }

    fn clusterer() -> Clusterer {
        Clusterer::new(ClusterConfig::default()).unwrap()
    }

    #[test]
    fn test_label_buckets() {
        let mut result = clusterer().building_buckets(&photos());
        let geocoder = FixedGeocoder::new(false);

        assert_eq!(label_buckets(&mut result.buckets, &geocoder), 1);
        assert_eq!(
            result.buckets[0].suggested_label.as_deref(),
            Some("Burnaby – 8290 Kingsway (Building)")
        );
    }

    #[test]
    fn test_failure_keeps_derived_label() {
        let mut result = clusterer().building_buckets(&photos());
        let before = result.buckets[0].suggested_label.clone();

        assert_eq!(label_buckets(&mut result.buckets, &FixedGeocoder::new(true)), 0);
        assert_eq!(result.buckets[0].suggested_label, before);
    }

    #[test]
    fn test_label_groups() {
        let ClusterResult::Groups(mut result) = clusterer().cluster(&photos(), ClusterMode::Groups)
        else {
            panic!("expected groups");
        };
        assert_eq!(label_groups(&mut result.groups, &FixedGeocoder::new(false)), 1);
        let address = result.groups[0].suggested_address.as_ref().unwrap();
        assert_eq!(address.source, SOURCE_REVERSE_GEOCODE);
        assert_eq!(address.confidence, Confidence::Medium);
    }

    #[test]
    fn test_cached_geocoder_calls_through_once() {
        let geocoder = CachedGeocoder::new(FixedGeocoder::new(false), GeocodeCache::default());
        let point = GeoPoint::new(49.2276, -122.9931);

        let first = geocoder.reverse(point).unwrap();
        let second = geocoder.reverse(point).unwrap();
        assert_eq!(first, second);
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(geocoder.cache().len(), 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let geocoder = CachedGeocoder::new(FixedGeocoder::new(true), GeocodeCache::default());
        let point = GeoPoint::new(49.2276, -122.9931);

        assert!(geocoder.reverse(point).is_err());
        assert!(geocoder.reverse(point).is_err());
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 2);
        assert!(geocoder.cache().is_empty());
    }
}
