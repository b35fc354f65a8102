use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::SuggestedAddress;
use crate::cluster::geo::GeoPoint;

/// Cache key: coordinates rounded to 4 decimals (about 11 m).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    lat_e4: i64,
    lng_e4: i64,
}

impl CacheKey {
    fn of(point: GeoPoint) -> Self {
        Self {
            lat_e4: (point.lat * 10_000.0).round() as i64,
            lng_e4: (point.lng * 10_000.0).round() as i64,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    address: Option<SuggestedAddress>,
    stored_at: DateTime<Utc>,
}

/// Reverse-geocoding results keyed by rounded coordinates.
///
/// Entries expire `ttl` after they were stored. "No address" answers are
/// cached too, so an empty lookup is not repeated inside the TTL. The clock
/// is always passed in; the cache never reads it.
#[derive(Debug)]
pub struct GeocodeCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl GeocodeCache {
    pub const DEFAULT_TTL_HOURS: u32 = 24;

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl_hours(hours: u32) -> Self {
        Self::new(Duration::hours(i64::from(hours)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached answer for `point`, if still fresh at `now`. The outer `Option`
    /// is the cache hit, the inner one the stored answer.
    pub fn get(&self, point: GeoPoint, now: DateTime<Utc>) -> Option<Option<SuggestedAddress>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(&CacheKey::of(point))?;
        if now - entry.stored_at < self.ttl {
            Some(entry.address.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, point: GeoPoint, address: Option<SuggestedAddress>, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                CacheKey::of(point),
                CacheEntry {
                    address,
                    stored_at: now,
                },
            );
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::with_ttl_hours(Self::DEFAULT_TTL_HOURS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::Confidence;
    use chrono::TimeZone;

    fn address(text: &str) -> SuggestedAddress {
        SuggestedAddress::new(text, Confidence::Medium)
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_nearby_points_share_an_entry() {
        let cache = GeocodeCache::default();
        cache.insert(
            GeoPoint::new(49.22761, -122.99312),
            Some(address("Burnaby – 8290 Kingsway")),
            noon(),
        );

        let hit = cache.get(GeoPoint::new(49.22764, -122.99308), noon());
        assert_eq!(hit, Some(Some(address("Burnaby – 8290 Kingsway"))));
        assert_eq!(cache.get(GeoPoint::new(49.2290, -122.9931), noon()), None);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = GeocodeCache::with_ttl_hours(1);
        let point = GeoPoint::new(49.2827, -123.1207);
        cache.insert(point, None, noon());

        assert_eq!(cache.get(point, noon() + Duration::minutes(59)), Some(None));
        assert_eq!(cache.get(point, noon() + Duration::minutes(60)), None);
    }

    #[test]
    fn test_purge_expired() {
        let cache = GeocodeCache::with_ttl_hours(24);
        cache.insert(GeoPoint::new(49.0, -123.0), None, noon());
        cache.insert(GeoPoint::new(49.1, -123.0), None, noon() + Duration::hours(20));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.purge_expired(noon() + Duration::hours(30)), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}
