//! Deterministic mock datasets for development and load testing.
//!
//! The generator is seeded with Mulberry32, so a given seed and options
//! always produce the same photos. Along with the photos it emits the
//! ground-truth buckets the data was built from, for comparison with what
//! the clustering core suggests.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cluster::buildings::{Assignment, BuildingBucket, Session, UnitLabel};
use crate::cluster::geo::GeoPoint;
use crate::cluster::session::DateRange;
use crate::cluster::units::UnitSuggestion;
use crate::photo::RescuePhoto;

/// Metres per degree used for jitter.
const JITTER_METERS_PER_DEGREE: f64 = 111_000.0;
const JITTER_M: f64 = 40.0;

pub const UNLOCATED_BUCKET_ID: &str = "bucket_unlocated";
pub const NOISE_BUCKET_ID: &str = "bucket_noise";

struct Site {
    city: &'static str,
    address: &'static str,
    lat: f64,
    lng: f64,
}

const SITES: [Site; 10] = [
    Site { city: "Burnaby", address: "8290 Kingsway", lat: 49.2276, lng: -122.9931 },
    Site { city: "Vancouver", address: "5862 Cambie St", lat: 49.2270, lng: -123.1162 },
    Site { city: "Richmond", address: "4500 No. 3 Rd", lat: 49.1666, lng: -123.1369 },
    Site { city: "Surrey", address: "10355 King George Blvd", lat: 49.1839, lng: -122.8478 },
    Site { city: "North Vancouver", address: "935 Marine Dr", lat: 49.3130, lng: -123.0784 },
    Site { city: "Coquitlam", address: "2929 Barnet Hwy", lat: 49.2781, lng: -122.7914 },
    Site { city: "New Westminster", address: "800 Columbia St", lat: 49.2057, lng: -122.9110 },
    Site { city: "Vancouver", address: "1055 W Hastings St", lat: 49.2878, lng: -123.1208 },
    Site { city: "Burnaby", address: "4700 Kingsway", lat: 49.2292, lng: -123.0044 },
    Site { city: "Vancouver", address: "2220 Cambie St", lat: 49.2623, lng: -123.1150 },
];

const UNIT_IDS: [&str; 3] = ["A", "B", "C"];

/// Mulberry32: small, fast, 32-bit state PRNG.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        (t ^ (t >> 14)) as f64 / 4_294_967_296.0
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        (self.next_f64() * len as f64).floor() as usize
    }

    fn jitter(&mut self, base: f64, meters: f64) -> f64 {
        base + (self.next_f64() * 2.0 - 1.0) * (meters / JITTER_METERS_PER_DEGREE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockOptions {
    pub seed: u32,
    pub buckets: usize,
    pub sessions_per_bucket: usize,
    pub photos_per_session: usize,
    pub no_gps_photos: usize,
    pub noise_gps_photos: usize,
    pub majority_unit: String,
    /// Chance that a session contains photos from a second unit.
    pub minority_chance: f64,
    /// Share of a mixed session that belongs to the second unit.
    pub minority_ratio: f64,
    pub session_gap_minutes: i64,
    pub photo_interval_seconds: i64,
    /// When non-zero, the minority run of a mixed session is moved this many
    /// minutes past the majority and recorded as an expected unit split.
    pub minority_offset_minutes: i64,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            seed: 1337,
            buckets: 3,
            sessions_per_bucket: 12,
            photos_per_session: 80,
            no_gps_photos: 200,
            noise_gps_photos: 0,
            majority_unit: "A".to_string(),
            minority_chance: 0.65,
            minority_ratio: 0.08,
            session_gap_minutes: 120,
            photo_interval_seconds: 45,
            minority_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPreset {
    Small,
    Medium1k,
    Large5k,
    Huge20k,
}

impl MockPreset {
    pub fn options(self) -> MockOptions {
        let (buckets, sessions_per_bucket, photos_per_session, no_gps_photos, noise_gps_photos) =
            match self {
                MockPreset::Small => (2, 6, 40, 40, 0),
                MockPreset::Medium1k => (3, 8, 45, 80, 0),
                MockPreset::Large5k => (6, 14, 55, 200, 200),
                MockPreset::Huge20k => (10, 20, 90, 800, 800),
            };
        MockOptions {
            buckets,
            sessions_per_bucket,
            photos_per_session,
            no_gps_photos,
            noise_gps_photos,
            ..Default::default()
        }
    }
}

impl FromStr for MockPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(MockPreset::Small),
            "medium1k" | "medium" => Ok(MockPreset::Medium1k),
            "large5k" | "large" => Ok(MockPreset::Large5k),
            "huge20k" | "huge" => Ok(MockPreset::Huge20k),
            other => Err(format!(
                "unknown preset '{}' (expected small, medium1k, large5k or huge20k)",
                other
            )),
        }
    }
}

impl fmt::Display for MockPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MockPreset::Small => "small",
            MockPreset::Medium1k => "medium1k",
            MockPreset::Large5k => "large5k",
            MockPreset::Huge20k => "huge20k",
        };
        write!(f, "{}", name)
    }
}

/// Generated photos plus the buckets they were generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockData {
    pub photos: Vec<RescuePhoto>,
    pub buckets: Vec<BuildingBucket>,
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 7, 15, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn mock_photo(id: String, taken_at: DateTime<Utc>, point: Option<GeoPoint>) -> RescuePhoto {
    RescuePhoto {
        file_name: Some(id.clone()),
        photo_id: id,
        taken_at_utc: iso(taken_at),
        lat: point.map(|p| p.lat),
        lng: point.map(|p| p.lng),
        accuracy_m: None,
        file_size: None,
    }
}

fn single_session(
    session_id: &str,
    photo_ids: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Session {
    Session {
        session_id: session_id.to_string(),
        count: photo_ids.len(),
        photo_ids,
        date_range: DateRange { start, end },
        assignment: Assignment::Unassigned,
        suggested_units: Vec::new(),
    }
}

pub fn generate(opts: &MockOptions) -> MockData {
    let mut rnd = Mulberry32::new(opts.seed);
    let t0 = epoch();
    let mut photos = Vec::new();
    let mut buckets = Vec::new();
    let mut used_sites: Vec<usize> = Vec::new();

    let other_units: Vec<&str> = UNIT_IDS
        .iter()
        .copied()
        .filter(|u| *u != opts.majority_unit)
        .collect();

    for b in 0..opts.buckets {
        let mut site_index = rnd.index(SITES.len());
        while used_sites.contains(&site_index) && used_sites.len() < SITES.len() {
            site_index = (site_index + 1) % SITES.len();
        }
        used_sites.push(site_index);
        let site = &SITES[site_index];

        let bucket_id = format!("bucket_building_{}", b + 1);
        let mut bucket_photo_ids = Vec::new();
        let mut sessions = Vec::new();

        for s in 0..opts.sessions_per_bucket {
            let session_id = format!("sess_b{}_{}", b + 1, s + 1);
            // Sites ~8 months apart, visits ~3 days apart.
            let offset_minutes = (b as i64 * 8 * 30 * 24 * 60)
                + (s as i64 * 3 * 24 * 60)
                + (s as i64 * opts.session_gap_minutes);
            let session_start = t0 + Duration::minutes(offset_minutes);

            let is_mixed = rnd.next_f64() < opts.minority_chance;
            let minority_unit = if other_units.is_empty() {
                opts.majority_unit.as_str()
            } else {
                other_units[rnd.index(other_units.len())]
            };

            let n = opts.photos_per_session;
            let minority_count = if is_mixed {
                ((n as f64 * opts.minority_ratio).floor() as usize).max(1)
            } else {
                0
            };
            let minority_start = if is_mixed {
                rnd.index(n.saturating_sub(minority_count))
            } else {
                0
            };
            let shift_minority = is_mixed && opts.minority_offset_minutes > 0;
            let is_minority =
                |i: usize| is_mixed && i >= minority_start && i < minority_start + minority_count;

            let mut session_end = session_start;
            let mut session_photo_ids = Vec::with_capacity(n);
            let mut majority_times = Vec::new();
            let mut minority_times = Vec::new();
            let mut majority_ids = Vec::new();
            let mut minority_ids = Vec::new();

            for i in 0..n {
                let id = format!("p_{}_{}_{}", bucket_id, session_id, i);

                let (slot, extra) = if !shift_minority {
                    (i, Duration::zero())
                } else if is_minority(i) {
                    (
                        n - minority_count + (i - minority_start),
                        Duration::minutes(opts.minority_offset_minutes),
                    )
                } else if i < minority_start {
                    (i, Duration::zero())
                } else {
                    (i - minority_count, Duration::zero())
                };
                let seconds = slot as i64 * opts.photo_interval_seconds
                    + (rnd.next_f64() * 8.0).floor() as i64;
                let taken_at = session_start + Duration::seconds(seconds) + extra;
                session_end = session_end.max(taken_at);

                let lat = rnd.jitter(site.lat, JITTER_M);
                let lng = rnd.jitter(site.lng, JITTER_M);
                photos.push(mock_photo(id.clone(), taken_at, Some(GeoPoint::new(lat, lng))));

                if is_minority(i) {
                    minority_times.push(taken_at);
                    minority_ids.push(id.clone());
                } else {
                    majority_times.push(taken_at);
                    majority_ids.push(id.clone());
                }
                session_photo_ids.push(id.clone());
                bucket_photo_ids.push(id);
            }

            let mut session =
                single_session(&session_id, session_photo_ids, session_start, session_end);
            if shift_minority {
                session.suggested_units = vec![
                    expected_unit(&opts.majority_unit, true, majority_ids, &majority_times),
                    expected_unit(minority_unit, false, minority_ids, &minority_times),
                ]
                .into_iter()
                .flatten()
                .collect();
            }
            sessions.push(session);
        }

        buckets.push(BuildingBucket {
            bucket_id,
            suggested_label: Some(format!("{} – {}", site.city, site.address)),
            centroid: Some(GeoPoint::new(site.lat, site.lng)),
            photo_ids: bucket_photo_ids,
            sessions,
            units: UNIT_IDS.iter().map(|u| UnitLabel::new(u)).collect(),
        });
    }

    let building_minutes =
        (opts.buckets * opts.sessions_per_bucket) as i64 * opts.session_gap_minutes;

    if opts.no_gps_photos > 0 {
        let start = t0 + Duration::minutes(building_minutes + 60);
        let mut ids = Vec::with_capacity(opts.no_gps_photos);
        for i in 0..opts.no_gps_photos {
            let id = format!("p_nogps_{}", i);
            let seconds = i as i64 * 30 + (rnd.next_f64() * 10.0).floor() as i64;
            photos.push(mock_photo(id.clone(), start + Duration::seconds(seconds), None));
            ids.push(id);
        }
        let end = start + Duration::seconds(opts.no_gps_photos as i64 * 30);
        buckets.push(pseudo_bucket(
            UNLOCATED_BUCKET_ID,
            "Unlocated (No GPS)",
            single_session("sess_nogps", ids, start, end),
        ));
    }

    if opts.noise_gps_photos > 0 {
        let start = t0 + Duration::minutes(building_minutes + 180);
        let mut ids = Vec::with_capacity(opts.noise_gps_photos);
        for i in 0..opts.noise_gps_photos {
            let id = format!("p_noise_{}", i);
            let seconds = i as i64 * 35 + (rnd.next_f64() * 10.0).floor() as i64;
            let lat = 49.1 + rnd.next_f64() * 0.25;
            let lng = -123.4 + rnd.next_f64() * 0.6;
            photos.push(mock_photo(
                id.clone(),
                start + Duration::seconds(seconds),
                Some(GeoPoint::new(lat, lng)),
            ));
            ids.push(id);
        }
        let end = start + Duration::seconds(opts.noise_gps_photos as i64 * 35);
        buckets.push(pseudo_bucket(
            NOISE_BUCKET_ID,
            "Noise / Scattered GPS",
            single_session("sess_noise", ids, start, end),
        ));
    }

    tracing::debug!(
        seed = opts.seed,
        photos = photos.len(),
        buckets = buckets.len(),
        "Generated mock dataset"
    );

    MockData { photos, buckets }
}

fn expected_unit(
    unit_id: &str,
    primary: bool,
    photo_ids: Vec<String>,
    times: &[DateTime<Utc>],
) -> Option<UnitSuggestion> {
    let start = times.iter().min().copied()?;
    let end = times.iter().max().copied()?;
    Some(UnitSuggestion {
        unit_id: unit_id.to_string(),
        primary,
        photo_ids,
        date_range: DateRange { start, end },
    })
}

fn pseudo_bucket(bucket_id: &str, label: &str, session: Session) -> BuildingBucket {
    BuildingBucket {
        bucket_id: bucket_id.to_string(),
        suggested_label: Some(label.to_string()),
        centroid: None,
        photo_ids: session.photo_ids.clone(),
        sessions: vec![session],
        units: Vec::new(),
    }
}
