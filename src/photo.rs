//! Input records and ingestion.
//!
//! Wire records arrive with optional, loosely-typed fields. Ingestion decides
//! once whether a photo is usable and whether it is located, so the
//! clustering stages never re-check `lat`/`lng`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cluster::geo::GeoPoint;
use crate::error::PhotoError;

/// A photo as supplied by the caller. Only `photo_id` and `taken_at_utc` are
/// required; both default to empty so that one malformed element is rejected
/// on its own instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescuePhoto {
    #[serde(default)]
    pub photo_id: String,

    #[serde(default)]
    pub taken_at_utc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    Located {
        point: GeoPoint,
        accuracy_m: Option<f64>,
    },
    Unlocated,
}

/// A validated photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: String,
    pub taken_at: DateTime<Utc>,
    pub location: Location,
}

/// A validated photo with usable coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedPhoto {
    pub id: String,
    pub taken_at: DateTime<Utc>,
    pub point: GeoPoint,
    pub accuracy_m: Option<f64>,
}

/// A record excluded from clustering, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedPhoto {
    pub photo_id: String,
    pub reason: String,
}

/// Result of ingesting a batch: every record lands in exactly one list.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub located: Vec<LocatedPhoto>,
    pub unlocated_ids: Vec<String>,
    pub rejected: Vec<RejectedPhoto>,
}

impl Photo {
    pub fn from_record(record: &RescuePhoto) -> Result<Self, PhotoError> {
        if record.photo_id.trim().is_empty() {
            return Err(PhotoError::MissingId);
        }
        let taken_at = parse_timestamp(&record.taken_at_utc)?;
        let location = parse_location(record.lat, record.lng, record.accuracy_m)?;

        Ok(Self {
            id: record.photo_id.clone(),
            taken_at,
            location,
        })
    }

    pub fn into_located(self) -> Result<LocatedPhoto, Photo> {
        match self.location {
            Location::Located { point, accuracy_m } => Ok(LocatedPhoto {
                id: self.id,
                taken_at: self.taken_at,
                point,
                accuracy_m,
            }),
            Location::Unlocated => Err(self),
        }
    }
}

fn parse_location(
    lat: Option<f64>,
    lng: Option<f64>,
    accuracy_m: Option<f64>,
) -> Result<Location, PhotoError> {
    let (lat, lng) = match (lat, lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        // Half a coordinate is no coordinate.
        _ => return Ok(Location::Unlocated),
    };

    if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
        return Err(PhotoError::CoordinateOutOfRange { lat, lng });
    }

    // (0, 0) is what devices write when they have no fix.
    if lat == 0.0 && lng == 0.0 {
        return Ok(Location::Unlocated);
    }

    if let Some(accuracy) = accuracy_m {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(PhotoError::InvalidAccuracy(accuracy));
        }
    }

    Ok(Location::Located {
        point: GeoPoint::new(lat, lng),
        accuracy_m,
    })
}

/// Parse a capture timestamp. RFC 3339 is preferred; naive date-times and
/// bare dates are accepted and read as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PhotoError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PhotoError::MissingTimestamp);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(PhotoError::InvalidTimestamp(value.to_string()))
}

/// Validate a batch and split it into located, unlocated and rejected photos.
///
/// Input order is preserved within each list. The first record with a given
/// id claims it, valid or not; later duplicates are rejected so that no id
/// can be placed twice.
pub fn ingest(records: &[RescuePhoto]) -> Ingested {
    let mut ingested = Ingested::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());

    for record in records {
        let result = if seen.insert(record.photo_id.as_str()) {
            Photo::from_record(record)
        } else {
            Err(PhotoError::DuplicateId)
        };

        match result {
            Ok(photo) => match photo.into_located() {
                Ok(located) => ingested.located.push(located),
                Err(unlocated) => ingested.unlocated_ids.push(unlocated.id),
            },
            Err(e) => {
                tracing::warn!(photo_id = %record.photo_id, reason = %e, "Rejected photo record");
                ingested.rejected.push(RejectedPhoto {
                    photo_id: record.photo_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        located = ingested.located.len(),
        unlocated = ingested.unlocated_ids.len(),
        rejected = ingested.rejected.len(),
        "Ingested photo batch"
    );

    ingested
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, lat: Option<f64>, lng: Option<f64>) -> RescuePhoto {
        RescuePhoto {
            photo_id: id.to_string(),
            taken_at_utc: "2024-03-15T09:30:00Z".to_string(),
            lat,
            lng,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-15T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15T02:30:00-07:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15T09:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-15 09:30:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-03-15").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert_eq!(parse_timestamp("  "), Err(PhotoError::MissingTimestamp));
        assert!(matches!(
            parse_timestamp("last tuesday"),
            Err(PhotoError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_half_coordinate_is_unlocated() {
        let photo = Photo::from_record(&record("a", Some(49.2), None)).unwrap();
        assert_eq!(photo.location, Location::Unlocated);

        let photo = Photo::from_record(&record("b", None, Some(-123.1))).unwrap();
        assert_eq!(photo.location, Location::Unlocated);
    }

    #[test]
    fn test_null_island_is_unlocated() {
        let photo = Photo::from_record(&record("a", Some(0.0), Some(0.0))).unwrap();
        assert_eq!(photo.location, Location::Unlocated);
    }

    #[test]
    fn test_out_of_range_coordinate_is_rejected() {
        assert!(matches!(
            Photo::from_record(&record("a", Some(91.0), Some(10.0))),
            Err(PhotoError::CoordinateOutOfRange { .. })
        ));
        assert!(matches!(
            Photo::from_record(&record("a", Some(f64::NAN), Some(10.0))),
            Err(PhotoError::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_ingest_partitions_every_record_once() {
        let mut bad_time = record("bad-time", Some(49.2), Some(-123.1));
        bad_time.taken_at_utc = "not a date".to_string();

        let records = vec![
            record("located", Some(49.2), Some(-123.1)),
            record("unlocated", None, None),
            record("", Some(49.2), Some(-123.1)),
            bad_time,
            record("located", Some(49.3), Some(-123.2)),
        ];

        let ingested = ingest(&records);
        assert_eq!(ingested.located.len(), 1);
        assert_eq!(ingested.located[0].id, "located");
        assert_eq!(ingested.unlocated_ids, vec!["unlocated".to_string()]);
        assert_eq!(ingested.rejected.len(), 3);
        assert_eq!(ingested.rejected[2].reason, PhotoError::DuplicateId.to_string());
    }

    #[test]
    fn test_rejected_record_still_claims_its_id() {
        let mut broken = record("x", Some(49.2), Some(-123.1));
        broken.taken_at_utc = "not a date".to_string();
        let records = vec![broken, record("x", Some(49.2), Some(-123.1))];

        let ingested = ingest(&records);
        assert!(ingested.located.is_empty());
        assert!(ingested.unlocated_ids.is_empty());
        assert_eq!(ingested.rejected.len(), 2);
        assert!(matches!(
            parse_timestamp(&records[0].taken_at_utc),
            Err(PhotoError::InvalidTimestamp(_))
        ));
        assert_eq!(ingested.rejected[1].reason, PhotoError::DuplicateId.to_string());
    }

    #[test]
    fn test_deserialize_camel_case_record() {
        let json = r#"{"photoId":"p1","takenAtUtc":"2021-07-15T09:00:00Z","lat":49.2,"lng":-122.9,"accuracyM":12.5,"fileName":"IMG_1.jpg","fileSize":2048}"#;
        let photo: RescuePhoto = serde_json::from_str(json).unwrap();
        assert_eq!(photo.photo_id, "p1");
        assert_eq!(photo.accuracy_m, Some(12.5));
        assert_eq!(photo.file_size, Some(2048));

        let missing: RescuePhoto = serde_json::from_str(r#"{"lat":1.0}"#).unwrap();
        assert!(missing.photo_id.is_empty());
        assert_eq!(Photo::from_record(&missing), Err(PhotoError::MissingId));
    }
}
