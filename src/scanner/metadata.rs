use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// OffsetTimeOriginal (EXIF 2.31).
const OFFSET_TIME_ORIGINAL: exif::Tag = exif::Tag(exif::Context::Exif, 0x9011);

/// GPSHPositioningError: horizontal accuracy in metres.
const GPS_H_POSITIONING_ERROR: exif::Tag = exif::Tag(exif::Context::Gps, 0x001f);

/// What the clustering input needs from a photo's EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub taken_at: Option<DateTime<Utc>>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_accuracy_m: Option<f64>,
}

impl CaptureMetadata {
    pub fn has_gps(&self) -> bool {
        self.gps_latitude.is_some() && self.gps_longitude.is_some()
    }
}

/// Read capture time and GPS from `path`. A file without EXIF yields empty
/// metadata; only I/O failures are errors.
pub fn extract_capture(path: &Path) -> Result<CaptureMetadata> {
    let mut metadata = CaptureMetadata::default();

    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(path = %path.display(), "No EXIF data: {}", e);
            return Ok(metadata);
        }
    };

    // Date taken
    if let Some(datetime) = ascii_field(&exif, exif::Tag::DateTimeOriginal) {
        let offset = ascii_field(&exif, OFFSET_TIME_ORIGINAL);
        metadata.taken_at = parse_exif_datetime(&datetime, offset.as_deref());
    }

    // GPS coordinates
    if let (Some(lat_field), Some(lat_ref), Some(lon_field), Some(lon_ref)) = (
        exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY),
    ) {
        if let (exif::Value::Rational(lat_vals), exif::Value::Rational(lon_vals)) =
            (&lat_field.value, &lon_field.value)
        {
            let lat = dms_values(lat_vals);
            let lon = dms_values(lon_vals);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                let lat_ref_str = lat_ref.display_value().to_string();
                let lon_ref_str = lon_ref.display_value().to_string();
                metadata.gps_latitude = Some(signed_coordinate(lat, &lat_ref_str));
                metadata.gps_longitude = Some(signed_coordinate(lon, &lon_ref_str));
            }
        }
    }

    // Horizontal accuracy
    if let Some(field) = exif.get_field(GPS_H_POSITIONING_ERROR, exif::In::PRIMARY) {
        if let exif::Value::Rational(ref v) = field.value {
            metadata.gps_accuracy_m = v.first().and_then(|r| ratio(r.num, r.denom));
        }
    }

    Ok(metadata)
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref vec) => vec
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(|s| s.trim_matches(char::from(0)).trim().to_string()),
        _ => None,
    }
}

fn ratio(num: u32, denom: u32) -> Option<f64> {
    if denom == 0 {
        None
    } else {
        Some(num as f64 / denom as f64)
    }
}

fn dms_values(values: &[exif::Rational]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    Some(dms_to_decimal(
        ratio(values[0].num, values[0].denom)?,
        ratio(values[1].num, values[1].denom)?,
        ratio(values[2].num, values[2].denom)?,
    ))
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

fn signed_coordinate(value: f64, reference: &str) -> f64 {
    if reference.contains('S') || reference.contains('W') {
        -value
    } else {
        value
    }
}

/// EXIF `DateTimeOriginal` ("2023:08:14 16:02:11") as UTC. With an
/// `OffsetTimeOriginal` ("-07:00") the local time is shifted; without one
/// the camera clock is taken to be UTC.
pub fn parse_exif_datetime(datetime: &str, offset: Option<&str>) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(datetime.trim(), EXIF_DATETIME_FORMAT).ok()?;

    let offset = offset.and_then(|o| {
        DateTime::<FixedOffset>::parse_from_str(
            &format!("2000:01:01 00:00:00 {}", o.trim()),
            "%Y:%m:%d %H:%M:%S %:z",
        )
        .ok()
        .map(|d| *d.offset())
    });

    match offset {
        Some(offset) => naive
            .and_local_timezone(offset)
            .single()
            .map(|d| d.with_timezone(&Utc)),
        None => Some(naive.and_utc()),
    }
}
