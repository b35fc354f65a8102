//! Geohash encoding used as the flat-mode bucket key.
//!
//! A geohash interleaves longitude and latitude bisection bits and emits them
//! five at a time in base 32. Identical coordinates always produce identical
//! keys; nearby coordinates share a key unless a cell boundary falls between
//! them, which is the accepted cost of linear-time bucketing.

use super::geo::METERS_PER_DEGREE;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported hash; beyond this an f64 has no more bits to give.
pub const MAX_PRECISION: u8 = 12;

/// Encode `lat`/`lng` to a geohash of `precision` characters (clamped to 1..=12).
pub fn encode(lat: f64, lng: f64, precision: u8) -> String {
    let precision = precision.clamp(1, MAX_PRECISION) as usize;

    let (mut min_lat, mut max_lat) = (-90.0_f64, 90.0_f64);
    let (mut min_lng, mut max_lng) = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut ch = 0usize;
    let mut bit = 0;
    let mut is_lng = true;

    while hash.len() < precision {
        if is_lng {
            let mid = (min_lng + max_lng) / 2.0;
            if lng >= mid {
                ch = (ch << 1) | 1;
                min_lng = mid;
            } else {
                ch <<= 1;
                max_lng = mid;
            }
        } else {
            let mid = (min_lat + max_lat) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                min_lat = mid;
            } else {
                ch <<= 1;
                max_lat = mid;
            }
        }

        is_lng = !is_lng;
        bit += 1;
        if bit == 5 {
            hash.push(BASE32[ch] as char);
            bit = 0;
            ch = 0;
        }
    }

    hash
}

/// Cell height and width in meters at the equator for a given precision.
/// Cells narrow east-west with the cosine of latitude.
pub fn cell_size_m(precision: u8) -> (f64, f64) {
    let bits = i32::from(precision.clamp(1, MAX_PRECISION)) * 5;
    let lng_bits = (bits + 1) / 2;
    let lat_bits = bits / 2;

    let lat_deg = 180.0 / 2f64.powi(lat_bits);
    let lng_deg = 360.0 / 2f64.powi(lng_bits);

    (lat_deg * METERS_PER_DEGREE, lng_deg * METERS_PER_DEGREE)
}
