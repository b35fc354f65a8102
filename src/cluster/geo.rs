use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude on a sphere of `EARTH_RADIUS_M`.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        haversine_m(*self, *other)
    }
}

/// Great-circle distance in meters (haversine).
///
/// NaN coordinates propagate to a NaN distance; callers filter them first.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let sin_d_lat = (d_lat / 2.0).sin();
    let sin_d_lng = (d_lng / 2.0).sin();
    let h = sin_d_lat * sin_d_lat + lat1.cos() * lat2.cos() * sin_d_lng * sin_d_lng;

    2.0 * EARTH_RADIUS_M * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Arithmetic mean of the points, or `None` when there are none.
pub fn centroid<I>(points: I) -> Option<GeoPoint>
where
    I: IntoIterator<Item = GeoPoint>,
{
    let (mut sum_lat, mut sum_lng, mut n) = (0.0, 0.0, 0usize);
    for p in points {
        sum_lat += p.lat;
        sum_lng += p.lng;
        n += 1;
    }

    if n == 0 {
        return None;
    }
    Some(GeoPoint::new(sum_lat / n as f64, sum_lng / n as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint::new(49.2276, -122.9931);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = GeoPoint::new(0.0, 10.0);
        let b = GeoPoint::new(1.0, 10.0);
        assert!((haversine_m(a, b) - METERS_PER_DEGREE).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_known_city_distance() {
        // Burnaby (Kingsway) to downtown Vancouver, roughly 11.4 km.
        let burnaby = GeoPoint::new(49.2276, -122.9931);
        let downtown = GeoPoint::new(49.2878, -123.1208);
        let d = haversine_m(burnaby, downtown);
        assert!((d - 11_432.0).abs() < 50.0, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = GeoPoint::new(49.1666, -123.1369);
        let b = GeoPoint::new(49.1839, -122.8478);
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_nan_propagates() {
        let a = GeoPoint::new(f64::NAN, 0.0);
        assert!(haversine_m(a, GeoPoint::new(1.0, 1.0)).is_nan());
    }

    #[test]
    fn test_centroid() {
        assert_eq!(centroid(Vec::new()), None);

        let c = centroid(vec![GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0)]).unwrap();
        assert_eq!(c, GeoPoint::new(2.0, 3.0));
    }
}
