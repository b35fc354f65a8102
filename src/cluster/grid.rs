//! Radius index for building-mode bucketing.
//!
//! Each bucket is anchored at a reference point (its seed). Seeds live in a
//! lat/lng grid: rows are one radius tall, and the column width of each row
//! is widened by the latitude so a column always spans at least one radius
//! east-west. A lookup therefore only inspects the neighbouring rows and a
//! few columns in each, keeping bucketing linear in the number of photos.

use std::collections::HashMap;

use super::geo::{haversine_m, GeoPoint, METERS_PER_DEGREE};

/// Columns inspected on each side; absorbs the cosine drift between rows.
const COLUMN_REACH: i64 = 2;

/// Latitude beyond which column widths stop shrinking.
const MAX_GRID_LAT: f64 = 89.0;

#[derive(Debug)]
pub struct BuildingIndex {
    radius_m: f64,
    lat_step: f64,
    seeds: Vec<GeoPoint>,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl BuildingIndex {
    pub fn new(radius_m: f64) -> Self {
        Self {
            radius_m,
            lat_step: radius_m / METERS_PER_DEGREE,
            seeds: Vec::new(),
            cells: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn seed(&self, bucket: usize) -> Option<GeoPoint> {
        self.seeds.get(bucket).copied()
    }

    /// Bucket index for `point`: the nearest seed within the radius, or a new
    /// bucket seeded at `point`. Ties go to the older bucket.
    pub fn assign(&mut self, point: GeoPoint) -> usize {
        if let Some(bucket) = self.nearest_within(point) {
            return bucket;
        }

        let bucket = self.seeds.len();
        self.seeds.push(point);
        let cell = self.cell_of(point);
        self.cells.entry(cell).or_default().push(bucket);
        bucket
    }

    /// Nearest seed no farther than the radius from `point`.
    pub fn nearest_within(&self, point: GeoPoint) -> Option<usize> {
        let row = self.row_of(point.lat);
        let mut best: Option<(usize, f64)> = None;

        for r in row.saturating_sub(1)..=row.saturating_add(1) {
            let col = self.col_of(point.lng, r);
            for c in col.saturating_sub(COLUMN_REACH)..=col.saturating_add(COLUMN_REACH) {
                let Some(candidates) = self.cells.get(&(r, c)) else {
                    continue;
                };
                for &bucket in candidates {
                    let d = haversine_m(point, self.seeds[bucket]);
                    if d > self.radius_m {
                        continue;
                    }
                    let closer = match best {
                        None => true,
                        Some((b, best_d)) => d < best_d || (d == best_d && bucket < b),
                    };
                    if closer {
                        best = Some((bucket, d));
                    }
                }
            }
        }

        best.map(|(bucket, _)| bucket)
    }

    fn cell_of(&self, point: GeoPoint) -> (i64, i64) {
        let row = self.row_of(point.lat);
        (row, self.col_of(point.lng, row))
    }

    fn row_of(&self, lat: f64) -> i64 {
        (lat / self.lat_step).floor() as i64
    }

    fn col_of(&self, lng: f64, row: i64) -> i64 {
        (lng / self.lng_step(row)).floor() as i64
    }

    /// Column width in degrees for a row, sized at the row's poleward edge
    /// where a degree of longitude is shortest.
    fn lng_step(&self, row: i64) -> f64 {
        let south = row as f64 * self.lat_step;
        let north = south + self.lat_step;
        let edge = south.abs().max(north.abs()).min(MAX_GRID_LAT);
        self.lat_step / edge.to_radians().cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(origin: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
        GeoPoint::new(
            origin.lat + north_m / METERS_PER_DEGREE,
            origin.lng + east_m / (METERS_PER_DEGREE * origin.lat.to_radians().cos()),
        )
    }

    #[test]
    fn test_points_within_radius_share_bucket() {
        let origin = GeoPoint::new(49.2276, -122.9931);
        let mut index = BuildingIndex::new(250.0);

        let a = index.assign(origin);
        let b = index.assign(offset(origin, 120.0, -150.0));
        let c = index.assign(offset(origin, -200.0, 100.0));

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_point_outside_radius_starts_new_bucket() {
        let origin = GeoPoint::new(49.2276, -122.9931);
        let mut index = BuildingIndex::new(250.0);

        let a = index.assign(origin);
        let b = index.assign(offset(origin, 0.0, 400.0));

        assert_ne!(a, b);
        assert_eq!(index.seed(b), Some(offset(origin, 0.0, 400.0)));
    }

    #[test]
    fn test_nearest_seed_wins() {
        let origin = GeoPoint::new(10.0, 20.0);
        let mut index = BuildingIndex::new(100.0);

        let west = index.assign(offset(origin, 0.0, -90.0));
        let east = index.assign(offset(origin, 0.0, 90.0));
        assert_ne!(west, east);

        assert_eq!(index.nearest_within(offset(origin, 0.0, 60.0)), Some(east));
        assert_eq!(index.nearest_within(offset(origin, 0.0, -60.0)), Some(west));
    }

    #[test]
    fn test_finds_seed_across_cell_boundaries() {
        // Every point within the radius finds the seed wherever the grid
        // lines happen to fall.
        let mut index = BuildingIndex::new(150.0);
        let seed = GeoPoint::new(60.000_01, 5.000_01);
        let bucket = index.assign(seed);

        for step in 0..36 {
            let angle = (step as f64 * 10.0).to_radians();
            let nearby = offset(seed, 149.0 * angle.cos(), 149.0 * angle.sin());
            assert!(haversine_m(seed, nearby) <= 150.0);
            assert_eq!(index.nearest_within(nearby), Some(bucket), "angle step {}", step);
        }
    }

    #[test]
    fn test_every_member_within_radius_of_seed() {
        let origin = GeoPoint::new(-33.8688, 151.2093);
        let mut index = BuildingIndex::new(80.0);
        let mut members = Vec::new();

        for i in 0..200 {
            let north = ((i * 37) % 400) as f64 - 200.0;
            let east = ((i * 53) % 400) as f64 - 200.0;
            let p = offset(origin, north, east);
            members.push((index.assign(p), p));
        }

        for (bucket, p) in members {
            let seed = index.seed(bucket).unwrap();
            assert!(haversine_m(seed, p) <= 80.0);
        }
    }

    #[test]
    fn test_degenerate_radius_does_not_overflow() {
        let mut index = BuildingIndex::new(1e-300);
        let point = GeoPoint::new(49.2276, -122.9931);

        let a = index.assign(point);
        assert_eq!(index.assign(point), a);
        assert_ne!(index.assign(GeoPoint::new(49.2277, -122.9931)), a);
        assert_eq!(index.len(), 2);
    }
}
