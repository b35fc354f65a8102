//! Minority-unit heuristic for multi-unit buildings.
//!
//! Within one visit, a worker may step into another unit for a short side
//! job. That shows up as a small run of photos separated in time from the
//! rest of the visit. The heuristic proposes such runs as separate units and
//! never splits anything when the picture is ambiguous.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::session::{split_sessions, DateRange};
use crate::config::ClusterConfig;
use crate::photo::LocatedPhoto;

/// Unit id given to the majority of a subdivided visit.
pub const PRIMARY_UNIT: &str = "A";

/// A proposed unit within one visit. A suggestion only; the caller's
/// reviewer decides the actual assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSuggestion {
    pub unit_id: String,
    pub primary: bool,
    pub photo_ids: Vec<String>,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Copy)]
pub struct UnitPolicy {
    pub unit_gap: Duration,
    pub max_minority_ratio: f64,
    pub min_unit_photos: usize,
    pub min_session_size: usize,
}

impl From<&ClusterConfig> for UnitPolicy {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            unit_gap: config.unit_gap(),
            max_minority_ratio: config.max_minority_ratio,
            min_unit_photos: config.min_unit_photos,
            min_session_size: config.min_session_size,
        }
    }
}

/// Label for the n-th unit: A, B, ..., Z, AA, AB, ...
pub fn unit_label(index: usize) -> String {
    let mut n = index;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Propose units for one visit, or `None` when the visit should stay whole.
///
/// Fires only when:
/// - the visit has at least `min_session_size` photos,
/// - it breaks into two or more runs at gaps longer than `unit_gap`,
/// - at least one run is a minority candidate (share at most
///   `max_minority_ratio` and at least `min_unit_photos` photos),
/// - all candidates together stay within `max_minority_ratio`.
///
/// The majority keeps [`PRIMARY_UNIT`]; candidates are labelled B, C, ... in
/// time order.
pub fn detect_units(visit: &[&LocatedPhoto], policy: &UnitPolicy) -> Option<Vec<UnitSuggestion>> {
    let total = visit.len();
    if total < policy.min_session_size.max(2) {
        return None;
    }

    let runs = split_sessions(visit.to_vec(), policy.unit_gap);
    if runs.len() < 2 {
        return None;
    }

    let max_share = policy.max_minority_ratio * total as f64;
    let is_minority = |run: &[&LocatedPhoto]| {
        run.len() as f64 <= max_share && run.len() >= policy.min_unit_photos
    };

    let minority_total: usize = runs
        .iter()
        .filter(|r| is_minority(r.as_slice()))
        .map(Vec::len)
        .sum();
    if minority_total == 0 || minority_total == total {
        return None;
    }
    if minority_total as f64 > max_share {
        tracing::debug!(
            total,
            minority_total,
            "Visit has too many candidate units, leaving it whole"
        );
        return None;
    }

    let mut majority: Vec<&LocatedPhoto> = Vec::with_capacity(total - minority_total);
    let mut minorities: Vec<Vec<&LocatedPhoto>> = Vec::new();
    for run in runs {
        if is_minority(run.as_slice()) {
            minorities.push(run);
        } else {
            majority.extend(run);
        }
    }

    let mut units = Vec::with_capacity(minorities.len() + 1);
    units.push(suggestion(PRIMARY_UNIT.to_string(), true, &majority)?);
    for (i, run) in minorities.iter().enumerate() {
        units.push(suggestion(unit_label(i + 1), false, run)?);
    }

    Some(units)
}

fn suggestion(unit_id: String, primary: bool, photos: &[&LocatedPhoto]) -> Option<UnitSuggestion> {
    Some(UnitSuggestion {
        unit_id,
        primary,
        photo_ids: photos.iter().map(|p| p.id.clone()).collect(),
        date_range: DateRange::of(photos)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::geo::GeoPoint;
    use chrono::{TimeZone, Utc};

    /// Photos at `minutes` offsets from 09:00.
    fn visit(minutes: &[i64]) -> Vec<LocatedPhoto> {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        minutes
            .iter()
            .enumerate()
            .map(|(i, m)| LocatedPhoto {
                id: format!("p{:03}", i),
                taken_at: start + Duration::minutes(*m),
                point: GeoPoint::new(49.2276, -122.9931),
                accuracy_m: None,
            })
            .collect()
    }

    fn steady(count: usize, from: i64) -> Vec<i64> {
        (0..count as i64).map(|i| from + i).collect()
    }

    fn policy() -> UnitPolicy {
        UnitPolicy::from(&ClusterConfig::default())
    }

    fn detect(photos: &[LocatedPhoto]) -> Option<Vec<UnitSuggestion>> {
        let refs: Vec<&LocatedPhoto> = photos.iter().collect();
        detect_units(&refs, &policy())
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(unit_label(0), "A");
        assert_eq!(unit_label(1), "B");
        assert_eq!(unit_label(25), "Z");
        assert_eq!(unit_label(26), "AA");
        assert_eq!(unit_label(27), "AB");
    }

    #[test]
    fn test_continuous_visit_is_not_split() {
        assert_eq!(detect(&visit(&steady(40, 0))), None);
    }

    #[test]
    fn test_trailing_minority_run_is_flagged() {
        let mut minutes = steady(82, 0);
        minutes.extend(steady(8, 82 + 30));
        let units = detect(&visit(&minutes)).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_id, "A");
        assert!(units[0].primary);
        assert_eq!(units[0].photo_ids.len(), 82);
        assert_eq!(units[1].unit_id, "B");
        assert!(!units[1].primary);
        assert_eq!(units[1].photo_ids.len(), 8);
    }

    #[test]
    fn test_minority_in_the_middle_keeps_majority_together() {
        let mut minutes = steady(40, 0);
        minutes.extend(steady(6, 60));
        minutes.extend(steady(40, 90));
        let units = detect(&visit(&minutes)).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].photo_ids.len(), 80);
        assert_eq!(units[1].photo_ids.len(), 6);
        assert_eq!(units[0].date_range.start, visit(&minutes)[0].taken_at);
    }

    #[test]
    fn test_two_minorities_get_distinct_labels() {
        let mut minutes = steady(60, 0);
        minutes.extend(steady(5, 80));
        minutes.extend(steady(5, 120));
        let units = detect(&visit(&minutes)).unwrap();

        let labels: Vec<&str> = units.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_balanced_runs_are_ambiguous() {
        let mut minutes = steady(20, 0);
        minutes.extend(steady(20, 60));
        assert_eq!(detect(&visit(&minutes)), None);
    }

    #[test]
    fn test_many_small_runs_are_ambiguous() {
        // Ten runs of four photos: each alone looks like a minority, together they are everything.
        let minutes: Vec<i64> = (0..10).flat_map(|r| steady(4, r * 30)).collect();
        assert_eq!(detect(&visit(&minutes)), None);
    }

    #[test]
    fn test_too_many_minority_photos_is_ambiguous() {
        // Three runs of 10 next to a run of 50: each is 12.5%, together 37.5%.
        let mut minutes = steady(50, 0);
        minutes.extend(steady(10, 80));
        minutes.extend(steady(10, 120));
        minutes.extend(steady(10, 160));
        assert_eq!(detect(&visit(&minutes)), None);
    }

    #[test]
    fn test_tiny_straggler_is_absorbed() {
        let mut minutes = steady(30, 0);
        minutes.extend(steady(2, 60));
        assert_eq!(detect(&visit(&minutes)), None);
    }

    #[test]
    fn test_small_visit_is_left_alone() {
        assert_eq!(detect(&visit(&[0, 1, 2, 60])), None);
    }
}
