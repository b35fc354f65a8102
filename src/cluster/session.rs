use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::photo::LocatedPhoto;

/// Anything the splitter can order in time.
pub trait Timestamped {
    fn taken_at(&self) -> DateTime<Utc>;
    fn photo_id(&self) -> &str;
}

impl Timestamped for LocatedPhoto {
    fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    fn photo_id(&self) -> &str {
        &self.id
    }
}

impl<T: Timestamped + ?Sized> Timestamped for &T {
    fn taken_at(&self) -> DateTime<Utc> {
        (**self).taken_at()
    }

    fn photo_id(&self) -> &str {
        (**self).photo_id()
    }
}

/// Inclusive capture-time range of a set of photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Range covering `items`, or `None` when empty.
    pub fn of<T: Timestamped>(items: &[T]) -> Option<Self> {
        let mut times = items.iter().map(Timestamped::taken_at);
        let first = times.next()?;
        let (start, end) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn span_minutes(&self) -> f64 {
        self.span().num_seconds() as f64 / 60.0
    }
}

/// Sort by capture time (photo id breaks ties) and split wherever two
/// consecutive photos are more than `max_gap` apart. A gap exactly equal to
/// `max_gap` stays in the same session.
pub fn split_sessions<T: Timestamped>(mut items: Vec<T>, max_gap: Duration) -> Vec<Vec<T>> {
    items.sort_by(|a, b| {
        a.taken_at()
            .cmp(&b.taken_at())
            .then_with(|| a.photo_id().cmp(b.photo_id()))
    });

    let mut sessions: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();

    for item in items {
        if let Some(prev) = current.last() {
            if item.taken_at() - prev.taken_at() > max_gap {
                sessions.push(std::mem::take(&mut current));
            }
        }
        current.push(item);
    }

    if !current.is_empty() {
        sessions.push(current);
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::geo::GeoPoint;
    use chrono::TimeZone;

    fn photo(id: &str, minutes: i64) -> LocatedPhoto {
        LocatedPhoto {
            id: id.to_string(),
            taken_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes),
            point: GeoPoint::new(49.0, -123.0),
            accuracy_m: None,
        }
    }

    fn ids(session: &[LocatedPhoto]) -> Vec<&str> {
        session.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_empty_input_has_no_sessions() {
        let sessions = split_sessions(Vec::<LocatedPhoto>::new(), Duration::minutes(10));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_single_photo_is_one_session() {
        let sessions = split_sessions(vec![photo("a", 0)], Duration::minutes(10));
        assert_eq!(sessions.len(), 1);
        assert_eq!(ids(&sessions[0]), vec!["a"]);
    }

    #[test]
    fn test_splits_on_gap_and_sorts() {
        let sessions = split_sessions(
            vec![photo("c", 200), photo("a", 0), photo("b", 5), photo("d", 204)],
            Duration::minutes(60),
        );
        assert_eq!(sessions.len(), 2);
        assert_eq!(ids(&sessions[0]), vec!["a", "b"]);
        assert_eq!(ids(&sessions[1]), vec!["c", "d"]);
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        let sessions = split_sessions(vec![photo("a", 0), photo("b", 60)], Duration::minutes(60));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_identical_timestamps_stay_together() {
        let sessions = split_sessions(
            vec![photo("b", 30), photo("a", 30), photo("c", 30)],
            Duration::minutes(1),
        );
        assert_eq!(sessions.len(), 1);
        assert_eq!(ids(&sessions[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_splits_on_references() {
        let photos = vec![photo("a", 0), photo("b", 500)];
        let refs: Vec<&LocatedPhoto> = photos.iter().collect();
        let sessions = split_sessions(refs, Duration::minutes(60));
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_date_range() {
        let photos = vec![photo("a", 10), photo("b", 0), photo("c", 45)];
        let range = DateRange::of(&photos).unwrap();
        assert_eq!(range.start, photos[1].taken_at);
        assert_eq!(range.end, photos[2].taken_at);
        assert_eq!(range.span_minutes(), 45.0);
        assert!(photos.iter().all(|p| range.contains(p.taken_at)));
        assert_eq!(DateRange::of(&Vec::<LocatedPhoto>::new()), None);
    }
}
