//! Helpers for the human review step.
//!
//! The caller owns the per-photo unit assignment (photo id -> unit id; a
//! missing entry means unassigned). These functions only derive state from
//! it and never change anything.

use serde::Serialize;
use std::collections::HashMap;

/// Majority share a session needs before its minority photos are auto-picked.
pub const MAJORITY_THRESHOLD: f64 = 0.7;

/// Per-photo unit assignments owned by the caller.
pub type PhotoAssignments = HashMap<String, String>;

/// Unit counts for one session, in the order each unit is first seen.
/// `None` counts unassigned photos.
pub fn session_distribution<'a>(
    photo_ids: &'a [String],
    assignments: &'a PhotoAssignments,
) -> Vec<(Option<&'a str>, usize)> {
    let mut counts: Vec<(Option<&str>, usize)> = Vec::new();
    for id in photo_ids {
        let unit = assignments.get(id).map(String::as_str);
        match counts.iter_mut().find(|(u, _)| *u == unit) {
            Some((_, count)) => *count += 1,
            None => counts.push((unit, 1)),
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Majority<'a> {
    pub unit: Option<&'a str>,
    pub count: usize,
    pub ratio: f64,
}

/// Most common unit in a session. Ties go to the unit seen first.
pub fn majority<'a>(photo_ids: &'a [String], assignments: &'a PhotoAssignments) -> Majority<'a> {
    let mut best = Majority {
        unit: None,
        count: 0,
        ratio: 0.0,
    };
    for (unit, count) in session_distribution(photo_ids, assignments) {
        if count > best.count {
            best.unit = unit;
            best.count = count;
        }
    }
    best.ratio = best.count as f64 / photo_ids.len().max(1) as f64;
    best
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinorityPick<'a> {
    pub auto_pick: bool,
    /// Photos outside the majority unit, in session order.
    pub selected: Vec<&'a str>,
    pub majority_unit: Option<&'a str>,
    pub majority_ratio: f64,
}

/// Preselect the photos that disagree with a clear majority.
/// Nothing is picked when the majority holds less than [`MAJORITY_THRESHOLD`].
pub fn auto_pick_minority<'a>(
    photo_ids: &'a [String],
    assignments: &'a PhotoAssignments,
) -> MinorityPick<'a> {
    let m = majority(photo_ids, assignments);
    let selected = if m.ratio < MAJORITY_THRESHOLD {
        Vec::new()
    } else {
        outside_unit(photo_ids, assignments, m.unit).collect()
    };

    MinorityPick {
        auto_pick: m.ratio >= MAJORITY_THRESHOLD,
        selected,
        majority_unit: m.unit,
        majority_ratio: m.ratio,
    }
}

pub fn count_minority_photos(photo_ids: &[String], assignments: &PhotoAssignments) -> usize {
    let m = majority(photo_ids, assignments);
    if m.ratio < MAJORITY_THRESHOLD {
        return 0;
    }
    outside_unit(photo_ids, assignments, m.unit).count()
}

fn outside_unit<'a>(
    photo_ids: &'a [String],
    assignments: &'a PhotoAssignments,
    unit: Option<&'a str>,
) -> impl Iterator<Item = &'a str> + 'a {
    photo_ids
        .iter()
        .filter(move |id| assignments.get(*id).map(String::as_str) != unit)
        .map(String::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "unitId", rename_all = "lowercase")]
pub enum DisplayState {
    Assigned(String),
    Mixed,
    Unassigned,
}

pub fn session_display_state(photo_ids: &[String], assignments: &PhotoAssignments) -> DisplayState {
    let distribution = session_distribution(photo_ids, assignments);
    match distribution.as_slice() {
        [(Some(unit), _)] => DisplayState::Assigned(unit.to_string()),
        [] | [(None, _)] => DisplayState::Unassigned,
        _ => DisplayState::Mixed,
    }
}

/// Unit buttons with the sticky destination moved to the front.
pub fn order_unit_buttons(base: &[String], sticky: Option<&str>) -> Vec<String> {
    let Some(sticky) = sticky else {
        return base.to_vec();
    };
    std::iter::once(sticky.to_string())
        .chain(base.iter().filter(|u| u.as_str() != sticky).cloned())
        .collect()
}
