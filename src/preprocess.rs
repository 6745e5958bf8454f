//! Input cleaning: validate coordinates, dedupe by id and by proximity,
//! merge attributes (spec §4.1).

use tracing::warn;

use crate::error::{TripError, TripResult};
use crate::geo::haversine_m;
use crate::model::Waypoint;

/// Waypoints within this distance (meters) of an already-accepted waypoint
/// are merged rather than kept distinct (spec §3 invariant, §4.1 rule 3).
const MERGE_RADIUS_M: f64 = 10.0;

/// Cleans a raw waypoint list per spec §4.1, returning the list in original
/// order minus rejects and merges. Fails with [`TripError::InvalidInput`]
/// when the result is empty.
///
/// Idempotent: `preprocess(preprocess(x)) == preprocess(x)` (spec §8) because
/// every surviving waypoint is already ≥`MERGE_RADIUS_M` apart and has a
/// unique id, so a second pass rejects nothing and merges nothing.
pub fn preprocess(raw: &[Waypoint]) -> TripResult<Vec<Waypoint>> {
    let mut accepted: Vec<Waypoint> = Vec::with_capacity(raw.len());
    let mut seen_ids = std::collections::HashSet::new();

    for candidate in raw {
        if candidate.id.is_empty() || !candidate.coord.is_valid() {
            warn!(id = %candidate.id, "preprocess: rejecting waypoint with invalid id/coord");
            continue;
        }
        if !seen_ids.insert(candidate.id.clone()) {
            warn!(id = %candidate.id, "preprocess: rejecting duplicate id");
            continue;
        }

        if let Some(existing) = accepted
            .iter_mut()
            .find(|existing| haversine_m(existing.coord, candidate.coord) < MERGE_RADIUS_M)
        {
            merge_into(existing, candidate);
        } else {
            accepted.push(candidate.clone());
        }
    }

    if accepted.is_empty() {
        return Err(TripError::InvalidInput(
            "no valid waypoints remained after preprocessing".into(),
        ));
    }

    Ok(accepted)
}

fn merge_into(existing: &mut Waypoint, incoming: &Waypoint) {
    if existing.name != incoming.name {
        existing.name = format!("{} / {}", existing.name, incoming.name);
    }
    existing.is_fixed = existing.is_fixed || incoming.is_fixed;
    if existing.day_lock.is_none() {
        existing.day_lock = incoming.day_lock;
    }
    existing.importance = existing.importance.max(incoming.importance);
    existing.stay_minutes = existing.stay_minutes.max(incoming.stay_minutes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LatLng;

    fn wp(id: &str, lat: f64, lng: f64) -> Waypoint {
        Waypoint {
            id: id.into(),
            name: id.into(),
            coord: LatLng::new(lat, lng),
            is_fixed: false,
            fixed_date: None,
            fixed_start_time: None,
            day_lock: None,
            importance: 1.0,
            stay_minutes: 60,
        }
    }

    #[test]
    fn rejects_invalid_coords() {
        let mut a = wp("a", 91.0, 0.0);
        a.id = "a".into();
        let result = preprocess(&[a]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let out = preprocess(&[wp("a", 1.0, 1.0), wp("a", 2.0, 2.0)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].coord.lat, 1.0);
    }

    #[test]
    fn merges_close_points() {
        let mut a = wp("a", 37.5, 127.0);
        a.importance = 1.0;
        a.stay_minutes = 30;
        let mut b = wp("b", 37.5, 127.0);
        b.importance = 3.0;
        b.stay_minutes = 90;
        b.is_fixed = true;

        let out = preprocess(&[a, b]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "a / b");
        assert_eq!(out[0].importance, 3.0);
        assert_eq!(out[0].stay_minutes, 90);
        assert!(out[0].is_fixed);
    }

    #[test]
    fn keeps_far_points_distinct() {
        let out = preprocess(&[wp("a", 37.5, 127.0), wp("b", 37.6, 127.1)]).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_result_is_invalid_input() {
        let out = preprocess(&[wp("a", 91.0, 0.0)]);
        assert!(matches!(out, Err(TripError::InvalidInput(_))));
    }

    #[test]
    fn idempotent() {
        let input = vec![wp("a", 37.5, 127.0), wp("b", 37.5, 127.0), wp("c", 40.0, 140.0)];
        let once = preprocess(&input).unwrap();
        let twice = preprocess(&once).unwrap();
        assert_eq!(once.len(), twice.len());
        assert_eq!(once, twice);
    }
}
