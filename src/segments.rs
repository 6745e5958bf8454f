//! Segment extraction: translate day-plans into the ordered list of
//! `(from,to)` coordinate-id pairs to route, including origin/lodging/
//! destination bookends and check-in detours (spec §4.6).

use tracing::warn;

use crate::model::{DayPlan, TripInput, WaypointMap, ACCOMMODATION_ID, DESTINATION_ID, ORIGIN_ID};
use crate::routing::RoutingRequest;

/// Minimum angular separation (degrees) for destination to count as
/// distinct from the last waypoint (spec §4.6 step 4).
const DESTINATION_DISTINCT_EPS: f64 = 1e-5;

/// Builds every routing request for the whole trip, in the order segment
/// costs must be returned (spec §8 "segment results are returned in the
/// same order as requests").
pub fn extract_segments(
    day_plans: &[DayPlan],
    input: &TripInput,
    waypoints: &WaypointMap,
) -> Vec<RoutingRequest> {
    let mut out = Vec::new();
    let last_day = day_plans.len().saturating_sub(1);

    for (day_idx, plan) in day_plans.iter().enumerate() {
        for (from_id, to_id) in day_id_pairs(day_idx, last_day, plan, input, day_plans, waypoints) {
            push_request(&mut out, &from_id, &to_id, input, waypoints);
        }
    }

    out
}

/// The ordered `(from_id, to_id)` chain routed for a single day, including
/// its own start/end bookends and any check-in detour — but none of the
/// *next* day's bookend (its `from_id` belongs to the previous day's last
/// waypoint when lodging is absent, so this chain is specific to `day_idx`
/// and must not be summed into a neighboring day's total; see
/// `reconcile::day_minutes`).
pub fn day_id_pairs(
    day_idx: usize,
    last_day: usize,
    plan: &DayPlan,
    input: &TripInput,
    day_plans: &[DayPlan],
    waypoints: &WaypointMap,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let start_id = start_id_for_day(day_idx, input, day_plans);
    let mut prev_id: Option<String> = None;

    if let Some(first) = plan.waypoint_order.first() {
        out.push((start_id, first.clone()));
        prev_id = Some(first.clone());
    }

    for (i, window) in plan.waypoint_order.windows(2).enumerate() {
        let (a, b) = (&window[0], &window[1]);
        // check_in_break_index == idx means the break falls between
        // waypoint_order[idx-1] ("lastAM") and waypoint_order[idx]
        // ("firstPM") — i.e. the window at position idx-1 (spec §4.5/§4.6).
        let crosses_break = plan.check_in_break_index == Some(i + 1);
        if crosses_break && input.lodging.is_some() {
            out.push((a.clone(), ACCOMMODATION_ID.to_string()));
            out.push((ACCOMMODATION_ID.to_string(), b.clone()));
        } else {
            out.push((a.clone(), b.clone()));
        }
        prev_id = Some(b.clone());
    }

    if let Some(last) = prev_id {
        if let Some(end_id) = end_id_for_day(day_idx, last_day, &last, input, waypoints) {
            out.push((last, end_id));
        }
    }

    out
}

fn start_id_for_day(day_idx: usize, input: &TripInput, day_plans: &[DayPlan]) -> String {
    if day_idx == 0 {
        return ORIGIN_ID.to_string();
    }
    if input.lodging.is_some() {
        return ACCOMMODATION_ID.to_string();
    }
    day_plans[day_idx - 1]
        .waypoint_order
        .last()
        .cloned()
        .unwrap_or_else(|| ORIGIN_ID.to_string())
}

fn end_id_for_day(
    day_idx: usize,
    last_day: usize,
    last_waypoint_id: &str,
    input: &TripInput,
    waypoints: &WaypointMap,
) -> Option<String> {
    if day_idx == last_day {
        if let Some(end) = input.end {
            let distinct = waypoints
                .get(last_waypoint_id)
                .map(|w| (w.coord.lat - end.lat).abs() > DESTINATION_DISTINCT_EPS || (w.coord.lng - end.lng).abs() > DESTINATION_DISTINCT_EPS)
                .unwrap_or(true);
            if distinct {
                return Some(DESTINATION_ID.to_string());
            }
        }
    }
    if input.lodging.is_some() {
        return Some(ACCOMMODATION_ID.to_string());
    }
    None
}

fn push_request(out: &mut Vec<RoutingRequest>, from_id: &str, to_id: &str, input: &TripInput, waypoints: &WaypointMap) {
    let Some(from) = resolve_coord(from_id, input, waypoints) else {
        warn!(from_id, to_id, "segment dropped: unresolved from coordinate");
        return;
    };
    let Some(to) = resolve_coord(to_id, input, waypoints) else {
        warn!(from_id, to_id, "segment dropped: unresolved to coordinate");
        return;
    };
    out.push(RoutingRequest {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        from,
        to,
    });
}

fn resolve_coord(id: &str, input: &TripInput, waypoints: &WaypointMap) -> Option<crate::model::LatLng> {
    match id {
        ORIGIN_ID => Some(input.start),
        DESTINATION_ID => input.end.or(Some(input.start)),
        ACCOMMODATION_ID => input.lodging,
        other => waypoints.get(other).map(|w| w.coord),
    }
}
