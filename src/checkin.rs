//! Check-in split: inserts a mid-day lodging visit when check-in time falls
//! between two scheduled visits (spec §4.5).

use chrono::NaiveTime;

use crate::geo::haversine_km;
use crate::model::{DayPlan, LatLng, TripInput, WaypointMap};

/// Walking speed used to estimate arrival times for the check-in heuristic.
const ESTIMATE_WALK_KMH: f64 = 12.0;

/// Resolves the day index the check-in falls on, if lodging and a check-in
/// time are both set and the date resolves within the trip.
pub fn check_in_day_index(input: &TripInput) -> Option<usize> {
    input.lodging?;
    input.check_in_time.as_ref()?;
    let check_in_date = input.check_in_date.as_deref()?;
    let trip_start = input.trip_start_date.as_deref()?;

    let check_in = chrono::NaiveDate::parse_from_str(check_in_date, "%Y-%m-%d").ok()?;
    let start = chrono::NaiveDate::parse_from_str(trip_start, "%Y-%m-%d").ok()?;
    let delta = (check_in - start).num_days();
    if delta >= 0 && (delta as usize) < input.days {
        Some(delta as usize)
    } else {
        None
    }
}

/// Applies the check-in split to the given day plan in place, setting
/// `check_in_break_index` if the heuristic finds a break point.
pub fn apply_check_in_split(plan: &mut DayPlan, day_start: LatLng, input: &TripInput, map: &WaypointMap) {
    let Some(check_in_time) = input.check_in_time.as_deref() else {
        return;
    };
    let Some(check_in_minute) = parse_minutes(check_in_time) else {
        return;
    };

    let mut elapsed = 0.0;
    let mut prev_coord = day_start;

    for (i, id) in plan.waypoint_order.iter().enumerate() {
        let Some(w) = map.get(id) else { continue };
        let travel_km = haversine_km(prev_coord, w.coord);
        elapsed += (travel_km / ESTIMATE_WALK_KMH) * 60.0;

        let pinned_minute = w
            .fixed_start_time
            .as_deref()
            .and_then(parse_minutes)
            .filter(|_| w.is_fixed);

        let arrival = pinned_minute.unwrap_or(elapsed);

        if arrival >= check_in_minute as f64 {
            plan.check_in_break_index = Some(i);
            return;
        }

        elapsed += w.stay_minutes as f64;
        prev_coord = w.coord;
    }
}

fn parse_minutes(s: &str) -> Option<i32> {
    use chrono::Timelike;
    let t = NaiveTime::parse_from_str(s, "%H:%M").ok()?;
    Some((t.hour() * 60 + t.minute()) as i32)
}
