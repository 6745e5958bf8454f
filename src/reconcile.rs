//! Complexity reconciliation: two-phase budget enforcement against per-day
//! time limits (spec §4.8). Phase A is a cheap pre-routing proxy; Phase B
//! uses real routed costs and iterates with the routing client.

use std::collections::HashMap;

use tracing::warn;

use crate::config::PlannerConfig;
use crate::geo::haversine_km;
use crate::model::{DayPlan, SegmentCost, TripInput, WaypointMap};
use crate::routing::RoutingClient;
use crate::segments;
use tokio_util::sync::CancellationToken;

const PROXY_KM_TO_MIN: f64 = 5.0;

/// Per-waypoint removal desirability score (spec §4.8). Higher is "more
/// worth removing".
fn score(delta_backtracking: f64, delta_crossings: f64, delta_dist_km: f64, importance: f64, stay_minutes: f64) -> f64 {
    2.0 * delta_backtracking + delta_crossings + (delta_dist_km * PROXY_KM_TO_MIN) + 0.5 * delta_dist_km
        - 2.0 * importance
        - stay_minutes
}

fn is_removable(id: &str, waypoints: &WaypointMap) -> bool {
    match waypoints.get(id) {
        Some(w) => !w.is_fixed && w.day_lock.is_none(),
        None => false,
    }
}

/// Coarse proxy cost for a day's route: haversine chain, ×5 min/km, no
/// external calls.
fn proxy_minutes(plan: &DayPlan, start: crate::model::LatLng, end: Option<crate::model::LatLng>, waypoints: &WaypointMap) -> f64 {
    let coords: Vec<crate::model::LatLng> = std::iter::once(start)
        .chain(plan.waypoint_order.iter().filter_map(|id| waypoints.get(id).map(|w| w.coord)))
        .chain(end)
        .collect();
    coords.windows(2).map(|w| haversine_km(w[0], w[1]) * PROXY_KM_TO_MIN).sum()
}

/// Removing `idx` from `order` (given `start`/`end`) changes distance by
/// `dist(with) - dist(without)`; used both by the proxy score and as a
/// building block for Phase B's saving estimate.
fn removal_distance_delta_km(
    order: &[String],
    idx: usize,
    start: crate::model::LatLng,
    end: Option<crate::model::LatLng>,
    waypoints: &WaypointMap,
) -> f64 {
    let with_dist = route_km(order, start, end, waypoints);
    let mut without = order.to_vec();
    without.remove(idx);
    let without_dist = route_km(&without, start, end, waypoints);
    with_dist - without_dist
}

fn route_km(order: &[String], start: crate::model::LatLng, end: Option<crate::model::LatLng>, waypoints: &WaypointMap) -> f64 {
    let coords: Vec<crate::model::LatLng> = std::iter::once(start)
        .chain(order.iter().filter_map(|id| waypoints.get(id).map(|w| w.coord)))
        .chain(end)
        .collect();
    coords.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Phase A: proxy-based pre-routing exclusion pass (spec §4.8).
///
/// `anchors` gives each day's `(start, end)` coordinates (see
/// `orchestrator::day_anchor_coords`).
pub fn phase_a_proxy(
    day_plans: &mut [DayPlan],
    anchors: &[(crate::model::LatLng, Option<crate::model::LatLng>)],
    input: &TripInput,
    waypoints: &WaypointMap,
    config: &PlannerConfig,
) -> bool {
    let Some(limit) = input.daily_max_minutes else {
        return false;
    };
    let total_waypoints: usize = day_plans.iter().map(|p| p.waypoint_order.len()).sum::<usize>()
        + day_plans.iter().map(|p| p.excluded_waypoint_ids.len()).sum::<usize>();
    let max_removals = (total_waypoints as f64 * config.max_proxy_removal_fraction).floor() as usize;
    let mut removals = 0usize;

    loop {
        let worst_day = day_plans
            .iter()
            .enumerate()
            .map(|(i, p)| (i, proxy_minutes(p, anchors[i].0, anchors[i].1, waypoints)))
            .filter(|(_, minutes)| *minutes > limit)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let Some((day_idx, _)) = worst_day else { return false };
        if removals >= max_removals {
            warn!("reconcile: phase A reached max removals before all days met budget");
            return true;
        }

        let plan = &mut day_plans[day_idx];
        let (start, end) = anchors[day_idx];
        let candidate = plan
            .waypoint_order
            .iter()
            .enumerate()
            .filter(|(_, id)| is_removable(id, waypoints))
            .map(|(idx, id)| {
                let w = &waypoints[id];
                let delta_km = removal_distance_delta_km(&plan.waypoint_order, idx, start, end, waypoints);
                let s = score(0.0, 0.0, delta_km, w.importance, w.stay_minutes as f64);
                (idx, s)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let Some((idx, _)) = candidate else {
            warn!(day_index = day_idx, "reconcile: phase A has no removable candidate, stopping");
            return true;
        };

        let removed = plan.waypoint_order.remove(idx);
        plan.excluded_waypoint_ids.push(removed);
        removals += 1;
    }
}

/// Phase B: true-cost reconciliation using real `SegmentCost`s. Mutates
/// `day_plans` and returns the final (possibly re-fetched) segment costs
/// plus whether reconciliation hit its max-rounds/max-removals limit while
/// a day was still over budget (spec §7 `BudgetInfeasible`).
/// Only segments absent from the cache are re-fetched on each round.
pub async fn phase_b_true_cost(
    day_plans: &mut Vec<DayPlan>,
    input: &TripInput,
    waypoints: &WaypointMap,
    routing: &RoutingClient,
    config: &PlannerConfig,
    cancel: &CancellationToken,
) -> (Vec<SegmentCost>, bool) {
    let Some(limit) = input.daily_max_minutes else {
        let requests = segments::extract_segments(day_plans, input, waypoints);
        return (routing.fetch_segments(requests, cancel).await.unwrap_or_default(), false);
    };

    let mut round = 0u32;
    loop {
        let requests = segments::extract_segments(day_plans, input, waypoints);
        let costs = match routing.fetch_segments(requests, cancel).await {
            Ok(c) => c,
            Err(_) => return (Vec::new(), false),
        };

        let day_totals = day_minutes(day_plans, input, &costs, waypoints);
        let overloaded: Vec<(usize, f64)> = day_totals
            .iter()
            .enumerate()
            .filter(|(_, total)| **total > limit)
            .map(|(i, total)| (i, *total - limit))
            .collect();

        if overloaded.is_empty() {
            return (costs, false);
        }
        if round >= config.reconciliation_rounds {
            warn!("reconcile: phase B reached max rounds with days still over budget");
            return (costs, true);
        }

        let mut worst = overloaded;
        worst.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let (day_idx, excess) = worst[0];

        let removed_any = remove_until_saving_met(&mut day_plans[day_idx], waypoints, &costs, excess);
        if !removed_any {
            warn!(day_index = day_idx, "reconcile: phase B has no removable waypoint left, stopping");
            return (costs, true);
        }

        round += 1;
    }
}

/// Per-day total minutes (stay + travel) against `dailyMaxMinutes` (spec
/// §4.8). Travel minutes are summed over exactly this day's own
/// `(from_id, to_id)` chain (including its bookends and any check-in
/// detour), not by membership-testing the shared cost list — a cross-day
/// transition segment's `from_id`/`to_id` pair can belong to two different
/// days' waypoint sets, and counting it by membership would double-count
/// it into both.
fn day_minutes(day_plans: &[DayPlan], input: &TripInput, costs: &[SegmentCost], waypoints: &WaypointMap) -> Vec<f64> {
    let mut cost_by_pair: HashMap<(String, String), f64> = HashMap::new();
    for c in costs {
        cost_by_pair.insert((c.key.from_id.clone(), c.key.to_id.clone()), c.duration_minutes);
    }

    let last_day = day_plans.len().saturating_sub(1);
    day_plans
        .iter()
        .enumerate()
        .map(|(day_idx, plan)| {
            let stay: f64 = plan
                .waypoint_order
                .iter()
                .filter_map(|id| waypoints.get(id))
                .map(|w| w.stay_minutes as f64)
                .sum();

            let travel: f64 = segments::day_id_pairs(day_idx, last_day, plan, input, day_plans, waypoints)
                .iter()
                .filter_map(|pair| cost_by_pair.get(pair))
                .sum();

            stay + travel
        })
        .collect()
}

/// Greedily removes waypoints by descending score until the cumulative
/// estimated saving meets `excess` (spec §4.8 Phase B). Returns whether any
/// waypoint was removed.
fn remove_until_saving_met(plan: &mut DayPlan, waypoints: &WaypointMap, costs: &[SegmentCost], excess: f64) -> bool {
    let mut cost_by_pair: HashMap<(String, String), f64> = HashMap::new();
    for c in costs {
        cost_by_pair.insert((c.key.from_id.clone(), c.key.to_id.clone()), c.duration_minutes);
    }

    let mut removed_any = false;
    let mut saved = 0.0;

    loop {
        if saved >= excess {
            break;
        }
        let candidate = plan
            .waypoint_order
            .iter()
            .enumerate()
            .filter(|(_, id)| is_removable(id, waypoints))
            .map(|(idx, id)| {
                let w = &waypoints[id];
                let time_saving = estimate_time_saving(&plan.waypoint_order, idx, &cost_by_pair);
                let s = score(0.0, 0.0, 0.0, w.importance, w.stay_minutes as f64);
                (idx, s, w.stay_minutes as f64 + time_saving)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let Some((idx, _, saving)) = candidate else { break };
        let removed = plan.waypoint_order.remove(idx);
        plan.excluded_waypoint_ids.push(removed);
        saved += saving;
        removed_any = true;
    }

    removed_any
}

fn estimate_time_saving(order: &[String], idx: usize, cost_by_pair: &HashMap<(String, String), f64>) -> f64 {
    let prev = if idx == 0 { None } else { order.get(idx - 1) };
    let cur = &order[idx];
    let next = order.get(idx + 1);

    let time_with = match (prev, next) {
        (Some(p), Some(n)) => {
            cost_by_pair.get(&(p.clone(), cur.clone())).copied().unwrap_or(0.0)
                + cost_by_pair.get(&(cur.clone(), n.clone())).copied().unwrap_or(0.0)
        }
        (Some(p), None) => cost_by_pair.get(&(p.clone(), cur.clone())).copied().unwrap_or(0.0),
        (None, Some(n)) => cost_by_pair.get(&(cur.clone(), n.clone())).copied().unwrap_or(0.0),
        (None, None) => 0.0,
    };

    let time_without = match (prev, next) {
        (Some(p), Some(n)) => cost_by_pair.get(&(p.clone(), n.clone())).copied().unwrap_or(0.0),
        _ => 0.0,
    };

    time_with - time_without
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{waypoint_map, LatLng, Waypoint};

    fn wp(id: &str, lat: f64, lng: f64, importance: f64, stay: i32, fixed: bool) -> Waypoint {
        Waypoint {
            id: id.into(),
            name: id.into(),
            coord: LatLng::new(lat, lng),
            is_fixed: fixed,
            fixed_date: None,
            fixed_start_time: None,
            day_lock: None,
            importance,
            stay_minutes: stay,
        }
    }

    #[test]
    fn phase_a_excludes_when_over_budget() {
        let waypoints = vec![
            wp("a", 37.5, 127.0, 1.0, 60, false),
            wp("b", 37.6, 127.1, 1.0, 60, false),
            wp("c", 37.7, 127.2, 1.0, 60, false),
        ];
        let map = waypoint_map(&waypoints);
        let mut input_waypoints = waypoints.clone();
        let input = TripInput {
            trip_id: "t".into(),
            days: 1,
            start: LatLng::new(37.5, 127.0),
            end: None,
            lodging: None,
            waypoints: std::mem::take(&mut input_waypoints),
            daily_max_minutes: Some(5.0),
            trip_start_date: None,
            check_in_date: None,
            check_in_time: None,
            per_day_time_limits: Vec::new(),
        };
        let mut plans = vec![DayPlan {
            day_index: 0,
            waypoint_order: vec!["a".into(), "b".into(), "c".into()],
            excluded_waypoint_ids: Vec::new(),
            check_in_break_index: None,
        }];
        let anchors = vec![(input.start, None)];
        phase_a_proxy(&mut plans, &anchors, &input, &map, &PlannerConfig::default());
        assert!(!plans[0].excluded_waypoint_ids.is_empty());
        assert!(plans[0].waypoint_order.len() < 3);
    }

    #[test]
    fn phase_a_never_excludes_fixed_waypoints() {
        let waypoints = vec![
            wp("a", 37.5, 127.0, 1.0, 60, true),
            wp("b", 37.6, 127.1, 1.0, 60, true),
        ];
        let map = waypoint_map(&waypoints);
        let input = TripInput {
            trip_id: "t".into(),
            days: 1,
            start: LatLng::new(37.5, 127.0),
            end: None,
            lodging: None,
            waypoints: waypoints.clone(),
            daily_max_minutes: Some(0.001),
            trip_start_date: None,
            check_in_date: None,
            check_in_time: None,
            per_day_time_limits: Vec::new(),
        };
        let mut plans = vec![DayPlan {
            day_index: 0,
            waypoint_order: vec!["a".into(), "b".into()],
            excluded_waypoint_ids: Vec::new(),
            check_in_break_index: None,
        }];
        let anchors = vec![(input.start, None)];
        phase_a_proxy(&mut plans, &anchors, &input, &map, &PlannerConfig::default());
        assert_eq!(plans[0].waypoint_order.len(), 2);
        assert!(plans[0].excluded_waypoint_ids.is_empty());
    }
}
