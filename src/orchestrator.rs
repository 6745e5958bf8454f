//! Orchestrator: validates input and glues every stage together in order
//! (spec §4.9).
//!
//! `Input → Preprocess → Zoning → OrderedClusters → DayPlans (ordered) →
//! CheckInSplit? → SegmentList → RoutedCosts → Reconcile → Output`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checkin;
use crate::cluster_order;
use crate::config::PlannerConfig;
use crate::error::{TripError, TripResult};
use crate::model::{
    ClusterSummary, Cluster, DayPlan, LatLng, TripInput, TripOutput, waypoint_map,
};
use crate::preprocess::preprocess;
use crate::reconcile;
use crate::routing::RoutingClient;
use crate::within_cluster;
use crate::zoning;

/// Runs the full pipeline for one trip request.
pub async fn plan_trip(
    mut input: TripInput,
    routing: &RoutingClient,
    config: &PlannerConfig,
    cancel: &CancellationToken,
) -> TripResult<TripOutput> {
    validate(&input)?;

    let cleaned = preprocess(&input.waypoints)?;
    input.waypoints = cleaned;

    let mode = input.mode();
    let waypoints = waypoint_map(&input.waypoints);

    let clusters = zoning::build_clusters(&input, &input.waypoints, &waypoints, config);
    if clusters.iter().all(|c| c.waypoint_ids.is_empty()) {
        return Err(TripError::ClusteringFailure);
    }

    let (ordered_clusters, end_anchor) = cluster_order::order_clusters(clusters, &input, config);

    if cancel.is_cancelled() {
        return Err(TripError::Cancelled);
    }

    let mut day_plans = build_day_plans(&ordered_clusters, &input, &waypoints, end_anchor, config);

    let check_in_day = checkin::check_in_day_index(&input);
    if let Some(day_idx) = check_in_day {
        if let Some(plan) = day_plans.get_mut(day_idx) {
            let day_start = day_start_anchor(day_idx, &input, &day_plans, &waypoints);
            checkin::apply_check_in_split(plan, day_start, &input, &waypoints);
        }
    }

    let anchors: Vec<(LatLng, Option<LatLng>)> = (0..day_plans.len())
        .map(|i| {
            let start = day_start_anchor(i, &input, &day_plans, &waypoints);
            let end = day_end_anchor(i, day_plans.len(), &input, &ordered_clusters, end_anchor);
            (start, Some(end))
        })
        .collect();

    let phase_a_infeasible = reconcile::phase_a_proxy(&mut day_plans, &anchors, &input, &waypoints, config);

    if cancel.is_cancelled() {
        return Err(TripError::Cancelled);
    }

    let (segment_costs, phase_b_infeasible) =
        reconcile::phase_b_true_cost(&mut day_plans, &input, &waypoints, routing, config, cancel).await;
    if cancel.is_cancelled() {
        return Err(TripError::Cancelled);
    }

    let mut warnings = Vec::new();
    if phase_a_infeasible || phase_b_infeasible {
        if let Some(limit) = input.daily_max_minutes {
            warnings.push(format!(
                "one or more days could not fit every waypoint within the {limit} minute daily budget"
            ));
        }
    }

    let cluster_summaries: Vec<ClusterSummary> = ordered_clusters
        .iter()
        .map(|c| ClusterSummary {
            day_index: c.day_index,
            waypoint_ids: c.waypoint_ids.clone(),
            centroid: c.centroid,
        })
        .collect();

    Ok(TripOutput {
        trip_id: input.trip_id.clone(),
        mode,
        clusters: cluster_summaries,
        day_plans,
        segment_costs,
        warnings,
    })
}

fn validate(input: &TripInput) -> TripResult<()> {
    if input.trip_id.trim().is_empty() {
        return Err(TripError::InvalidInput("tripId is required".into()));
    }
    if input.days == 0 {
        return Err(TripError::InvalidInput("days must be >= 1".into()));
    }
    if !input.start.is_valid() {
        return Err(TripError::InvalidInput("start coordinate is invalid".into()));
    }
    if input.waypoints.is_empty() {
        return Err(TripError::InvalidInput("waypoints must be non-empty".into()));
    }
    Ok(())
}

/// Orders each cluster's waypoints into a visit sequence (spec §4.4),
/// in parallel across days since orderings are independent (spec §5
/// "intra-request fan-out").
fn build_day_plans(
    clusters: &[Cluster],
    input: &TripInput,
    waypoints: &crate::model::WaypointMap,
    end_anchor: LatLng,
    config: &PlannerConfig,
) -> Vec<DayPlan> {
    use rayon::prelude::*;
    let by_day: Vec<Vec<String>> = clusters
        .par_iter()
        .enumerate()
        .map(|(i, cluster)| {
            let start = day_start_anchor_for_cluster(i, input, clusters);
            let end = day_end_anchor(i, clusters.len(), input, clusters, end_anchor);
            within_cluster::order_within_cluster(&cluster.waypoint_ids, start, end, waypoints, config)
        })
        .collect();

    by_day
        .into_iter()
        .enumerate()
        .map(|(day_index, waypoint_order)| DayPlan {
            day_index,
            waypoint_order,
            excluded_waypoint_ids: Vec::new(),
            check_in_break_index: None,
        })
        .collect()
}

/// Day start anchor used for ordering, before day-plans exist: origin on
/// day 0, lodging if set, else the previous cluster's centroid as a stand-in
/// for "previous day's last stop" (the real last stop isn't known until
/// ordering runs, so this is the same approximation `day_anchors` in
/// `zoning` uses for day assignment).
fn day_start_anchor_for_cluster(day_idx: usize, input: &TripInput, clusters: &[Cluster]) -> LatLng {
    if day_idx == 0 {
        return input.start;
    }
    if let Some(lodging) = input.lodging {
        return lodging;
    }
    clusters[day_idx - 1].centroid
}

/// Day start anchor once day-plans are populated: origin on day 0, lodging
/// if set, else the previous day's actual last stop (spec §4.4).
fn day_start_anchor(day_idx: usize, input: &TripInput, day_plans: &[DayPlan], waypoints: &crate::model::WaypointMap) -> LatLng {
    if day_idx == 0 {
        return input.start;
    }
    if let Some(lodging) = input.lodging {
        return lodging;
    }
    day_plans[day_idx - 1]
        .waypoint_order
        .last()
        .and_then(|id| waypoints.get(id))
        .map(|w| w.coord)
        .unwrap_or(input.start)
}

/// Day end anchor (spec §4.3): lodging if set; on the last day,
/// `input.end ?? input.start ?? endAnchor`; else the next cluster's centroid.
fn day_end_anchor(day_idx: usize, total_days: usize, input: &TripInput, clusters: &[Cluster], end_anchor: LatLng) -> LatLng {
    if let Some(lodging) = input.lodging {
        return lodging;
    }
    if day_idx + 1 == total_days {
        return input.end.unwrap_or(input.start);
    }
    clusters.get(day_idx + 1).map(|c| c.centroid).unwrap_or(end_anchor)
}
