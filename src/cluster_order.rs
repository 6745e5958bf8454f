//! Day-cluster ordering: end-anchor choice, axis projection sort, bounded
//! 3-opt-style smoothing, monotonic-progression check (spec §4.3).

use tracing::warn;

use crate::config::PlannerConfig;
use crate::geo::{centroid, haversine_m, scalar_projection, Vec2};
use crate::model::{Cluster, LatLng, TripInput};

/// Orders clusters into a day sequence along the start→end axis, smooths
/// with bounded 3-opt-style swaps, and returns the ordered clusters (their
/// `day_index` is rewritten to match the new position) plus the resolved
/// end anchor.
pub fn order_clusters(mut clusters: Vec<Cluster>, input: &TripInput, config: &PlannerConfig) -> (Vec<Cluster>, LatLng) {
    if clusters.is_empty() {
        return (clusters, input.lodging.unwrap_or(input.start));
    }

    let end_anchor = choose_end_anchor(&clusters, input);
    let start_anchor = input.start;
    let axis = Vec2::unit(start_anchor, end_anchor);

    clusters.sort_by(|a, b| {
        let pa = scalar_projection(start_anchor, a.centroid, axis);
        let pb = scalar_projection(start_anchor, b.centroid, axis);
        pa.partial_cmp(&pb).unwrap()
    });

    smooth(&mut clusters, end_anchor, config);
    check_monotonic(&clusters, axis);

    for (idx, cluster) in clusters.iter_mut().enumerate() {
        cluster.day_index = idx;
        cluster.cluster_id = idx;
    }

    (clusters, end_anchor)
}

fn choose_end_anchor(clusters: &[Cluster], input: &TripInput) -> LatLng {
    if let Some(lodging) = input.lodging {
        return lodging;
    }
    let centroids: Vec<LatLng> = clusters.iter().map(|c| c.centroid).collect();
    let mean = centroid(&centroids);
    clusters
        .iter()
        .max_by(|a, b| {
            haversine_m(a.centroid, mean)
                .partial_cmp(&haversine_m(b.centroid, mean))
                .unwrap()
        })
        .map(|c| c.centroid)
        .unwrap_or(input.start)
}

/// Bounded 3-opt-style smoothing: for up to `smoothing_passes`, try moving
/// cluster `j` to before position `i`, accepting at most one swap per pass
/// when the incident-edge-sum improves by at least `smoothing_threshold_m`.
fn smooth(clusters: &mut Vec<Cluster>, end_anchor: LatLng, config: &PlannerConfig) {
    for _ in 0..config.smoothing_passes {
        let mut swapped = false;
        let n = clusters.len();
        'search: for i in 0..n {
            for j in (i + 1)..n {
                let before = edge_sum(clusters, end_anchor);
                let mut candidate = clusters.clone();
                let moved = candidate.remove(j);
                candidate.insert(i, moved);
                let after = edge_sum(&candidate, end_anchor);

                if before - after >= config.smoothing_threshold_m {
                    *clusters = candidate;
                    swapped = true;
                    break 'search;
                }
            }
        }
        if !swapped {
            break;
        }
    }
}

fn edge_sum(clusters: &[Cluster], end_anchor: LatLng) -> f64 {
    let mut sum = 0.0;
    for pair in clusters.windows(2) {
        sum += haversine_m(pair[0].centroid, pair[1].centroid);
    }
    if let Some(last) = clusters.last() {
        sum += haversine_m(last.centroid, end_anchor);
    }
    sum
}

fn check_monotonic(clusters: &[Cluster], axis: Vec2) {
    for pair in clusters.windows(2) {
        let step = Vec2::unit(pair[0].centroid, pair[1].centroid);
        if step.len() > 0.0 && step.dot(&axis) < -0.1 {
            warn!(
                "cluster_order: monotonic progression violated between day {} and day {}",
                pair[0].day_index, pair[1].day_index
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: usize, lat: f64, lng: f64) -> Cluster {
        Cluster {
            cluster_id: id,
            day_index: id,
            waypoint_ids: vec![format!("w{id}")],
            centroid: LatLng::new(lat, lng),
        }
    }

    fn base_input() -> TripInput {
        TripInput {
            trip_id: "t".into(),
            days: 3,
            start: LatLng::new(0.0, 0.0),
            end: Some(LatLng::new(0.0, 3.0)),
            lodging: None,
            waypoints: Vec::new(),
            daily_max_minutes: None,
            trip_start_date: None,
            check_in_date: None,
            check_in_time: None,
            per_day_time_limits: Vec::new(),
        }
    }

    #[test]
    fn orders_along_start_end_axis() {
        let clusters = vec![cluster(0, 0.0, 2.0), cluster(1, 0.0, 0.5), cluster(2, 0.0, 1.2)];
        let input = base_input();
        let (ordered, _) = order_clusters(clusters, &input, &PlannerConfig::default());
        let lngs: Vec<f64> = ordered.iter().map(|c| c.centroid.lng).collect();
        assert_eq!(lngs, vec![0.5, 1.2, 2.0]);
    }

    #[test]
    fn end_anchor_is_lodging_when_set() {
        let mut input = base_input();
        input.lodging = Some(LatLng::new(1.0, 1.0));
        let clusters = vec![cluster(0, 0.0, 0.0), cluster(1, 0.0, 1.0)];
        let (_, end_anchor) = order_clusters(clusters, &input, &PlannerConfig::default());
        assert_eq!(end_anchor, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn day_indices_rewritten_to_final_order() {
        let clusters = vec![cluster(5, 0.0, 2.0), cluster(9, 0.0, 0.0)];
        let input = base_input();
        let (ordered, _) = order_clusters(clusters, &input, &PlannerConfig::default());
        assert_eq!(ordered[0].day_index, 0);
        assert_eq!(ordered[1].day_index, 1);
    }
}
