//! Spatial zoning: k-NN adjacency radius, union-find grouping, fixed-date
//! and overload splits, and day assignment (spec §4.2).

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::config::PlannerConfig;
use crate::geo::{centroid, haversine_m};
use crate::model::{Cluster, LatLng, TripInput, Waypoint, WaypointMap};

/// Builds zones, resolves fixed-date/overload splits, and assigns each zone
/// to a day, returning `input.days` clusters (possibly with empty members).
pub fn build_clusters(
    input: &TripInput,
    waypoints: &[Waypoint],
    waypoint_map: &WaypointMap,
    config: &PlannerConfig,
) -> Vec<Cluster> {
    let zones = initial_zones(waypoints, config);
    let zones = zones
        .into_iter()
        .flat_map(|z| split_by_fixed_date(z, waypoint_map, input))
        .flat_map(|z| split_by_overload(z, waypoint_map, input, config))
        .collect::<Vec<_>>();

    assign_zones_to_days(zones, input, waypoint_map, config)
}

// ---------------------------------------------------------------------------
// Radius estimation + union-find grouping
// ---------------------------------------------------------------------------

fn initial_zones(waypoints: &[Waypoint], config: &PlannerConfig) -> Vec<ZoneBuild> {
    let n = waypoints.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![ZoneBuild::new(vec![waypoints[0].id.clone()])];
    }

    let radius = knn_radius(waypoints, config.knn_k, config.radius_multiplier);

    if !radius.is_finite() || radius <= 0.0 {
        return vec![ZoneBuild::new(
            waypoints.iter().map(|w| w.id.clone()).collect(),
        )];
    }

    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if haversine_m(waypoints[i].coord, waypoints[j].coord) <= radius {
                uf.union(i, j);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        groups.entry(uf.find(i)).or_default().push(i);
    }

    groups
        .into_values()
        .map(|idxs| {
            let ids = idxs.iter().map(|&i| waypoints[i].id.clone()).collect::<Vec<_>>();
            ZoneBuild::new(ids)
        })
        .collect()
}

/// Median k-th-nearest-neighbor distance across all waypoints, in meters.
fn knn_radius(waypoints: &[Waypoint], k: usize, multiplier: f64) -> f64 {
    let mut kth_distances = Vec::with_capacity(waypoints.len());
    for (i, w) in waypoints.iter().enumerate() {
        let mut dists: Vec<f64> = waypoints
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| haversine_m(w.coord, other.coord))
            .collect();
        dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
        if let Some(&d) = dists.get(k.saturating_sub(1).min(dists.len().saturating_sub(1))) {
            kth_distances.push(d);
        }
    }
    if kth_distances.is_empty() {
        return f64::NAN;
    }
    kth_distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = median_of_sorted(&kth_distances);
    median * multiplier
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

// ---------------------------------------------------------------------------
// Zone build (mutable pre-cluster state)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ZoneBuild {
    waypoint_ids: Vec<String>,
    fixed_day_index: Option<usize>,
}

impl ZoneBuild {
    fn new(waypoint_ids: Vec<String>) -> Self {
        Self {
            waypoint_ids,
            fixed_day_index: None,
        }
    }

    fn centroid(&self, map: &WaypointMap) -> LatLng {
        let pts: Vec<LatLng> = self.waypoint_ids.iter().filter_map(|id| map.get(id)).map(|w| w.coord).collect();
        centroid(&pts)
    }

    fn estimated_minutes(&self, map: &WaypointMap) -> f64 {
        self.waypoint_ids
            .iter()
            .filter_map(|id| map.get(id))
            .map(|w| w.stay_minutes as f64)
            .sum()
    }

}

fn parse_trip_start(input: &TripInput) -> Option<NaiveDate> {
    input
        .trip_start_date
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Splits a zone whose members carry mixed `fixedDate` values: one sub-zone
/// per date (day-indexed against `tripStartDate`), plus a "free" sub-zone for
/// members without a fixed date. A single shared date keeps the zone intact
/// but stamps it with that day.
fn split_by_fixed_date(zone: ZoneBuild, map: &WaypointMap, input: &TripInput) -> Vec<ZoneBuild> {
    let trip_start = parse_trip_start(input);

    let mut by_date: HashMap<String, Vec<String>> = HashMap::new();
    let mut free: Vec<String> = Vec::new();

    for id in &zone.waypoint_ids {
        match map.get(id).and_then(|w| w.fixed_date.clone()) {
            Some(date) => by_date.entry(date).or_default().push(id.clone()),
            None => free.push(id.clone()),
        }
    }

    if by_date.is_empty() {
        return vec![zone];
    }

    if by_date.len() == 1 && free.is_empty() {
        let (date, _) = by_date.iter().next().unwrap();
        let mut z = zone;
        z.fixed_day_index = resolve_day_index(date, trip_start);
        return vec![z];
    }

    let mut out = Vec::with_capacity(by_date.len() + 1);
    for (date, ids) in by_date {
        let mut z = ZoneBuild::new(ids);
        z.fixed_day_index = resolve_day_index(&date, trip_start);
        out.push(z);
    }
    if !free.is_empty() {
        out.push(ZoneBuild::new(free));
    }
    out
}

fn resolve_day_index(date: &str, trip_start: Option<NaiveDate>) -> Option<usize> {
    let date = parse_date(date)?;
    let start = trip_start?;
    let delta = (date - start).num_days();
    if delta >= 0 {
        Some(delta as usize)
    } else {
        warn!(%date, "zoning: fixedDate precedes tripStartDate, dropping day lock");
        None
    }
}

/// Splits an overloaded zone along its dominant coordinate axis into equal
/// contiguous buckets (spec §4.2 "Overload split").
fn split_by_overload(
    zone: ZoneBuild,
    map: &WaypointMap,
    input: &TripInput,
    config: &PlannerConfig,
) -> Vec<ZoneBuild> {
    let target_per_day = target_per_day(input);
    let size_limit = ((target_per_day as f64) * (1.0 + config.cluster_flexibility)).ceil() as usize;
    let minutes_limit = input.daily_max_minutes;

    let size = zone.waypoint_ids.len();
    let minutes = zone.estimated_minutes(map);

    let overloaded_by_size = size > size_limit.max(1);
    let overloaded_by_minutes = minutes_limit.is_some_and(|limit| minutes > limit);

    if zone.fixed_day_index.is_some() || !(overloaded_by_size || overloaded_by_minutes) || size < 2 {
        return vec![zone];
    }

    let by_size_buckets = if size_limit > 0 {
        (size as f64 / size_limit as f64).ceil() as usize
    } else {
        1
    };
    let by_minutes_buckets = match minutes_limit {
        Some(limit) if limit > 0.0 => (minutes / limit).ceil() as usize,
        _ => 1,
    };
    let num_buckets = 2.max(by_size_buckets).max(by_minutes_buckets).min(size);

    let mut coords: Vec<(String, LatLng)> = zone
        .waypoint_ids
        .iter()
        .filter_map(|id| map.get(id).map(|w| (id.clone(), w.coord)))
        .collect();

    let lat_range = range_of(coords.iter().map(|(_, c)| c.lat));
    let lng_range = range_of(coords.iter().map(|(_, c)| c.lng));

    if lat_range >= lng_range {
        coords.sort_by(|a, b| a.1.lat.partial_cmp(&b.1.lat).unwrap());
    } else {
        coords.sort_by(|a, b| a.1.lng.partial_cmp(&b.1.lng).unwrap());
    }

    let bucket_size = (coords.len() as f64 / num_buckets as f64).ceil() as usize;
    coords
        .chunks(bucket_size.max(1))
        .map(|chunk| ZoneBuild::new(chunk.iter().map(|(id, _)| id.clone()).collect()))
        .collect()
}

fn range_of(values: impl Iterator<Item = f64>) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() {
        max - min
    } else {
        0.0
    }
}

pub fn target_per_day(input: &TripInput) -> usize {
    let days = input.days.max(1);
    ((input.waypoints.len() as f64) / (days as f64)).ceil() as usize
}

// ---------------------------------------------------------------------------
// Day assignment
// ---------------------------------------------------------------------------

struct DayAnchor {
    start: LatLng,
    end: LatLng,
}

fn day_anchors(input: &TripInput) -> Vec<DayAnchor> {
    let days = input.days.max(1);
    let origin = input.start;
    let lodging = input.lodging;
    let destination = input.end;

    (0..days)
        .map(|day| {
            let start = if day == 0 { origin } else { lodging.unwrap_or(origin) };
            let end = if day == days - 1 {
                lodging.unwrap_or_else(|| destination.unwrap_or(origin))
            } else {
                lodging.unwrap_or(origin)
            };
            DayAnchor { start, end }
        })
        .collect()
}

/// Assigns every built zone to a day, producing `input.days` clusters whose
/// `waypointIds` is the flattened union of the zones assigned to that day.
fn assign_zones_to_days(
    zones: Vec<ZoneBuild>,
    input: &TripInput,
    map: &WaypointMap,
    config: &PlannerConfig,
) -> Vec<Cluster> {
    let days = input.days.max(1);
    let anchors = day_anchors(input);
    let target_per_day = target_per_day(input);

    let mut day_waypoints: Vec<Vec<String>> = vec![Vec::new(); days];
    let mut day_minutes: Vec<f64> = vec![0.0; days];

    let mut pre_assigned = Vec::new();
    let mut remaining = Vec::new();
    for zone in zones {
        match zone.fixed_day_index {
            Some(idx) if idx < days => pre_assigned.push((idx, zone)),
            Some(idx) => {
                warn!(day_index = idx, days, "zoning: fixedDate resolves outside trip length, treating as free");
                remaining.push(zone);
            }
            None => remaining.push(zone),
        }
    }

    for (day_idx, zone) in pre_assigned {
        day_minutes[day_idx] += zone.estimated_minutes(map);
        day_waypoints[day_idx].extend(zone.waypoint_ids);
    }

    remaining.sort_by(|a, b| {
        b.estimated_minutes(map)
            .partial_cmp(&a.estimated_minutes(map))
            .unwrap()
    });

    for zone in remaining {
        let zone_minutes = zone.estimated_minutes(map);
        let zone_size = zone.waypoint_ids.len();
        let centroid = zone.centroid(map);

        let mut best_day = 0;
        let mut best_score = f64::INFINITY;
        for day in 0..days {
            let anchor = &anchors[day];
            let anchor_cost_km = (haversine_m(centroid, anchor.start) + haversine_m(centroid, anchor.end)) / 1000.0;
            let anchor_cost_minutes = anchor_cost_km * 5.0;

            let size_overflow = ((day_waypoints[day].len() + zone_size) as f64 - target_per_day as f64).max(0.0);
            let minutes_overflow = match input.daily_max_minutes {
                Some(limit) => (day_minutes[day] + zone_minutes - limit).max(0.0),
                None => 0.0,
            };

            let score = anchor_cost_minutes
                + config.overload_size_penalty * size_overflow
                + config.overload_minutes_penalty * minutes_overflow;

            if score < best_score {
                best_score = score;
                best_day = day;
            }
        }

        day_minutes[best_day] += zone_minutes;
        day_waypoints[best_day].extend(zone.waypoint_ids);
    }

    day_waypoints
        .into_iter()
        .enumerate()
        .map(|(day_index, waypoint_ids)| {
            let pts: Vec<LatLng> = waypoint_ids.iter().filter_map(|id| map.get(id)).map(|w| w.coord).collect();
            let centroid = if pts.is_empty() { input.start } else { centroid(&pts) };
            Cluster {
                cluster_id: day_index,
                day_index,
                waypoint_ids,
                centroid,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::waypoint_map;

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

    fn grid_input(days: usize, n: usize) -> TripInput {
        let waypoints = (0..n)
            .map(|i| wp(&format!("wp{i}"), 37.5 + 0.08 * i as f64, 127.0 + 0.08 * i as f64))
            .collect();
        TripInput {
            trip_id: "t1".into(),
            days,
            start: LatLng::new(37.5665, 126.978),
            end: None,
            lodging: None,
            waypoints,
            daily_max_minutes: None,
            trip_start_date: None,
            check_in_date: None,
            check_in_time: None,
            per_day_time_limits: Vec::new(),
        }
    }

    #[test]
    fn nine_waypoints_three_days_yields_nine_ids_total() {
        let input = grid_input(3, 9);
        let map = waypoint_map(&input.waypoints);
        let clusters = build_clusters(&input, &input.waypoints, &map, &PlannerConfig::default());
        assert_eq!(clusters.len(), 3);
        let total: usize = clusters.iter().map(|c| c.waypoint_ids.len()).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn fixed_date_pins_waypoint_to_its_day() {
        let mut input = grid_input(3, 4);
        input.trip_start_date = Some("2025-06-01".into());
        input.waypoints[0].fixed_date = Some("2025-06-03".into());
        let map = waypoint_map(&input.waypoints);
        let clusters = build_clusters(&input, &input.waypoints, &map, &PlannerConfig::default());
        assert!(clusters[2].waypoint_ids.contains(&"wp0".to_string()));
    }

    #[test]
    fn single_waypoint_single_day() {
        let input = grid_input(1, 1);
        let map = waypoint_map(&input.waypoints);
        let clusters = build_clusters(&input, &input.waypoints, &map, &PlannerConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].waypoint_ids, vec!["wp0".to_string()]);
    }
}
