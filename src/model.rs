//! Core data model (spec §3).
//!
//! `Waypoint`, `Zone`, `Cluster`, `DayPlan`, `SegmentCost` are produced and
//! then frozen by their creating stage; downstream stages read them by id
//! through an `id -> Waypoint` map rather than holding pointers (spec §9).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel id for the trip's start anchor.
pub const ORIGIN_ID: &str = "__origin__";
/// Sentinel id for the trip's final destination anchor.
pub const DESTINATION_ID: &str = "__destination__";
/// Sentinel id for the (single) lodging anchor.
pub const ACCOMMODATION_ID: &str = "__accommodation_0__";

/// A latitude/longitude pair. `lat` in `[-90, 90]`, `lng` in `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Approximate equality used for "start ≈ end" loop detection (spec §3).
    pub fn approx_eq(&self, other: &LatLng, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon && (self.lng - other.lng).abs() < epsilon
    }
}

/// A place the traveler may visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub name: String,
    pub coord: LatLng,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default)]
    pub fixed_date: Option<String>,
    #[serde(default)]
    pub fixed_start_time: Option<String>,
    #[serde(default)]
    pub day_lock: Option<usize>,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default = "default_stay_minutes")]
    pub stay_minutes: i32,
}

fn default_importance() -> f64 {
    1.0
}

fn default_stay_minutes() -> i32 {
    60
}

impl Waypoint {
    pub fn pinned_to_time(&self) -> bool {
        self.is_fixed && self.fixed_start_time.is_some()
    }
}

/// Trip-level input (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripInput {
    pub trip_id: String,
    pub days: usize,
    pub start: LatLng,
    #[serde(default)]
    pub end: Option<LatLng>,
    #[serde(default)]
    pub lodging: Option<LatLng>,
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub daily_max_minutes: Option<f64>,
    #[serde(default)]
    pub trip_start_date: Option<String>,
    #[serde(default)]
    pub check_in_date: Option<String>,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub per_day_time_limits: Vec<Option<(String, String)>>,
}

/// Whether the trip returns to its starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripMode {
    Open,
    Loop,
}

impl TripInput {
    pub fn mode(&self) -> TripMode {
        if self.lodging.is_some() {
            return TripMode::Loop;
        }
        match self.end {
            Some(end) if self.start.approx_eq(&end, 1e-6) => TripMode::Loop,
            None => TripMode::Open,
            Some(_) => TripMode::Open,
        }
    }
}

/// Spatial grouping of waypoints closer than the k-NN adjacency radius.
/// Ephemeral: exists only between zoning and day-assignment.
#[derive(Debug, Clone)]
pub struct Zone {
    pub zone_id: usize,
    pub waypoint_ids: Vec<String>,
    pub centroid: LatLng,
    pub estimated_minutes: f64,
    pub has_fixed: bool,
    pub fixed_day_index: Option<usize>,
}

/// Set of waypoints assigned to one calendar day, pre-ordering.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: usize,
    pub day_index: usize,
    pub waypoint_ids: Vec<String>,
    pub centroid: LatLng,
}

/// Ordered visit sequence for one day, post-ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_index: usize,
    pub waypoint_order: Vec<String>,
    pub excluded_waypoint_ids: Vec<String>,
    #[serde(default)]
    pub check_in_break_index: Option<usize>,
}

/// Directed pair identifying a routed segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub from_id: String,
    pub to_id: String,
}

impl SegmentKey {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

/// Traffic mode of a transit subpath (spec §3, §9 "dynamic dispatch" note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficType {
    Subway,
    Bus,
    Walk,
    Rail,
    IntercityBus,
    IntercityTrain,
    Marine,
}

impl TrafficType {
    /// Maps the wire-contract integer codes from spec §3 to the tagged variant.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Subway),
            2 => Some(Self::Bus),
            3 => Some(Self::Walk),
            10 => Some(Self::Rail),
            11 => Some(Self::IntercityBus),
            12 => Some(Self::IntercityTrain),
            14 => Some(Self::Marine),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitSubpath {
    pub traffic_type: Option<TrafficType>,
    pub distance_meters: f64,
    pub section_time_seconds: f64,
    pub start_coord: Option<LatLng>,
    pub end_coord: Option<LatLng>,
    pub station_count: Option<i32>,
    pub lane: Option<String>,
    pub polyline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitDetails {
    pub fare: Option<f64>,
    pub subpaths: Vec<TransitSubpath>,
}

/// Cost of a single directed segment along a day's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCost {
    pub key: SegmentKey,
    pub duration_minutes: f64,
    pub distance_meters: f64,
    #[serde(default)]
    pub transfers: Option<i32>,
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub transit_details: Option<TransitDetails>,
    /// Set when this cost is a synthesized/estimated stand-in for a real
    /// routed cost (provider failure, circuit breaker open) rather than a
    /// value returned by a provider (spec §7).
    #[serde(default)]
    pub is_fallback: bool,
}

/// Final planner output (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripOutput {
    pub trip_id: String,
    pub mode: TripMode,
    pub clusters: Vec<ClusterSummary>,
    pub day_plans: Vec<DayPlan>,
    pub segment_costs: Vec<SegmentCost>,
    /// Non-fatal diagnostics accumulated during planning (e.g. `BudgetInfeasible`,
    /// monotonic-progression violations) — spec §7 treats these as warnings,
    /// not errors.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Output-facing projection of a [`Cluster`] (drops the ephemeral id space).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub day_index: usize,
    pub waypoint_ids: Vec<String>,
    pub centroid: LatLng,
}

/// Read-only handle shared by all stages: waypoints keyed by id.
pub type WaypointMap = HashMap<String, Waypoint>;

pub fn waypoint_map(waypoints: &[Waypoint]) -> WaypointMap {
    waypoints
        .iter()
        .map(|w| (w.id.clone(), w.clone()))
        .collect()
}
