//! External routing-provider wire types (spec §6) and the traits the
//! routing client is generic over. Grounded on the teacher's
//! `OsrmClient`/`DistanceMatrixProvider` adapter shape (`osrm.rs`), widened
//! from a synchronous distance-matrix call to the two async point-to-point
//! endpoints this spec consumes.

use async_trait::async_trait;

use crate::model::LatLng;

/// Request for a single directed segment.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub from_id: String,
    pub to_id: String,
    pub from: LatLng,
    pub to: LatLng,
}

#[derive(Debug, Clone)]
pub struct WireSubpath {
    pub traffic_type: i32,
    pub distance: f64,
    pub section_time: f64,
    pub start_coord: Option<LatLng>,
    pub end_coord: Option<LatLng>,
    pub station_count: Option<i32>,
    pub lane: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WireTransitDetails {
    pub total_fare: Option<f64>,
    pub walking_time: Option<f64>,
    pub walking_distance: Option<f64>,
    pub sub_paths: Vec<WireSubpath>,
}

#[derive(Debug, Clone)]
pub struct TransitRouteResponse {
    pub total_duration_min: f64,
    pub total_distance_m: f64,
    pub transfer_count: Option<i32>,
    pub polyline: Option<String>,
    pub details: Option<WireTransitDetails>,
}

#[derive(Debug, Clone)]
pub struct WalkingRouteResponse {
    pub total_duration_min: f64,
    pub total_distance_m: f64,
    pub polyline: Option<String>,
}

/// Failure modes for a single provider call. Internal to the routing
/// client — never escapes into [`crate::error::TripError`] (spec §7:
/// "Routing failures never propagate out of the routing client").
#[derive(Debug, Clone)]
pub enum ProviderError {
    RequestFailed(String),
    ServerError(u16),
    Timeout,
}

/// Black-box transit endpoint (spec §6). `None` means "no route found".
#[async_trait]
pub trait TransitProvider: Send + Sync {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<TransitRouteResponse>, ProviderError>;
}

/// Black-box walking endpoint (spec §6). `None` means "no route found".
#[async_trait]
pub trait WalkingProvider: Send + Sync {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<WalkingRouteResponse>, ProviderError>;
}
