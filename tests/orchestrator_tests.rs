//! End-to-end scenarios against the public orchestrator entry point.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trip_router::config::PlannerConfig;
use trip_router::error::TripError;
use trip_router::model::{LatLng, TripInput, TripMode, Waypoint};
use trip_router::orchestrator::plan_trip;
use trip_router::routing::types::{ProviderError, TransitProvider, TransitRouteResponse, WalkingProvider, WalkingRouteResponse};
use trip_router::routing::RoutingClient;

struct StubWalking;
#[async_trait]
impl WalkingProvider for StubWalking {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<WalkingRouteResponse>, ProviderError> {
        let km = trip_router::geo::haversine_km(from, to);
        Ok(Some(WalkingRouteResponse {
            total_duration_min: (km / 4.0) * 60.0 + 1.0,
            total_distance_m: km * 1000.0,
            polyline: None,
        }))
    }
}

struct StubTransit;
#[async_trait]
impl TransitProvider for StubTransit {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<TransitRouteResponse>, ProviderError> {
        let km = trip_router::geo::haversine_km(from, to);
        Ok(Some(TransitRouteResponse {
            total_duration_min: (km / 20.0) * 60.0 + 5.0,
            total_distance_m: km * 1000.0,
            transfer_count: Some(0),
            polyline: None,
            details: None,
        }))
    }
}

fn client() -> RoutingClient {
    RoutingClient::new(Arc::new(StubTransit), Arc::new(StubWalking), PlannerConfig::default())
}

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

/// Scenario 2 (spec §8): loop trip with lodging — first day starts at
/// `__origin__`, both days end at `__accommodation_0__`.
#[tokio::test]
async fn loop_trip_with_lodging_starts_at_origin_and_ends_at_lodging() {
    let waypoints: Vec<Waypoint> = (0..6)
        .map(|i| wp(&format!("wp{i}"), 37.54 + 0.01 * i as f64, 126.99 + 0.01 * i as f64))
        .collect();
    let start = LatLng::new(37.55, 127.0);
    let input = TripInput {
        trip_id: "loop-trip".into(),
        days: 2,
        start,
        end: Some(start),
        lodging: Some(LatLng::new(37.55, 127.0)),
        waypoints,
        daily_max_minutes: None,
        trip_start_date: None,
        check_in_date: None,
        check_in_time: None,
        per_day_time_limits: Vec::new(),
    };

    let routing = client();
    let config = PlannerConfig::default();
    let cancel = CancellationToken::new();
    let output = plan_trip(input, &routing, &config, &cancel).await.unwrap();

    assert_eq!(output.mode, TripMode::Loop);
    assert_eq!(output.day_plans.len(), 2);

    let day1_start = output
        .segment_costs
        .iter()
        .find(|s| s.key.to_id == output.day_plans[0].waypoint_order[0])
        .expect("first day should have a start segment");
    assert_eq!(day1_start.key.from_id, trip_router::model::ORIGIN_ID);

    for plan in &output.day_plans {
        if let Some(last) = plan.waypoint_order.last() {
            let has_lodging_leg = output
                .segment_costs
                .iter()
                .any(|s| &s.key.from_id == last && s.key.to_id == trip_router::model::ACCOMMODATION_ID);
            assert!(has_lodging_leg, "day should end with a leg back to lodging");
        }
    }
}

/// Scenario 3 (spec §8): a waypoint with `fixedDate` two days after
/// `tripStartDate` lands in that day's plan.
#[tokio::test]
async fn fixed_date_pin_lands_in_its_day() {
    let mut waypoints: Vec<Waypoint> = (0..6)
        .map(|i| wp(&format!("wp{i}"), 37.5 + 0.08 * i as f64, 127.0 + 0.08 * i as f64))
        .collect();
    waypoints[0].is_fixed = true;
    waypoints[0].fixed_date = Some("2025-06-03".into());

    let input = TripInput {
        trip_id: "fixed-date-trip".into(),
        days: 3,
        start: LatLng::new(37.5665, 126.978),
        end: None,
        lodging: None,
        waypoints,
        daily_max_minutes: None,
        trip_start_date: Some("2025-06-01".into()),
        check_in_date: None,
        check_in_time: None,
        per_day_time_limits: Vec::new(),
    };

    let routing = client();
    let config = PlannerConfig::default();
    let cancel = CancellationToken::new();
    let output = plan_trip(input, &routing, &config, &cancel).await.unwrap();

    assert!(output.day_plans[2].waypoint_order.contains(&"wp0".to_string()));
}

/// Scenario 5 (spec §8): all waypoints have invalid coordinates, so the
/// whole trip fails `InvalidInput` rather than producing a partial output.
#[tokio::test]
async fn all_invalid_coordinates_fail_fast() {
    let input = TripInput {
        trip_id: "bad-trip".into(),
        days: 1,
        start: LatLng::new(37.5, 127.0),
        end: None,
        lodging: None,
        waypoints: vec![wp("bad1", 91.0, 0.0), wp("bad2", 0.0, -181.0)],
        daily_max_minutes: None,
        trip_start_date: None,
        check_in_date: None,
        check_in_time: None,
        per_day_time_limits: Vec::new(),
    };

    let routing = client();
    let config = PlannerConfig::default();
    let cancel = CancellationToken::new();
    let result = plan_trip(input, &routing, &config, &cancel).await;
    assert!(matches!(result, Err(TripError::InvalidInput(_))));
}
