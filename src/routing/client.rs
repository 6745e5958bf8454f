//! Bounded-concurrency async routing client: cache-before-fetch,
//! breaker-before-fetch, per-attempt retry/backoff, walking/transit mode
//! switch (spec §4.7, §5, §9).
//!
//! Grounded on the teacher's `OsrmClient` (`osrm.rs`) adapter shape,
//! generalized from a single blocking distance-matrix call to the async,
//! retried, circuit-broken, cached point-to-point fetch this spec requires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::PlannerConfig;
use crate::error::TripError;
use crate::geo::haversine_m;
use crate::model::{LatLng, SegmentCost, TrafficType, TransitDetails, TransitSubpath};

use super::breaker::{Admission, CircuitBreaker};
use super::cache::SegmentCache;
use super::types::{
    ProviderError, RoutingRequest, TransitProvider, TransitRouteResponse, WalkingProvider, WalkingRouteResponse,
};

/// 4 km/h synthetic walking estimate used when the walking provider itself
/// fails (spec §4.7 mode routing).
const SYNTHETIC_WALK_KMH: f64 = 4.0;
/// Fallback speed bracket boundary (meters).
const FALLBACK_WALK_CUTOFF_M: f64 = 500.0;
/// Fallback driving-equivalent speed (km/h) for longer fallback segments.
const FALLBACK_DRIVE_KMH: f64 = 20.0;

#[derive(Clone)]
pub struct RoutingClient {
    transit: Arc<dyn TransitProvider>,
    walking: Arc<dyn WalkingProvider>,
    cache: Arc<SegmentCache>,
    breaker: Arc<CircuitBreaker>,
    semaphore: Arc<Semaphore>,
    config: Arc<PlannerConfig>,
}

impl RoutingClient {
    pub fn new(transit: Arc<dyn TransitProvider>, walking: Arc<dyn WalkingProvider>, config: PlannerConfig) -> Self {
        let config = Arc::new(config);
        Self {
            cache: Arc::new(SegmentCache::new(config.cache_capacity, config.cache_ttl)),
            breaker: Arc::new(CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_timeout)),
            semaphore: Arc::new(Semaphore::new(config.routing_concurrency)),
            transit,
            walking,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<SegmentCache> {
        &self.cache
    }

    pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
        super::cache::spawn_sweeper(self.cache.clone(), self.config.cache_sweep_interval)
    }

    /// Fetches costs for every request, in input order, bounded to
    /// `config.routing_concurrency` simultaneous outbound calls (spec §5).
    /// Honors `cancel`: if triggered, in-flight fetches are abandoned and
    /// `Err(TripError::Cancelled)` is returned with no partial output.
    pub async fn fetch_segments(
        &self,
        requests: Vec<RoutingRequest>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SegmentCost>, TripError> {
        let mut tasks = Vec::with_capacity(requests.len());
        for req in requests {
            let client = self.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = client.semaphore.acquire().await.expect("semaphore closed");
                client.fetch_segment(&req).await
            }));
        }

        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TripError::Cancelled);
                }
                result = task => {
                    out.push(result.expect("routing task panicked"));
                }
            }
        }
        Ok(out)
    }

    async fn fetch_segment(&self, req: &RoutingRequest) -> SegmentCost {
        if let Some(mut cached) = self.cache.get(req.from, req.to).await {
            cached.key = crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone());
            return cached;
        }

        let dist_m = haversine_m(req.from, req.to);

        let mut cost = if dist_m <= self.config.walk_distance_cutoff_m {
            self.fetch_walking(req, dist_m).await
        } else {
            self.fetch_transit(req, dist_m).await
        };

        cost.key = crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone());
        cost
    }

    async fn fetch_walking(&self, req: &RoutingRequest, dist_m: f64) -> SegmentCost {
        match self.call_with_retry(|| self.walking.route(req.from, req.to)).await {
            Some(resp) => {
                let cost = walking_cost(req, &resp);
                self.cache.insert(req.from, req.to, cost.clone()).await;
                cost
            }
            None => {
                let cost = synthesize_walking(req, dist_m);
                self.cache.insert(req.from, req.to, cost.clone()).await;
                cost
            }
        }
    }

    async fn fetch_transit(&self, req: &RoutingRequest, dist_m: f64) -> SegmentCost {
        match self.breaker.admit().await {
            Admission::ShortCircuit => fallback_cost(req, dist_m),
            Admission::Allow => match self.call_with_retry(|| self.transit.route(req.from, req.to)).await {
                Some(resp) => {
                    self.breaker.record_success().await;
                    let mut cost = transit_cost(req, &resp);
                    self.enrich_walk_polylines(&mut cost).await;
                    self.cache.insert(req.from, req.to, cost.clone()).await;
                    cost
                }
                None => {
                    self.breaker.record_failure().await;
                    fallback_cost(req, dist_m)
                }
            },
        }
    }

    /// Retries up to `config.retry_count` attempts with `200 * 2^attempt` ms
    /// backoff between attempts. A `None` route or provider error both
    /// count as a failed attempt (spec §4.7 "on missing-route or network
    /// error, retry").
    async fn call_with_retry<T, F, Fut>(&self, call: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>, ProviderError>>,
    {
        for attempt in 0..self.config.retry_count {
            match call().await {
                Ok(Some(result)) => return Some(result),
                Ok(None) => warn!(attempt, "routing: provider returned no route"),
                Err(err) => warn!(attempt, ?err, "routing: provider call failed"),
            }
            if attempt + 1 < self.config.retry_count {
                let backoff = self.config.backoff_base_ms * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        None
    }

    /// Best-effort enrichment: walking subpaths inside a transit path may be
    /// given a polyline by calling the walking provider for each inner walk.
    /// Failures are silent (spec §4.7).
    async fn enrich_walk_polylines(&self, cost: &mut SegmentCost) {
        let Some(details) = cost.transit_details.as_mut() else {
            return;
        };
        for sub in details.subpaths.iter_mut() {
            if sub.traffic_type != Some(TrafficType::Walk) || sub.polyline.is_some() {
                continue;
            }
            let (Some(from), Some(to)) = (sub.start_coord, sub.end_coord) else {
                continue;
            };
            if let Ok(Some(resp)) = self.walking.route(from, to).await {
                sub.polyline = resp.polyline;
            }
        }
    }
}

fn walking_cost(req: &RoutingRequest, resp: &WalkingRouteResponse) -> SegmentCost {
    SegmentCost {
        key: crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone()),
        duration_minutes: resp.total_duration_min,
        distance_meters: resp.total_distance_m,
        transfers: None,
        polyline: resp.polyline.clone(),
        transit_details: Some(TransitDetails {
            fare: None,
            subpaths: vec![TransitSubpath {
                traffic_type: Some(TrafficType::Walk),
                distance_meters: resp.total_distance_m,
                section_time_seconds: resp.total_duration_min * 60.0,
                start_coord: Some(req.from),
                end_coord: Some(req.to),
                station_count: None,
                lane: None,
                polyline: resp.polyline.clone(),
            }],
        }),
        is_fallback: false,
    }
}

fn synthesize_walking(req: &RoutingRequest, dist_m: f64) -> SegmentCost {
    let duration = crate::geo::km_to_minutes(dist_m / 1000.0, SYNTHETIC_WALK_KMH);
    SegmentCost {
        key: crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone()),
        duration_minutes: duration,
        distance_meters: dist_m,
        transfers: None,
        polyline: None,
        transit_details: None,
        is_fallback: true,
    }
}

/// Fallback cost used when the transit provider is unreachable or the
/// circuit breaker is open (spec §4.7/§7 `RoutingTransient`/`RoutingOpen`).
fn fallback_cost(req: &RoutingRequest, dist_m: f64) -> SegmentCost {
    let dist_km = dist_m / 1000.0;
    let duration = if dist_m < FALLBACK_WALK_CUTOFF_M {
        crate::geo::km_to_minutes(dist_km, SYNTHETIC_WALK_KMH)
    } else {
        (dist_km / FALLBACK_DRIVE_KMH) * 60.0 + 5.0
    };
    SegmentCost {
        key: crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone()),
        duration_minutes: duration,
        distance_meters: dist_m,
        transfers: None,
        polyline: None,
        transit_details: None,
        is_fallback: true,
    }
}

fn transit_cost(req: &RoutingRequest, resp: &TransitRouteResponse) -> SegmentCost {
    let transit_details = resp.details.as_ref().map(|details| {
        let mut subpaths: Vec<TransitSubpath> = details
            .sub_paths
            .iter()
            .map(|sp| TransitSubpath {
                traffic_type: TrafficType::from_code(sp.traffic_type),
                distance_meters: sp.distance,
                section_time_seconds: sp.section_time,
                start_coord: sp.start_coord,
                end_coord: sp.end_coord,
                station_count: sp.station_count,
                lane: sp.lane.clone(),
                polyline: None,
            })
            .collect();

        fill_missing_stop_coords(&mut subpaths, req.from, req.to);

        TransitDetails {
            fare: details.total_fare,
            subpaths,
        }
    });

    SegmentCost {
        key: crate::model::SegmentKey::new(req.from_id.clone(), req.to_id.clone()),
        duration_minutes: resp.total_duration_min,
        distance_meters: resp.total_distance_m,
        transfers: resp.transfer_count,
        polyline: resp.polyline.clone(),
        transit_details,
        is_fallback: false,
    }
}

/// Walking subpaths lacking stop coordinates inherit from adjacent
/// non-walking subpaths; the first subpath's start and the last subpath's
/// end are filled from the request's origin/destination when absent
/// (spec §4.7 post-processing).
fn fill_missing_stop_coords(subpaths: &mut [TransitSubpath], origin: LatLng, destination: LatLng) {
    for i in 0..subpaths.len() {
        if subpaths[i].start_coord.is_none() {
            subpaths[i].start_coord = if i == 0 {
                Some(origin)
            } else {
                subpaths[i - 1].end_coord
            };
        }
        if subpaths[i].end_coord.is_none() {
            subpaths[i].end_coord = if i + 1 == subpaths.len() {
                Some(destination)
            } else {
                subpaths[i + 1].start_coord
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentKey;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysWalk {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WalkingProvider for AlwaysWalk {
        async fn route(&self, _from: LatLng, _to: LatLng) -> Result<Option<WalkingRouteResponse>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(WalkingRouteResponse {
                total_duration_min: 5.0,
                total_distance_m: 400.0,
                polyline: None,
            }))
        }
    }

    struct AlwaysFailTransit {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransitProvider for AlwaysFailTransit {
        async fn route(&self, _from: LatLng, _to: LatLng) -> Result<Option<TransitRouteResponse>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::RequestFailed("boom".into()))
        }
    }

    struct NeverCalledTransit;
    #[async_trait]
    impl TransitProvider for NeverCalledTransit {
        async fn route(&self, _from: LatLng, _to: LatLng) -> Result<Option<TransitRouteResponse>, ProviderError> {
            panic!("transit should not be called for short distances");
        }
    }

    #[tokio::test]
    async fn short_distance_uses_walking_provider() {
        let walking = Arc::new(AlwaysWalk { calls: AtomicUsize::new(0) });
        let transit = Arc::new(NeverCalledTransit);
        let mut config = PlannerConfig::default();
        config.retry_count = 1;
        let client = RoutingClient::new(transit, walking.clone(), config);

        let req = RoutingRequest {
            from_id: "a".into(),
            to_id: "b".into(),
            from: LatLng::new(37.5, 127.0),
            to: LatLng::new(37.5005, 127.0),
        };
        let token = CancellationToken::new();
        let out = client.fetch_segments(vec![req], &token).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, SegmentKey::new("a", "b"));
        assert_eq!(walking.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transit_failure_falls_back_and_opens_breaker() {
        let walking = Arc::new(AlwaysWalk { calls: AtomicUsize::new(0) });
        let transit = Arc::new(AlwaysFailTransit { calls: AtomicUsize::new(0) });
        let mut config = PlannerConfig::default();
        config.retry_count = 1;
        config.breaker_failure_threshold = 1;
        let client = RoutingClient::new(transit.clone(), walking, config);

        let req = RoutingRequest {
            from_id: "a".into(),
            to_id: "b".into(),
            from: LatLng::new(37.5, 127.0),
            to: LatLng::new(38.0, 128.0),
        };
        let token = CancellationToken::new();
        let out = client.fetch_segments(vec![req], &token).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].duration_minutes >= 1.0);
        assert_eq!(transit.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_provider_call() {
        let walking = Arc::new(AlwaysWalk { calls: AtomicUsize::new(0) });
        let transit = Arc::new(NeverCalledTransit);
        let mut config = PlannerConfig::default();
        config.retry_count = 1;
        let client = RoutingClient::new(transit, walking.clone(), config);

        let from = LatLng::new(37.5, 127.0);
        let to = LatLng::new(37.5005, 127.0);
        let req = RoutingRequest {
            from_id: "a".into(),
            to_id: "b".into(),
            from,
            to,
        };
        let token = CancellationToken::new();
        client.fetch_segments(vec![req.clone()], &token).await.unwrap();
        assert_eq!(walking.calls.load(Ordering::SeqCst), 1);

        let req2 = RoutingRequest {
            from_id: "x".into(),
            to_id: "y".into(),
            ..req
        };
        let out2 = client.fetch_segments(vec![req2], &token).await.unwrap();
        assert_eq!(walking.calls.load(Ordering::SeqCst), 1, "second call should hit cache");
        assert_eq!(out2[0].key, SegmentKey::new("x", "y"));
    }
}
