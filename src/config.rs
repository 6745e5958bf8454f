//! Process-wide planner knobs (spec §6).
//!
//! Mirrors the teacher's `OsrmConfig::default()` pattern: named constants
//! promoted to struct fields so tests can override them.

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Max simultaneous outbound routing requests across all callers.
    pub routing_concurrency: usize,
    /// Retry attempts per routing request before falling back.
    pub retry_count: u32,
    /// Backoff base in milliseconds: `base * 2^attempt`.
    pub backoff_base_ms: u64,
    /// Consecutive failures before the circuit breaker opens.
    pub breaker_failure_threshold: u32,
    /// Time the breaker stays open before allowing a half-open probe.
    pub breaker_timeout: std::time::Duration,
    /// Segment cache capacity (entries).
    pub cache_capacity: usize,
    /// Segment cache entry time-to-live.
    pub cache_ttl: std::time::Duration,
    /// Interval between TTL sweeps.
    pub cache_sweep_interval: std::time::Duration,
    /// Distance (meters) at or below which the walking provider is used
    /// directly instead of transit.
    pub walk_distance_cutoff_m: f64,
    /// `k` for the k-NN adjacency radius estimate in zoning.
    pub knn_k: usize,
    /// Multiplier applied to the median k-NN distance to get the zoning radius.
    pub radius_multiplier: f64,
    /// Fractional flexibility allowed above `targetPerDay` before a zone is
    /// considered overloaded by size.
    pub cluster_flexibility: f64,
    /// Max reconciliation (Phase A/B) rounds.
    pub reconciliation_rounds: u32,
    /// Fraction of waypoints Phase A may remove at most.
    pub max_proxy_removal_fraction: f64,
    /// Overload-split scoring: size overflow penalty weight.
    pub overload_size_penalty: f64,
    /// Overload-split scoring: minutes overflow penalty weight.
    pub overload_minutes_penalty: f64,
    /// Bounded 3-opt-style smoothing passes for cluster ordering.
    pub smoothing_passes: u32,
    /// Minimum improvement (meters) required to accept a smoothing swap.
    pub smoothing_threshold_m: f64,
    /// Max 2-opt decrossing iterations within a cluster.
    pub two_opt_iterations: u32,
    /// Soft per-request timeout for outbound routing calls.
    pub request_timeout: std::time::Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            routing_concurrency: 3,
            retry_count: 3,
            backoff_base_ms: 200,
            breaker_failure_threshold: 5,
            breaker_timeout: std::time::Duration::from_secs(30),
            cache_capacity: 5000,
            cache_ttl: std::time::Duration::from_secs(60 * 60),
            cache_sweep_interval: std::time::Duration::from_secs(10 * 60),
            walk_distance_cutoff_m: 700.0,
            knn_k: 3,
            radius_multiplier: 1.2,
            cluster_flexibility: 0.4,
            reconciliation_rounds: 3,
            max_proxy_removal_fraction: 0.5,
            overload_size_penalty: 5.0,
            overload_minutes_penalty: 1.0,
            smoothing_passes: 5,
            smoothing_threshold_m: 100.0,
            two_opt_iterations: 50,
            request_timeout: std::time::Duration::from_secs(15),
        }
    }
}
