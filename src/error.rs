//! Error types surfaced by the planner (spec §7).

use thiserror::Error;

/// Top-level failure modes of [`crate::orchestrator::plan_trip`].
///
/// Routing failures never reach this type directly — the routing client
/// degrades to a fallback [`crate::model::SegmentCost`] instead (see
/// `routing::client`). Only reconciliation's inability to meet a budget, or
/// invalid/empty input, surfaces here.
#[derive(Debug, Error)]
pub enum TripError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("clustering produced no non-empty clusters")]
    ClusteringFailure,

    #[error("trip computation was cancelled")]
    Cancelled,
}

pub type TripResult<T> = Result<T, TripError>;
