//! Routing subsystem: cached, circuit-broken, retried segment fetches
//! against black-box transit/walking providers (spec §4.7, §6).

pub mod breaker;
pub mod cache;
pub mod client;
pub mod provider;
pub mod types;

pub use client::RoutingClient;
pub use provider::{HttpProviderConfig, HttpTransitProvider, HttpWalkingProvider};
pub use types::{ProviderError, RoutingRequest, TransitProvider, WalkingProvider};
