//! Concrete HTTP implementations of [`TransitProvider`]/[`WalkingProvider`]
//! against black-box routing endpoints (spec §6). Grounded on the teacher's
//! `OsrmClient` (`osrm.rs`): a `reqwest::Client` held behind a small config
//! struct, one method per endpoint, deserializing only the fields the
//! engine cares about.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::model::LatLng;

use super::types::{
    ProviderError, TransitProvider, TransitRouteResponse, WalkingProvider, WalkingRouteResponse, WireSubpath,
    WireTransitDetails,
};

/// Endpoint configuration for the two black-box routing services.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub transit_base_url: String,
    pub walking_base_url: String,
    pub timeout: Duration,
}

pub struct HttpTransitProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

pub struct HttpWalkingProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpTransitProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(config.timeout).build().expect("reqwest client"),
            config,
        }
    }
}

impl HttpWalkingProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(config.timeout).build().expect("reqwest client"),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWireSubpath {
    #[serde(rename = "trafficType")]
    traffic_type: i32,
    distance: f64,
    #[serde(rename = "sectionTime")]
    section_time: f64,
    #[serde(rename = "startCoord")]
    start_coord: Option<[f64; 2]>,
    #[serde(rename = "endCoord")]
    end_coord: Option<[f64; 2]>,
    #[serde(rename = "stationCount")]
    station_count: Option<i32>,
    lane: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransitDetails {
    #[serde(rename = "totalFare")]
    total_fare: Option<f64>,
    #[serde(rename = "walkingTime")]
    walking_time: Option<f64>,
    #[serde(rename = "walkingDistance")]
    walking_distance: Option<f64>,
    #[serde(rename = "subPaths", default)]
    sub_paths: Vec<RawWireSubpath>,
}

#[derive(Debug, Deserialize)]
struct RawTransitResponse {
    #[serde(rename = "totalDuration_min")]
    total_duration_min: f64,
    #[serde(rename = "totalDistance_m")]
    total_distance_m: f64,
    #[serde(rename = "transferCount")]
    transfer_count: Option<i32>,
    polyline: Option<String>,
    details: Option<RawTransitDetails>,
}

#[derive(Debug, Deserialize)]
struct RawWalkingResponse {
    #[serde(rename = "totalDuration_min")]
    total_duration_min: f64,
    #[serde(rename = "totalDistance_m")]
    total_distance_m: f64,
    polyline: Option<String>,
}

fn to_latlng(pair: [f64; 2]) -> LatLng {
    LatLng::new(pair[0], pair[1])
}

fn map_reqwest_err(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if let Some(status) = err.status() {
        ProviderError::ServerError(status.as_u16())
    } else {
        ProviderError::RequestFailed(err.to_string())
    }
}

#[async_trait]
impl TransitProvider for HttpTransitProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<TransitRouteResponse>, ProviderError> {
        let resp = self
            .client
            .get(&self.config.transit_base_url)
            .query(&[("fromLat", from.lat), ("fromLng", from.lng), ("toLat", to.lat), ("toLng", to.lng)])
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::ServerError(resp.status().as_u16()));
        }

        let raw: Option<RawTransitResponse> =
            resp.json().await.map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(raw.map(|r| TransitRouteResponse {
            total_duration_min: r.total_duration_min,
            total_distance_m: r.total_distance_m,
            transfer_count: r.transfer_count,
            polyline: r.polyline,
            details: r.details.map(|d| WireTransitDetails {
                total_fare: d.total_fare,
                walking_time: d.walking_time,
                walking_distance: d.walking_distance,
                sub_paths: d
                    .sub_paths
                    .into_iter()
                    .map(|sp| WireSubpath {
                        traffic_type: sp.traffic_type,
                        distance: sp.distance,
                        section_time: sp.section_time,
                        start_coord: sp.start_coord.map(to_latlng),
                        end_coord: sp.end_coord.map(to_latlng),
                        station_count: sp.station_count,
                        lane: sp.lane,
                    })
                    .collect(),
            }),
        }))
    }
}

#[async_trait]
impl WalkingProvider for HttpWalkingProvider {
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Option<WalkingRouteResponse>, ProviderError> {
        let resp = self
            .client
            .get(&self.config.walking_base_url)
            .query(&[("fromLat", from.lat), ("fromLng", from.lng), ("toLat", to.lat), ("toLng", to.lng)])
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::ServerError(resp.status().as_u16()));
        }

        let raw: Option<RawWalkingResponse> =
            resp.json().await.map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(raw.map(|r| WalkingRouteResponse {
            total_duration_min: r.total_duration_min,
            total_distance_m: r.total_distance_m,
            polyline: r.polyline,
        }))
    }
}
