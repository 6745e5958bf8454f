//! Geo primitives: haversine distance, centroid, direction vectors,
//! segment-intersection test (spec §2, §4.1-§4.4).

use crate::model::LatLng;

/// Earth radius in meters, matching the teacher's `haversine.rs` constant
/// (converted from km).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_m(from: LatLng, to: LatLng) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

pub fn haversine_km(from: LatLng, to: LatLng) -> f64 {
    haversine_m(from, to) / 1000.0
}

/// Converts a distance in km to minutes at the given km/h rate.
pub fn km_to_minutes(km: f64, kmh: f64) -> f64 {
    if kmh <= 0.0 {
        return 0.0;
    }
    (km / kmh) * 60.0
}

/// Centroid (mean lat/lng) of a set of points. Panics on an empty slice —
/// callers always guard on non-empty groups (zones/clusters are never
/// constructed empty of coordinates).
pub fn centroid(points: &[LatLng]) -> LatLng {
    let n = points.len() as f64;
    let (sum_lat, sum_lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    LatLng::new(sum_lat / n, sum_lng / n)
}

/// A 2D vector in an equirectangular-ish (lat, lng) plane. Distances in this
/// module are small-scale (within a trip's geographic footprint) so the flat
/// approximation used for projections/cross-products is adequate; exact
/// distances always go through [`haversine_m`].
#[derive(Debug, Clone, Copy)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn from_points(from: LatLng, to: LatLng) -> Self {
        Self {
            x: to.lng - from.lng,
            y: to.lat - from.lat,
        }
    }

    pub fn len(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(&self, other: &Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Unit direction vector from `from` to `to`. Returns `(0, 0)` when the
    /// points coincide (degenerate axis — callers treat this as "no
    /// preferred direction").
    pub fn unit(from: LatLng, to: LatLng) -> Self {
        let v = Self::from_points(from, to);
        let len = v.len();
        if len < 1e-12 {
            Self { x: 0.0, y: 0.0 }
        } else {
            Self {
                x: v.x / len,
                y: v.y / len,
            }
        }
    }
}

/// Scalar projection of `(point - origin)` onto unit axis `d`.
pub fn scalar_projection(origin: LatLng, point: LatLng, d: Vec2) -> f64 {
    Vec2::from_points(origin, point).dot(&d)
}

/// Strict segment-intersection test (spec §4.4 2-opt decrossing): do segments
/// `(a0,a1)` and `(b0,b1)` cross, using sign-change cross products. Shared
/// endpoints do not count as a crossing.
pub fn segments_intersect(a0: LatLng, a1: LatLng, b0: LatLng, b1: LatLng) -> bool {
    let d1 = Vec2::from_points(a0, a1);
    let d2 = Vec2::from_points(b0, b1);

    let d1_to_b0 = Vec2::from_points(a0, b0).cross(&d1);
    let d1_to_b1 = Vec2::from_points(a0, b1).cross(&d1);
    let d2_to_a0 = Vec2::from_points(b0, a0).cross(&d2);
    let d2_to_a1 = Vec2::from_points(b0, a1).cross(&d2);

    (d1_to_b0 > 0.0) != (d1_to_b1 > 0.0) && (d2_to_a0 > 0.0) != (d2_to_a1 > 0.0)
}
