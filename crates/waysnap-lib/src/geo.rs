//! Planar geometry helpers for short distances on the earth's surface.
//!
//! All distances are approximations: latitude degrees have a fixed length and
//! longitude degrees shrink with the cosine of the latitude. This is accurate
//! enough for preflight checks and nearest-edge snapping over a few tiles.

use serde::{Deserialize, Serialize};

/// Length of one degree of latitude in metres.
pub const METERS_PER_DEGREE_LAT: f64 = 110_567.0;

/// Coordinates closer than this (in degrees) are treated as the same point.
pub const COORDINATE_EPSILON: f64 = 1e-7;

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether the coordinates are finite and within the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Whether two points coincide within [`COORDINATE_EPSILON`].
    pub fn approx_eq(&self, other: &LatLng) -> bool {
        (self.lat - other.lat).abs() < COORDINATE_EPSILON
            && (self.lon - other.lon).abs() < COORDINATE_EPSILON
    }
}

/// Metres per degree of longitude at the given latitude.
pub fn meters_per_lon_degree(lat: f64) -> f64 {
    METERS_PER_DEGREE_LAT * lat.to_radians().cos()
}

/// Squared approximate distance in square metres.
pub fn distance_squared(a: LatLng, b: LatLng) -> f64 {
    let dy = (a.lat - b.lat) * METERS_PER_DEGREE_LAT;
    let dx = (a.lon - b.lon) * meters_per_lon_degree((a.lat + b.lat) * 0.5);
    dx * dx + dy * dy
}

/// Approximate straight-line distance in metres.
pub fn distance(a: LatLng, b: LatLng) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Initial bearing from `from` to `to` in degrees clockwise from north, in `[0, 360)`.
pub fn bearing(from: LatLng, to: LatLng) -> f64 {
    let dy = (to.lat - from.lat) * METERS_PER_DEGREE_LAT;
    let dx = (to.lon - from.lon) * meters_per_lon_degree((from.lat + to.lat) * 0.5);
    let degrees = dx.atan2(dy).to_degrees();
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Smallest absolute difference between two headings, in `[0, 180]`.
pub fn heading_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(360.0);
    if delta > 180.0 {
        360.0 - delta
    } else {
        delta
    }
}

/// Project `point` onto the segment `start`-`end`.
///
/// Returns the closest point on the segment and its position along the
/// segment as a fraction in `[0, 1]`.
pub fn project(point: LatLng, start: LatLng, end: LatLng) -> (LatLng, f64) {
    let lon_scale = point.lat.to_radians().cos();
    let ax = (end.lon - start.lon) * lon_scale;
    let ay = end.lat - start.lat;
    let px = (point.lon - start.lon) * lon_scale;
    let py = point.lat - start.lat;

    let length_squared = ax * ax + ay * ay;
    if length_squared == 0.0 {
        return (start, 0.0);
    }

    let fraction = ((px * ax + py * ay) / length_squared).clamp(0.0, 1.0);
    let snapped = LatLng::new(
        start.lat + (end.lat - start.lat) * fraction,
        start.lon + (end.lon - start.lon) * fraction,
    );
    (snapped, fraction)
}
