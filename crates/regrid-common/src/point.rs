//! Geographic points.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::numeric::same;

/// A geographic location in degrees.
///
/// Longitude is always normalised to `[0, 360)`; latitude is kept as given
/// and is expected to lie in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    latitude: f64,
    longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude: normalise_longitude(longitude),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// True for points at either pole.
    pub fn is_pole(&self) -> bool {
        same(self.latitude.abs(), 90.0)
    }

    /// Unit vector on the sphere.
    pub fn to_cartesian(&self) -> [f64; 3] {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }

    /// Inverse of [`Point::to_cartesian`] for a (not necessarily unit) vector.
    pub fn from_cartesian(v: [f64; 3]) -> Self {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if norm == 0.0 {
            return Self::new(0.0, 0.0);
        }
        let z = (v[2] / norm).clamp(-1.0, 1.0);
        let latitude = z.asin().to_degrees();
        let longitude = if v[0].abs() < 1e-15 && v[1].abs() < 1e-15 {
            0.0
        } else {
            v[1].atan2(v[0]).to_degrees()
        };
        Self::new(latitude, longitude)
    }

    /// Great-circle angular distance in radians (haversine form).
    pub fn angular_distance(&self, other: &Point) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }

    /// Same position within the degree tolerance, treating all longitudes at
    /// a pole as equal.
    pub fn same_position(&self, other: &Point) -> bool {
        if !same(self.latitude, other.latitude) {
            return false;
        }
        if self.is_pole() {
            return true;
        }
        same(longitude_difference(self.longitude, other.longitude), 0.0)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Map any longitude into `[0, 360)`.
pub fn normalise_longitude(lon: f64) -> f64 {
    let mut l = lon % 360.0;
    if l < 0.0 {
        l += 360.0;
    }
    if l >= 360.0 || same(l, 360.0) {
        l = 0.0;
    }
    l
}

/// Smallest signed difference `b - a` in `(-180, 180]`.
pub fn longitude_difference(a: f64, b: f64) -> f64 {
    let mut d = (b - a) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}
