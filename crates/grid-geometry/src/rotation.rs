//! Rotated-pole coordinate transformations.
//!
//! A rotated grid is defined by the geographic position of its south pole.
//! Rotated coordinates map to geographic ones by a rotation about the y axis
//! through `90 + south_pole_latitude`, followed by a longitude shift of
//! `south_pole_longitude`.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use regrid_common::{numeric::same, Point};

/// South-pole rotation parameters in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub south_pole_latitude: f64,
    pub south_pole_longitude: f64,
}

impl Rotation {
    pub fn new(south_pole_latitude: f64, south_pole_longitude: f64) -> Self {
        Self {
            south_pole_latitude,
            south_pole_longitude,
        }
    }

    /// A rotation that leaves every point in place.
    pub fn is_identity(&self) -> bool {
        same(self.south_pole_latitude, -90.0) && same(self.south_pole_longitude, 0.0)
    }

    pub fn same_as(&self, other: &Rotation) -> bool {
        same(self.south_pole_latitude, other.south_pole_latitude)
            && same(self.south_pole_longitude, other.south_pole_longitude)
    }

    fn tilt(&self) -> f64 {
        (90.0 + self.south_pole_latitude).to_radians()
    }

    /// Rotated coordinates to geographic coordinates.
    pub fn unrotate(&self, rotated: &Point) -> Point {
        let v = Vector3::from(rotated.to_cartesian());
        let r = Rotation3::from_axis_angle(&Vector3::y_axis(), -self.tilt());
        let g = r * v;
        let p = Point::from_cartesian([g.x, g.y, g.z]);
        Point::new(p.latitude(), p.longitude() + self.south_pole_longitude)
    }

    /// Geographic coordinates to rotated coordinates.
    pub fn rotate(&self, geographic: &Point) -> Point {
        let shifted = Point::new(
            geographic.latitude(),
            geographic.longitude() - self.south_pole_longitude,
        );
        let v = Vector3::from(shifted.to_cartesian());
        let r = Rotation3::from_axis_angle(&Vector3::y_axis(), self.tilt());
        let g = r * v;
        Point::from_cartesian([g.x, g.y, g.z])
    }

    /// Geographic position of the rotated north pole.
    pub fn rotated_north_pole(&self) -> Point {
        self.unrotate(&Point::new(90.0, 0.0))
    }

    /// Bearing, in radians clockwise from geographic north, of the rotated
    /// frame's north direction at a geographic point.
    pub fn north_bearing(&self, geographic: &Point) -> f64 {
        if self.is_identity() {
            return 0.0;
        }
        let pole = self.rotated_north_pole();
        if geographic.same_position(&pole) {
            return 0.0;
        }
        let lat1 = geographic.latitude().to_radians();
        let lat2 = pole.latitude().to_radians();
        let dlon = (pole.longitude() - geographic.longitude()).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        if x.abs() < 1e-15 && y.abs() < 1e-15 {
            return 0.0;
        }
        y.atan2(x)
    }

    /// Express geographic wind components in the rotated frame.
    pub fn wind_to_rotated(&self, geographic: &Point, u: f64, v: f64) -> (f64, f64) {
        let beta = self.north_bearing(geographic);
        let (s, c) = beta.sin_cos();
        (u * c - v * s, u * s + v * c)
    }

    /// Express rotated-frame wind components geographically.
    pub fn wind_to_geographic(&self, geographic: &Point, u: f64, v: f64) -> (f64, f64) {
        let beta = self.north_bearing(geographic);
        let (s, c) = beta.sin_cos();
        (u * c + v * s, -u * s + v * c)
    }
}
