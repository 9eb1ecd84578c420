//! Spherical cells: bounds, areas and overlaps on the unit sphere.

use serde::{Deserialize, Serialize};

/// A latitude/longitude box in degrees. `east - west` is the span and may
/// cross 360.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl CellBounds {
    /// Area on the unit sphere (steradians).
    pub fn area(&self) -> f64 {
        let n = self.north.clamp(-90.0, 90.0).to_radians();
        let s = self.south.clamp(-90.0, 90.0).to_radians();
        (n.sin() - s.sin()).max(0.0) * (self.east - self.west).max(0.0).to_radians()
    }

    /// Area of the intersection with `other`, trying the longitude shifts
    /// that can make the boxes meet.
    pub fn overlap(&self, other: &CellBounds) -> f64 {
        let north = self.north.min(other.north);
        let south = self.south.max(other.south);
        if north <= south {
            return 0.0;
        }
        let band = north.to_radians().sin() - south.to_radians().sin();
        let mut width = 0.0;
        for shift in [-360.0, 0.0, 360.0] {
            let w = self.west.max(other.west + shift);
            let e = self.east.min(other.east + shift);
            if e > w {
                width += e - w;
            }
        }
        band * width.min(360.0).to_radians()
    }

    /// Whether the point lies inside, edges included.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if latitude > self.north + 1e-9 || latitude < self.south - 1e-9 {
            return false;
        }
        if self.east - self.west >= 360.0 - 1e-9 {
            return true;
        }
        let mut lon = longitude;
        while lon < self.west - 1e-9 {
            lon += 360.0;
        }
        while lon > self.east + 1e-9 && lon - 360.0 >= self.west - 1e-9 {
            lon -= 360.0;
        }
        lon <= self.east + 1e-9
    }
}
