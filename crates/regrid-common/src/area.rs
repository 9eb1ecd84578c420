//! Bounding areas.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegridError, Result};
use crate::numeric::{same, DEGREE_EPSILON};
use crate::point::{normalise_longitude, Point};

/// A north/west/south/east box in degrees.
///
/// `east` may exceed 360 so that `east - west` is always the covered
/// longitude span. The all-zero area is the "empty" sentinel, meaning
/// unconstrained (let the grid pick its natural global extent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl Area {
    /// Create an area, rejecting inverted latitude bounds.
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self> {
        if north < south {
            return Err(RegridError::geometry_mismatch(format!(
                "area north {} is below south {}",
                north, south
            )));
        }
        if north > 90.0 + DEGREE_EPSILON || south < -90.0 - DEGREE_EPSILON {
            return Err(RegridError::geometry_mismatch(format!(
                "area latitudes {}..{} outside [-90, 90]",
                south, north
            )));
        }
        let west_n = normalise_longitude(west);
        let mut east_n = east - (west - west_n);
        while east_n < west_n - DEGREE_EPSILON {
            east_n += 360.0;
        }
        Ok(Self {
            north,
            west: west_n,
            south,
            east: east_n,
        })
    }

    /// The unconstrained sentinel.
    pub fn empty() -> Self {
        Self {
            north: 0.0,
            west: 0.0,
            south: 0.0,
            east: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.north == 0.0 && self.west == 0.0 && self.south == 0.0 && self.east == 0.0
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Whether the area reaches both poles.
    pub fn is_global_north_south(&self) -> bool {
        same(self.north, 90.0) && same(self.south, -90.0)
    }

    /// Whether points `increment` apart starting at `west` close the circle.
    pub fn is_global_west_east(&self, increment: f64) -> bool {
        self.width() + increment >= 360.0 - DEGREE_EPSILON
    }

    /// Check if a point lies inside, ignoring longitude for full circles.
    pub fn contains(&self, p: &Point) -> bool {
        let lat = p.latitude();
        if lat > self.north + DEGREE_EPSILON || lat < self.south - DEGREE_EPSILON {
            return false;
        }
        if self.width() >= 360.0 - DEGREE_EPSILON {
            return true;
        }
        let mut lon = p.longitude();
        while lon < self.west - DEGREE_EPSILON {
            lon += 360.0;
        }
        lon <= self.east + DEGREE_EPSILON
    }

    /// Compute the intersection of two areas, if any.
    pub fn intersection(&self, other: &Area) -> Option<Area> {
        let north = self.north.min(other.north);
        let south = self.south.max(other.south);
        if north < south - DEGREE_EPSILON {
            return None;
        }
        if self.width() >= 360.0 - DEGREE_EPSILON {
            return Some(Area { north, south, ..*other });
        }
        if other.width() >= 360.0 - DEGREE_EPSILON {
            return Some(Area { north, south, ..*self });
        }
        // Try the other box shifted by a full turn in both directions.
        for shift in [0.0, 360.0, -360.0] {
            let w = self.west.max(other.west + shift);
            let e = self.east.min(other.east + shift);
            if e >= w - DEGREE_EPSILON {
                return Some(Area {
                    north,
                    west: normalise_longitude(w),
                    south,
                    east: normalise_longitude(w) + (e - w),
                });
            }
        }
        None
    }

    /// Structural equality within the degree tolerance.
    pub fn same_as(&self, other: &Area) -> bool {
        same(self.north, other.north)
            && same(self.south, other.south)
            && same(self.west, other.west)
            && same(self.east, other.east)
    }

    /// Generate a cache key fragment (quantized to avoid floating point issues).
    pub fn cache_key(&self) -> String {
        format!(
            "{:.6}_{:.6}_{:.6}_{:.6}",
            self.north, self.west, self.south, self.east
        )
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[N {:.5} W {:.5} S {:.5} E {:.5}]",
            self.north, self.west, self.south, self.east
        )
    }
}
