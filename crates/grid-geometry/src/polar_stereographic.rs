//! Polar stereographic projection.
//!
//! Spherical projection true at `true_latitude` (60 degrees by default),
//! centred on either pole. Grid indices run `i` along x and `j` along y
//! from the first grid point, with `dx`/`dy` in metres.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use regrid_common::{numeric::same, Point, RegridError, Result, EARTH_RADIUS};

/// Polar stereographic grid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarStereographic {
    /// Number of points along x
    pub nx: usize,
    /// Number of points along y
    pub ny: usize,
    /// Grid spacing along x (metres)
    pub dx: f64,
    /// Grid spacing along y (metres, negative when rows run away from the pole)
    pub dy: f64,
    /// Latitude of the first grid point (degrees)
    pub first_latitude: f64,
    /// Longitude of the first grid point (degrees)
    pub first_longitude: f64,
    /// Orientation of the grid, the meridian parallel to y (degrees)
    pub orientation: f64,
    /// Projection centred on the south pole
    pub south_pole: bool,
    /// Latitude at which the projection is true (degrees)
    pub true_latitude: f64,
    // Projected coordinates of the first point, in metres.
    x0: f64,
    y0: f64,
}

impl PolarStereographic {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        first_latitude: f64,
        first_longitude: f64,
        orientation: f64,
        south_pole: bool,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(RegridError::geometry_mismatch(
                "polar stereographic grid needs at least one point",
            ));
        }
        if dx == 0.0 || dy == 0.0 {
            return Err(RegridError::geometry_mismatch(
                "polar stereographic spacing must be non-zero",
            ));
        }
        let mut grid = Self {
            nx,
            ny,
            dx,
            dy,
            first_latitude,
            first_longitude,
            orientation,
            south_pole,
            true_latitude: if south_pole { -60.0 } else { 60.0 },
            x0: 0.0,
            y0: 0.0,
        };
        let (x0, y0) = grid.project(first_latitude, first_longitude);
        grid.x0 = x0;
        grid.y0 = y0;
        Ok(grid)
    }

    fn scale(&self) -> f64 {
        EARTH_RADIUS * (1.0 + self.true_latitude.abs().to_radians().sin())
    }

    /// Geographic coordinates to projected metres.
    pub fn project(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let dlon = (lon_deg - self.orientation).to_radians();
        if self.south_pole {
            let rho = self.scale() * (PI / 4.0 + lat / 2.0).tan();
            (rho * dlon.sin(), rho * dlon.cos())
        } else {
            let rho = self.scale() * (PI / 4.0 - lat / 2.0).tan();
            (rho * dlon.sin(), -rho * dlon.cos())
        }
    }

    /// Projected metres to geographic coordinates.
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let rho = (x * x + y * y).sqrt();
        let c = 2.0 * (rho / self.scale()).atan();
        if self.south_pole {
            let lat = -(PI / 2.0 - c);
            let lon = self.orientation + x.atan2(y).to_degrees();
            (lat.to_degrees(), lon)
        } else {
            let lat = PI / 2.0 - c;
            let lon = self.orientation + x.atan2(-y).to_degrees();
            (lat.to_degrees(), lon)
        }
    }

    /// Convert geographic coordinates to fractional grid indices (i, j).
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let (x, y) = self.project(lat_deg, lon_deg);
        ((x - self.x0) / self.dx, (y - self.y0) / self.dy)
    }

    /// Convert grid indices (i, j) to a geographic point.
    pub fn grid_to_geo(&self, i: f64, j: f64) -> Point {
        let x = self.x0 + i * self.dx;
        let y = self.y0 + j * self.dy;
        let (lat, lon) = self.unproject(x, y);
        Point::new(lat, lon)
    }

    pub fn number_of_points(&self) -> usize {
        self.nx * self.ny
    }

    /// Every grid point, row by row along `j`.
    pub fn points(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.number_of_points());
        for j in 0..self.ny {
            for i in 0..self.nx {
                out.push(self.grid_to_geo(i as f64, j as f64));
            }
        }
        out
    }

    pub fn same_as(&self, other: &PolarStereographic) -> bool {
        self.nx == other.nx
            && self.ny == other.ny
            && same(self.dx, other.dx)
            && same(self.dy, other.dy)
            && same(self.first_latitude, other.first_latitude)
            && same(self.first_longitude, other.first_longitude)
            && same(self.orientation, other.orientation)
            && self.south_pole == other.south_pole
    }
}
