//! Partial derivatives on row layouts and the sub-grid orography
//! parameters derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use grid_geometry::Grid;
use regrid_common::numeric::{is_missing, DEGREE_EPSILON};
use regrid_common::{RegridError, Result, EARTH_RADIUS};

/// Parameter computed from the `K`, `L`, `M` terms of the gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivedParameter {
    Anisotropy,
    Orientation,
    Slope,
}

impl DerivedParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedParameter::Anisotropy => "anisotropy",
            DerivedParameter::Orientation => "orientation",
            DerivedParameter::Slope => "slope",
        }
    }

    pub fn calculate(&self, k: f64, l: f64, m: f64) -> f64 {
        let l_prime = (l * l + m * m).sqrt();
        match self {
            DerivedParameter::Anisotropy => {
                if k + l_prime <= 0.0 {
                    1.0
                } else {
                    ((k - l_prime).max(0.0) / (k + l_prime)).sqrt()
                }
            }
            DerivedParameter::Orientation => 0.5 * m.atan2(l),
            DerivedParameter::Slope => (k + l_prime).max(0.0).sqrt(),
        }
    }
}

impl fmt::Display for DerivedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivedParameter {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anisotropy" => Ok(DerivedParameter::Anisotropy),
            "orientation" => Ok(DerivedParameter::Orientation),
            "slope" => Ok(DerivedParameter::Slope),
            other => Err(RegridError::invalid_configuration(format!(
                "unknown derived parameter '{}'",
                other
            ))),
        }
    }
}

/// Gradient of a field in metres, storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDerivatives {
    pub zonal: Vec<f64>,
    pub meridional: Vec<f64>,
}

/// Mean of the one-sided differences that are available.
fn mean_of(a: Option<f64>, b: Option<f64>, missing: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (a + b) * 0.5,
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => missing,
    }
}

/// Zonal and meridional derivatives from each point's east/west
/// neighbours on its row and its nearest neighbours on the rows north and
/// south.
pub fn partial_derivatives(grid: &Grid, values: &[f64], missing: f64) -> Result<PartialDerivatives> {
    grid.check_values(values)?;
    let layout = grid.row_layout().ok_or_else(|| {
        RegridError::invalid_configuration(format!("partial derivatives need rows, not {}", grid.kind()))
    })?;
    let rows = layout.rows();
    let present = |index: usize| Some(values[index]).filter(|v| !is_missing(*v, missing));

    let mut zonal = Vec::with_capacity(values.len());
    let mut meridional = Vec::with_capacity(values.len());
    for (j, row) in rows.iter().enumerate() {
        let lat = row.latitude.to_radians();
        for k in 0..row.count {
            let value = values[row.offset + k];
            if is_missing(value, missing) {
                zonal.push(missing);
                meridional.push(missing);
                continue;
            }
            let lon = row.longitude(k);

            let scale = EARTH_RADIUS * lat.cos() * row.increment.to_radians();
            if lat.cos().abs() < DEGREE_EPSILON {
                zonal.push(0.0);
            } else {
                let east = row
                    .wrap(k as isize + 1)
                    .and_then(|e| present(row.offset + e))
                    .map(|v| (v - value) / scale);
                let west = row
                    .wrap(k as isize - 1)
                    .and_then(|w| present(row.offset + w))
                    .map(|v| (value - v) / scale);
                zonal.push(mean_of(east, west, missing));
            }

            let neighbour = |other: usize| {
                let r = &rows[other];
                let c = r.nearest_column(lon);
                present(r.offset + c).map(|v| (v, r.latitude.to_radians()))
            };
            let north = j
                .checked_sub(1)
                .and_then(neighbour)
                .map(|(v, l)| (v - value) / (EARTH_RADIUS * (l - lat)));
            let south = Some(j + 1)
                .filter(|s| *s < rows.len())
                .and_then(neighbour)
                .map(|(v, l)| (value - v) / (EARTH_RADIUS * (lat - l)));
            meridional.push(mean_of(north, south, missing));
        }
    }
    Ok(PartialDerivatives { zonal, meridional })
}

/// `K = (z² + m²)/2`, `L = (z² − m²)/2`, `M = z·m` per point.
#[derive(Debug, Clone, PartialEq)]
pub struct Klm {
    pub k: Vec<f64>,
    pub l: Vec<f64>,
    pub m: Vec<f64>,
}

impl Klm {
    pub fn from_derivatives(d: &PartialDerivatives, missing: f64) -> Self {
        let n = d.zonal.len();
        let (mut k, mut l, mut m) = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
        for (z, y) in d.zonal.iter().zip(&d.meridional) {
            if is_missing(*z, missing) || is_missing(*y, missing) {
                k.push(missing);
                l.push(missing);
                m.push(missing);
            } else {
                k.push((z * z + y * y) * 0.5);
                l.push((z * z - y * y) * 0.5);
                m.push(z * y);
            }
        }
        Self { k, l, m }
    }
}
