//! Synthetic field generators.
//!
//! Points are `(latitude, longitude)` pairs in degrees, in storage order.

/// A field with the same value everywhere.
pub fn constant_values(count: usize, value: f64) -> Vec<f64> {
    vec![value; count]
}

/// A smooth, non-trivial field: `2 + sin(lat) + cos(lat) * cos(lon)`.
///
/// Values lie in `[2 - sqrt(2), 2 + sqrt(2)]` and vary continuously across
/// the poles and the 0/360 meridian.
pub fn smooth_values(points: &[(f64, f64)]) -> Vec<f64> {
    points
        .iter()
        .map(|&(lat, lon)| {
            let (lat, lon) = (lat.to_radians(), lon.to_radians());
            2.0 + lat.sin() + lat.cos() * lon.cos()
        })
        .collect()
}

/// A single real spherical harmonic `P_nm(sin lat) * cos(m * lon)`, with
/// `P_nm` normalised so that its square integrates to 2 over `[-1, 1]`.
///
/// Supported for `n <= 2`.
///
/// # Panics
///
/// Panics for unsupported `(n, m)` pairs.
pub fn spherical_harmonic_values(points: &[(f64, f64)], n: usize, m: usize) -> Vec<f64> {
    points
        .iter()
        .map(|&(lat, lon)| {
            let (lat, lon) = (lat.to_radians(), lon.to_radians());
            let (mu, c) = (lat.sin(), lat.cos());
            let p = match (n, m) {
                (0, 0) => 1.0,
                (1, 0) => 3f64.sqrt() * mu,
                (1, 1) => 1.5f64.sqrt() * c,
                (2, 0) => 5f64.sqrt() / 2.0 * (3.0 * mu * mu - 1.0),
                (2, 1) => 5f64.sqrt() * 1.5f64.sqrt() * mu * c,
                (2, 2) => (15f64 / 8.0).sqrt() * c * c,
                _ => panic!("spherical harmonic ({}, {}) not tabulated", n, m),
            };
            p * (m as f64 * lon).cos()
        })
        .collect()
}

/// Point pairs of a regular global lat/lon grid, north to south, west to
/// east from Greenwich.
pub fn regular_points(north_south: f64, west_east: f64) -> Vec<(f64, f64)> {
    let nlat = (180.0 / north_south).round() as usize + 1;
    let nlon = (360.0 / west_east).round() as usize;
    let mut out = Vec::with_capacity(nlat * nlon);
    for j in 0..nlat {
        for i in 0..nlon {
            out.push((90.0 - j as f64 * north_south, i as f64 * west_east));
        }
    }
    out
}

/// A field with some entries replaced by `missing`, every `stride`-th value
/// starting at `offset`.
pub fn with_missing(mut values: Vec<f64>, missing: f64, offset: usize, stride: usize) -> Vec<f64> {
    let stride = stride.max(1);
    for v in values.iter_mut().skip(offset).step_by(stride) {
        *v = missing;
    }
    values
}
