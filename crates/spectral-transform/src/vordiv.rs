//! Vorticity/divergence to `U cos φ` / `V cos φ` conversion.

use num_complex::Complex64;
use tracing::debug;

use regrid_common::{RegridError, Result};

use crate::legendre::coefficient_index;
use crate::transform::spectral_len;
use crate::truncation::truncate;

/// Radius used by the wind recurrence, metres.
pub const WIND_EARTH_RADIUS: f64 = 6.371e6;

fn dd(m: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let (m, n) = (m as f64, n as f64);
    -((n * n - m * m) / (4.0 * n * n - 1.0)).sqrt() / n
}

fn ss(m: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let (m, n) = (m as f64, n as f64);
    -m / (n * (n + 1.0))
}

/// Spectral coefficients of `U cos φ` and `V cos φ` at truncation `to`.
///
/// Vorticity and divergence are first truncated to `to - 1`, so `to` may
/// exceed the input truncation by at most one.
pub fn vorticity_divergence_to_uv(
    truncation: usize,
    vorticity: &[f64],
    divergence: &[f64],
    to: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if to == 0 {
        return Err(RegridError::geometry_mismatch("u/v conversion needs an output truncation of at least 1"));
    }
    let inner = to - 1;
    let vor = truncate(truncation, vorticity, inner)?;
    let div = truncate(truncation, divergence, inner)?;

    let get = |values: &[f64], m: usize, n: usize| -> Complex64 {
        if n < m || n > inner {
            return Complex64::new(0.0, 0.0);
        }
        let k = 2 * coefficient_index(inner, m, n);
        Complex64::new(values[k], values[k + 1])
    };

    let i = Complex64::new(0.0, 1.0);
    let mut u = vec![0.0; spectral_len(to)];
    let mut v = vec![0.0; spectral_len(to)];
    for m in 0..=to {
        for n in m..=to {
            let below = if n > m { Some(n - 1) } else { None };
            let vor_below = below.map_or(Complex64::new(0.0, 0.0), |b| get(&vor, m, b));
            let div_below = below.map_or(Complex64::new(0.0, 0.0), |b| get(&div, m, b));
            let uu = dd(m, n) * vor_below - dd(m, n + 1) * get(&vor, m, n + 1) + i * ss(m, n) * get(&div, m, n);
            let vv = -dd(m, n) * div_below + dd(m, n + 1) * get(&div, m, n + 1) + i * ss(m, n) * get(&vor, m, n);
            let k = 2 * coefficient_index(to, m, n);
            u[k] = uu.re * WIND_EARTH_RADIUS;
            u[k + 1] = uu.im * WIND_EARTH_RADIUS;
            v[k] = vv.re * WIND_EARTH_RADIUS;
            v[k + 1] = vv.im * WIND_EARTH_RADIUS;
        }
    }
    debug!(from = truncation, to, "Converted vorticity/divergence to u/v");
    Ok((u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::synthesise_points;
    use regrid_common::Point;

    fn mode(truncation: usize, m: usize, n: usize, re: f64) -> Vec<f64> {
        let mut c = vec![0.0; spectral_len(truncation)];
        c[2 * coefficient_index(truncation, m, n)] = re;
        c
    }

    #[test]
    fn test_solid_body_vorticity() {
        // ζ = c √3 sin φ gives u = R c (√3 / 2) cos φ and no v.
        let c = 1e-5;
        let vor = mode(1, 0, 1, c);
        let div = mode(1, 0, 0, 0.0);
        let (u, v) = vorticity_divergence_to_uv(1, &vor, &div, 2).unwrap();
        assert!(v.iter().all(|x| x.abs() < 1e-12));

        let points: Vec<Point> = [60.0, 0.0, -30.0, 90.0].iter().map(|&lat| Point::new(lat, 45.0)).collect();
        let wind = synthesise_points(2, &u, &points, true).unwrap();
        for (p, w) in points.iter().zip(&wind) {
            let expected = WIND_EARTH_RADIUS * c * 3f64.sqrt() / 2.0 * p.latitude().to_radians().cos();
            assert!((w - expected).abs() < 1e-9, "{} vs {}", w, expected);
        }
    }

    #[test]
    fn test_divergence_feeds_imaginary_u() {
        let vor = mode(2, 0, 0, 0.0);
        let div = mode(2, 1, 1, 1.0);
        let (u, _) = vorticity_divergence_to_uv(2, &vor, &div, 3).unwrap();
        let k = 2 * coefficient_index(3, 1, 1);
        assert_eq!(u[k], 0.0);
        assert!((u[k + 1] - ss(1, 1) * WIND_EARTH_RADIUS).abs() < 1e-6);
    }

    #[test]
    fn test_output_too_high() {
        let z = mode(2, 0, 0, 0.0);
        assert!(vorticity_divergence_to_uv(2, &z, &z, 5).is_err());
        assert!(vorticity_divergence_to_uv(2, &z, &z, 0).is_err());
    }
}
