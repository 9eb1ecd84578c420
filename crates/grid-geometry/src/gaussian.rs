//! Gaussian latitudes, quadrature weights and the truncation/resolution table.
//!
//! The latitudes of a Gaussian grid of number `N` are the `2N` roots of the
//! Legendre polynomial `P_2N(sin(lat))`, found here by Newton iteration from
//! the classical cosine first guess. Only the northern half is solved; the
//! southern half mirrors it.

use regrid_common::{RegridError, Result};

/// Newton iterations allowed per root.
pub const MAX_ITERATIONS: usize = 10;

/// Convergence threshold on the Newton step.
pub const PRECISION: f64 = 1e-14;

/// Latitudes (degrees, north to south) and weights of a Gaussian grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianLatitudes {
    number: usize,
    latitudes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussianLatitudes {
    /// Solve for the `2N` latitudes of Gaussian number `n`.
    pub fn compute(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(RegridError::geometry_mismatch("Gaussian number must be positive"));
        }
        let nlat = 2 * n;
        let mut latitudes = vec![0.0; nlat];
        let mut weights = vec![0.0; nlat];

        for j in 0..n {
            let mut z = (std::f64::consts::PI * ((j + 1) as f64 - 0.25) / (nlat as f64 + 0.5)).cos();
            let mut converged = false;
            for _ in 0..MAX_ITERATIONS {
                let (p, dp) = legendre_and_derivative(nlat, z);
                let dz = p / dp;
                z -= dz;
                if dz.abs() < PRECISION {
                    converged = true;
                    break;
                }
            }
            if !converged {
                // Accept roots that reached working precision even if the
                // last step did not drop below the threshold.
                let (p, _) = legendre_and_derivative(nlat, z);
                if p.abs() > 1e-10 {
                    return Err(RegridError::geometry_mismatch(format!(
                        "Gaussian latitude {} of N{} did not converge",
                        j, n
                    )));
                }
            }
            let (_, dp) = legendre_and_derivative(nlat, z);
            let weight = 2.0 / ((1.0 - z * z) * dp * dp);
            let lat = z.asin().to_degrees();
            latitudes[j] = lat;
            latitudes[nlat - 1 - j] = -lat;
            weights[j] = weight;
            weights[nlat - 1 - j] = weight;
        }

        Ok(Self {
            number: n,
            latitudes,
            weights,
        })
    }

    /// Gaussian number `N`.
    pub fn number(&self) -> usize {
        self.number
    }

    /// All `2N` latitudes in degrees, north to south.
    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    /// Quadrature weights matching [`GaussianLatitudes::latitudes`]; they sum to 2.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Index of the northernmost latitude at or south of `latitude`.
    pub fn north_index(&self, latitude: f64) -> usize {
        self.latitudes
            .iter()
            .position(|&l| l <= latitude + 1e-5)
            .unwrap_or(self.latitudes.len() - 1)
    }

    /// Index of the southernmost latitude at or north of `latitude`.
    pub fn south_index(&self, latitude: f64) -> usize {
        self.latitudes
            .iter()
            .rposition(|&l| l >= latitude - 1e-5)
            .unwrap_or(0)
    }
}

/// `P_n(z)` and its derivative by the three-term recurrence.
fn legendre_and_derivative(n: usize, z: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = z;
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * z * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (z * p1 - p0) / (z * z - 1.0);
    (p1, dp)
}

// =============================================================================
// Resolution table
// =============================================================================

/// Triangular truncations paired with the Gaussian number they are run on.
///
/// Low resolutions use the quadratic grid, higher ones the linear grid, so
/// a Gaussian number may appear for two truncations.
const RESOLUTIONS: &[(usize, usize)] = &[
    (21, 16),
    (31, 24),
    (42, 32),
    (63, 48),
    (106, 80),
    (159, 80),
    (213, 160),
    (255, 128),
    (319, 160),
    (399, 200),
    (511, 256),
    (639, 320),
    (799, 400),
    (1023, 512),
    (1279, 640),
    (2047, 1024),
];

/// Gaussian number used for a given truncation.
pub fn gaussian_for_truncation(truncation: usize) -> Result<usize> {
    RESOLUTIONS
        .iter()
        .find(|(t, _)| *t == truncation)
        .map(|(_, n)| *n)
        .ok_or_else(|| {
            RegridError::geometry_mismatch(format!(
                "truncation T{} has no matching Gaussian number",
                truncation
            ))
        })
}

/// Highest truncation run on Gaussian number `n`.
pub fn truncation_for_gaussian(n: usize) -> Result<usize> {
    RESOLUTIONS
        .iter()
        .filter(|(_, g)| *g == n)
        .map(|(t, _)| *t)
        .max()
        .ok_or_else(|| {
            RegridError::geometry_mismatch(format!("Gaussian N{} has no matching truncation", n))
        })
}

/// Lowest truncation whose Gaussian spacing resolves `increment` degrees.
pub fn truncation_for_increment(increment: f64) -> usize {
    RESOLUTIONS
        .iter()
        .find(|(_, n)| 90.0 / *n as f64 <= increment + 1e-9)
        .or_else(|| RESOLUTIONS.last())
        .map(|(t, _)| *t)
        .unwrap_or(21)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n1_roots() {
        // P_2 roots are +-1/sqrt(3).
        let g = GaussianLatitudes::compute(1).unwrap();
        let expected = (1.0f64 / 3.0f64.sqrt()).asin().to_degrees();
        assert!((g.latitudes()[0] - expected).abs() < 1e-12);
        assert!((g.latitudes()[1] + expected).abs() < 1e-12);
        assert!((g.weights()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_sum_to_two() {
        for n in [16, 48, 80] {
            let g = GaussianLatitudes::compute(n).unwrap();
            let sum: f64 = g.weights().iter().sum();
            assert!((sum - 2.0).abs() < 1e-12, "N{} sum {}", n, sum);
        }
    }

    #[test]
    fn test_latitudes_are_symmetric_and_descending() {
        let g = GaussianLatitudes::compute(32).unwrap();
        let lats = g.latitudes();
        assert_eq!(lats.len(), 64);
        for w in lats.windows(2) {
            assert!(w[0] > w[1]);
        }
        for j in 0..32 {
            assert!((lats[j] + lats[63 - j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_north_south_index() {
        let g = GaussianLatitudes::compute(16).unwrap();
        assert_eq!(g.north_index(90.0), 0);
        assert_eq!(g.south_index(-90.0), 31);
        let mid = g.latitudes()[10];
        assert_eq!(g.north_index(mid), 10);
        assert_eq!(g.south_index(mid), 10);
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(gaussian_for_truncation(63).unwrap(), 48);
        assert_eq!(truncation_for_gaussian(80).unwrap(), 159);
        assert!(gaussian_for_truncation(64).is_err());
        assert_eq!(truncation_for_increment(1.5), 106);
        assert_eq!(truncation_for_increment(10.0), 21);
    }
}
