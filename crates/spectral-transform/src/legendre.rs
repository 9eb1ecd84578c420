//! Normalised associated Legendre functions.
//!
//! `P̄_nm(μ)` is normalised so that `∫ P̄_nm² dμ = 2` over `[-1, 1]`. Values
//! for one latitude are stored `m`-major: for `m` in `0..=T`, `n` in `m..=T`.

use rayon::prelude::*;
use tracing::debug;

use regrid_common::{RegridError, Result};

/// Number of `(m, n)` pairs with `m <= n <= T`.
pub fn triangle_size(truncation: usize) -> usize {
    (truncation + 1) * (truncation + 2) / 2
}

/// Position of `(m, n)` in the `m`-major triangle of truncation `T`.
#[inline]
pub fn coefficient_index(truncation: usize, m: usize, n: usize) -> usize {
    m * (2 * truncation + 3 - m) / 2 + (n - m)
}

/// All `P̄_nm(sin lat)` for `m <= n <= T` at one latitude.
pub fn legendre_functions(truncation: usize, latitude: f64) -> Vec<f64> {
    let mut out = vec![0.0; triangle_size(truncation)];
    fill_legendre_functions(truncation, latitude, &mut out);
    out
}

fn fill_legendre_functions(truncation: usize, latitude: f64, out: &mut [f64]) {
    let phi = latitude.to_radians();
    let mu = phi.sin();
    let sin_theta = phi.cos().max(0.0);
    let mut diagonal = 1.0;
    for m in 0..=truncation {
        if m > 0 {
            let mf = m as f64;
            diagonal *= ((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * sin_theta;
        }
        let base = coefficient_index(truncation, m, m);
        out[base] = diagonal;
        if m == truncation {
            break;
        }
        let mf = m as f64;
        out[base + 1] = (2.0 * mf + 3.0).sqrt() * mu * diagonal;
        for n in (m + 2)..=truncation {
            let nf = n as f64;
            let a = ((4.0 * nf * nf - 1.0) / (nf * nf - mf * mf)).sqrt();
            let n1 = nf - 1.0;
            let b = ((n1 * n1 - mf * mf) / (4.0 * n1 * n1 - 1.0)).sqrt();
            let k = base + (n - m);
            out[k] = a * (mu * out[k - 1] - b * out[k - 2]);
        }
    }
}

/// Legendre function samples for a set of non-negative latitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendreTable {
    truncation: usize,
    latitudes: Vec<f64>,
    values: Vec<f64>,
}

impl LegendreTable {
    /// Evaluate at `latitudes` (degrees, expected descending and `>= 0`).
    pub fn compute(truncation: usize, latitudes: &[f64]) -> Self {
        let size = triangle_size(truncation);
        let mut values = vec![0.0; size * latitudes.len()];
        values
            .par_chunks_mut(size.max(1))
            .zip(latitudes.par_iter())
            .for_each(|(chunk, &lat)| fill_legendre_functions(truncation, lat, chunk));
        debug!(truncation, latitudes = latitudes.len(), "Built Legendre table");
        Self {
            truncation,
            latitudes: latitudes.to_vec(),
            values,
        }
    }

    /// Reassemble a table from stored parts.
    pub fn from_parts(truncation: usize, latitudes: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        let expected = triangle_size(truncation) * latitudes.len();
        if values.len() != expected {
            return Err(RegridError::geometry_mismatch(format!(
                "Legendre table T{} over {} latitudes needs {} values, got {}",
                truncation,
                latitudes.len(),
                expected,
                values.len()
            )));
        }
        Ok(Self {
            truncation,
            latitudes,
            values,
        })
    }

    pub fn truncation(&self) -> usize {
        self.truncation
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Samples at the `j`-th latitude.
    pub fn values_at(&self, j: usize) -> &[f64] {
        let size = triangle_size(self.truncation);
        &self.values[j * size..(j + 1) * size]
    }

    /// Row of the table holding `|latitude|`.
    pub fn index_of(&self, latitude: f64) -> Option<usize> {
        let target = latitude.abs();
        let j = self.latitudes.partition_point(|&l| l > target + 1e-7);
        self.latitudes
            .get(j)
            .filter(|&&l| (l - target).abs() <= 1e-7)
            .map(|_| j)
    }

    /// Approximate heap size in bytes.
    pub fn memory_usage(&self) -> usize {
        (self.values.len() + self.latitudes.len()) * std::mem::size_of::<f64>()
    }
}
