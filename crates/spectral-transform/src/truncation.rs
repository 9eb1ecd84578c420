//! Spectral-to-spectral truncation.

use tracing::debug;

use regrid_common::{RegridError, Result};

use crate::legendre::coefficient_index;
use crate::transform::{check_spectral, spectral_len};

/// Copy the `(m, n)` coefficients of a T`from` field into a T`to` field.
///
/// Only reductions are supported; asking for a higher truncation is a
/// [`RegridError::GeometryMismatch`].
pub fn truncate(from: usize, coefficients: &[f64], to: usize) -> Result<Vec<f64>> {
    check_spectral(from, coefficients)?;
    if to > from {
        return Err(RegridError::geometry_mismatch(format!(
            "cannot increase truncation from T{} to T{}",
            from, to
        )));
    }
    if to == from {
        return Ok(coefficients.to_vec());
    }
    let mut out = vec![0.0; spectral_len(to)];
    for m in 0..=to {
        let src = 2 * coefficient_index(from, m, m);
        let dst = 2 * coefficient_index(to, m, m);
        let len = 2 * (to - m + 1);
        out[dst..dst + len].copy_from_slice(&coefficients[src..src + len]);
    }
    debug!(from, to, "Truncated spectral field");
    Ok(out)
}
