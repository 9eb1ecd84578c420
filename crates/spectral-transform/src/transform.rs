//! Spherical-harmonic synthesis (spectral to grid) and Gaussian analysis
//! (grid to spectral).
//!
//! Spectral coefficients are `(re, im)` pairs in the `m`-major triangle of
//! [`coefficient_index`], `(T+1)(T+2)` values in total. A real field is
//! `f(λ, μ) = Σ_n a_0n P̄_n0(μ) + 2 Re Σ_{m>0} Σ_n a_mn P̄_nm(μ) e^{imλ}`.

use std::collections::BTreeMap;

use num_complex::Complex64;
use rayon::prelude::*;
use tracing::debug;

use grid_geometry::{Grid, GaussianLatitudes, RowLayout};
use regrid_common::{Point, RegridError, Result};

use crate::fft::{max_wavenumber, FourierPlan};
use crate::legendre::{coefficient_index, legendre_functions, LegendreTable};

/// Number of reals in a spectral field of truncation `T`.
pub fn spectral_len(truncation: usize) -> usize {
    (truncation + 1) * (truncation + 2)
}

/// Check a coefficient vector against its declared truncation.
pub fn check_spectral(truncation: usize, coefficients: &[f64]) -> Result<()> {
    if coefficients.len() != spectral_len(truncation) {
        return Err(RegridError::geometry_mismatch(format!(
            "T{} needs {} spectral values, got {}",
            truncation,
            spectral_len(truncation),
            coefficients.len()
        )));
    }
    Ok(())
}

#[inline]
fn coefficient(coefficients: &[f64], truncation: usize, m: usize, n: usize) -> Complex64 {
    let k = 2 * coefficient_index(truncation, m, n);
    Complex64::new(coefficients[k], coefficients[k + 1])
}

/// Options shared by the synthesis entry points.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    /// Coefficients hold `U cos φ`; divide the result by `cos φ`.
    pub wind: bool,
    /// Maximum number of rows synthesised per Fourier batch.
    pub fft_max_block_size: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            wind: false,
            fft_max_block_size: 64,
        }
    }
}

/// Limit of `P̄_n1(μ) / cos φ` at the pole `μ = ±1`.
pub fn pole_wind_limit(n: usize, north: bool) -> f64 {
    let nf = n as f64;
    let sign = if north || (n + 1) % 2 == 0 { 1.0 } else { -1.0 };
    sign * ((2.0 * nf + 1.0) * nf * (nf + 1.0)).sqrt() / 2.0
}

/// Distinct absolute latitudes of a layout's rows, descending.
pub fn window_latitudes(layout: &RowLayout) -> Vec<f64> {
    let mut lats: Vec<f64> = layout.rows().iter().map(|r| r.latitude.abs()).collect();
    lats.sort_by(|a, b| b.total_cmp(a));
    lats.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    lats
}

fn is_pole(latitude: f64) -> bool {
    (latitude.abs() - 90.0).abs() < 1e-9
}

/// Fourier coefficients at `±|lat|` from Legendre samples `p` at `|lat|`.
/// Returns `(north, south)`.
fn hemisphere_fourier(
    truncation: usize,
    table_truncation: usize,
    coefficients: &[f64],
    p: &[f64],
) -> (Vec<Complex64>, Vec<Complex64>) {
    let mut north = Vec::with_capacity(truncation + 1);
    let mut south = Vec::with_capacity(truncation + 1);
    for m in 0..=truncation {
        let mut symmetric = Complex64::new(0.0, 0.0);
        let mut antisymmetric = Complex64::new(0.0, 0.0);
        for n in m..=truncation {
            let term = coefficient(coefficients, truncation, m, n) * p[coefficient_index(table_truncation, m, n)];
            if (n - m) % 2 == 0 {
                symmetric += term;
            } else {
                antisymmetric += term;
            }
        }
        north.push(symmetric + antisymmetric);
        south.push(symmetric - antisymmetric);
    }
    (north, south)
}

/// Pole Fourier coefficients of a wind component: only `m = 1` survives.
fn pole_wind_fourier(truncation: usize, coefficients: &[f64], north: bool) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); truncation + 1];
    if truncation >= 1 {
        out[1] = (1..=truncation)
            .map(|n| coefficient(coefficients, truncation, 1, n) * pole_wind_limit(n, north))
            .sum();
    }
    out
}

/// Synthesise a spectral field onto the rows of `layout`.
///
/// `table` must hold every absolute row latitude and have truncation at
/// least `truncation`.
pub fn synthesise_rows(
    truncation: usize,
    coefficients: &[f64],
    table: &LegendreTable,
    layout: &RowLayout,
    options: SynthesisOptions,
) -> Result<Vec<f64>> {
    check_spectral(truncation, coefficients)?;
    if table.truncation() < truncation {
        return Err(RegridError::geometry_mismatch(format!(
            "Legendre table T{} cannot synthesise T{}",
            table.truncation(),
            truncation
        )));
    }

    // Fourier coefficients per distinct |lat|, both hemispheres at once.
    let window = window_latitudes(layout);
    let fourier: Vec<(Vec<Complex64>, Vec<Complex64>)> = window
        .par_iter()
        .map(|&lat| -> Result<_> {
            if options.wind && is_pole(lat) {
                return Ok((
                    pole_wind_fourier(truncation, coefficients, true),
                    pole_wind_fourier(truncation, coefficients, false),
                ));
            }
            let j = table.index_of(lat).ok_or_else(|| {
                RegridError::geometry_mismatch(format!("Legendre table has no latitude {}", lat))
            })?;
            let (mut north, mut south) = hemisphere_fourier(truncation, table.truncation(), coefficients, table.values_at(j));
            if options.wind {
                let c = lat.to_radians().cos();
                north.iter_mut().chain(south.iter_mut()).for_each(|v| *v /= c);
            }
            Ok((north, south))
        })
        .collect::<Result<_>>()?;

    // Blocks of rows sharing a Fourier plan.
    let mut groups: BTreeMap<(usize, u64, u64), Vec<usize>> = BTreeMap::new();
    for (j, row) in layout.rows().iter().enumerate() {
        let key = (row.count, row.first_longitude.to_bits(), row.increment.to_bits());
        groups.entry(key).or_default().push(j);
    }
    let block_size = options.fft_max_block_size.max(1);
    let blocks: Vec<&[usize]> = groups.values().flat_map(|rows| rows.chunks(block_size)).collect();
    debug!(
        truncation,
        rows = layout.number_of_rows(),
        blocks = blocks.len(),
        wind = options.wind,
        "Synthesising spectral field"
    );

    let rows = layout.rows();
    let results: Vec<(usize, Vec<f64>)> = blocks
        .par_iter()
        .flat_map_iter(|block| {
            let first = &rows[block[0]];
            let plan = FourierPlan::new(first.count, first.first_longitude, first.increment);
            let max_wave = max_wavenumber(first.count, truncation);
            block
                .iter()
                .map(|&j| {
                    let row = &rows[j];
                    let w = window
                        .iter()
                        .position(|&l| (l - row.latitude.abs()).abs() < 1e-9)
                        .unwrap_or(0);
                    let (north, south) = &fourier[w];
                    let f = if row.latitude >= 0.0 { north } else { south };
                    (row.offset, plan.synthesise(&f[..=max_wave]))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut out = vec![0.0; layout.number_of_points()];
    for (offset, values) in results {
        out[offset..offset + values.len()].copy_from_slice(&values);
    }
    Ok(out)
}

/// Synthesise a spectral field at arbitrary points, evaluating Legendre
/// functions per point.
pub fn synthesise_points(truncation: usize, coefficients: &[f64], points: &[Point], wind: bool) -> Result<Vec<f64>> {
    check_spectral(truncation, coefficients)?;
    let values = points
        .par_iter()
        .map(|p| {
            let lat = p.latitude();
            let f = if wind && is_pole(lat) {
                pole_wind_fourier(truncation, coefficients, lat > 0.0)
            } else {
                let table = legendre_functions(truncation, lat.abs());
                let (north, south) = hemisphere_fourier(truncation, truncation, coefficients, &table);
                let mut f = if lat >= 0.0 { north } else { south };
                if wind {
                    let c = lat.to_radians().cos();
                    f.iter_mut().for_each(|v| *v /= c);
                }
                f
            };
            let z = Complex64::from_polar(1.0, p.longitude().to_radians());
            let mut acc = Complex64::new(0.0, 0.0);
            for c in f.iter().rev() {
                acc = acc * z + c;
            }
            2.0 * acc.re - f[0].re
        })
        .collect();
    Ok(values)
}

/// Gaussian-quadrature analysis of a global Gaussian grid field.
///
/// `table` holds the northern Gaussian latitudes. Reduced rows only
/// contribute wavenumbers they resolve.
pub fn analyse(
    truncation: usize,
    values: &[f64],
    grid: &Grid,
    table: &LegendreTable,
    wind: bool,
) -> Result<Vec<f64>> {
    let number = match grid.gaussian_number() {
        Some(n) if grid.is_global() => n,
        _ => {
            return Err(RegridError::geometry_mismatch(format!(
                "spectral analysis needs a global Gaussian grid, got {}",
                grid
            )))
        }
    };
    grid.check_values(values)?;
    if table.truncation() < truncation {
        return Err(RegridError::geometry_mismatch(format!(
            "Legendre table T{} cannot analyse to T{}",
            table.truncation(),
            truncation
        )));
    }
    let layout = grid
        .row_layout()
        .ok_or_else(|| RegridError::geometry_mismatch("Gaussian grid without rows"))?;
    let gaussian = GaussianLatitudes::compute(number)?;
    let weights = gaussian.weights();

    // Per-row Fourier coefficients.
    let fourier: Vec<Vec<Complex64>> = layout
        .rows()
        .par_iter()
        .map(|row| {
            let plan = FourierPlan::new(row.count, row.first_longitude, row.increment);
            let slice = &values[row.offset..row.offset + row.count];
            let max_wave = max_wavenumber(row.count, truncation);
            if wind {
                let c = row.latitude.to_radians().cos();
                let scaled: Vec<f64> = slice.iter().map(|v| v * c).collect();
                plan.analyse(&scaled, max_wave)
            } else {
                plan.analyse(slice, max_wave)
            }
        })
        .collect();

    let mut out = vec![0.0; spectral_len(truncation)];
    for (j, row) in layout.rows().iter().enumerate() {
        let t = table.index_of(row.latitude).ok_or_else(|| {
            RegridError::geometry_mismatch(format!("Legendre table has no latitude {}", row.latitude))
        })?;
        let p = table.values_at(t);
        let south = row.latitude < 0.0;
        let w = 0.5 * weights[j];
        for (m, fm) in fourier[j].iter().enumerate() {
            for n in m..=truncation {
                let mut pv = p[coefficient_index(table.truncation(), m, n)];
                if south && (n - m) % 2 == 1 {
                    pv = -pv;
                }
                let k = 2 * coefficient_index(truncation, m, n);
                out[k] += w * pv * fm.re;
                out[k + 1] += w * pv * fm.im;
            }
        }
    }
    // Imaginary parts of m = 0 are zero for real fields.
    for n in 0..=truncation {
        out[2 * coefficient_index(truncation, 0, n) + 1] = 0.0;
    }
    debug!(truncation, gaussian = number, wind, "Analysed Gaussian field");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::Area;

    fn single_mode(truncation: usize, m: usize, n: usize, value: (f64, f64)) -> Vec<f64> {
        let mut c = vec![0.0; spectral_len(truncation)];
        let k = 2 * coefficient_index(truncation, m, n);
        c[k] = value.0;
        c[k + 1] = value.1;
        c
    }

    #[test]
    fn test_constant_mode_synthesis() {
        let grid = Grid::regular_gg(8, Area::empty()).unwrap();
        let layout = grid.row_layout().unwrap();
        let table = LegendreTable::compute(15, &grid.abs_latitudes().unwrap());
        let values = synthesise_rows(15, &single_mode(15, 0, 0, (3.0, 0.0)), &table, layout, SynthesisOptions::default()).unwrap();
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_rows_and_points_agree() {
        let grid = Grid::regular_gg(8, Area::empty()).unwrap();
        let layout = grid.row_layout().unwrap();
        let table = LegendreTable::compute(10, &grid.abs_latitudes().unwrap());
        let coeffs = single_mode(10, 2, 5, (0.7, -0.3));
        let options = SynthesisOptions { wind: false, fft_max_block_size: 3 };
        let rows = synthesise_rows(10, &coeffs, &table, layout, options).unwrap();
        let points = synthesise_points(10, &coeffs, &grid.generate_grid_1d(), false).unwrap();
        for (a, b) in rows.iter().zip(&points) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_analysis_rejects_latlon() {
        let grid = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
        let table = LegendreTable::compute(5, &grid.abs_latitudes().unwrap());
        let values = vec![0.0; grid.calculated_number_of_points()];
        let err = analyse(5, &values, &grid, &table, false).unwrap_err();
        assert_eq!(err.kind(), regrid_common::ErrorKind::GeometryMismatch);
    }

    #[test]
    fn test_pole_wind_limit_matches_closed_form() {
        // P̄_21 / cos φ = sqrt(15/2) μ.
        assert!((pole_wind_limit(2, true) - 7.5f64.sqrt()).abs() < 1e-12);
        assert!((pole_wind_limit(2, false) + 7.5f64.sqrt()).abs() < 1e-12);
        assert!((pole_wind_limit(1, false) - 1.5f64.sqrt()).abs() < 1e-12);
    }
}
