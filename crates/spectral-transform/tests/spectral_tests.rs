//! Integration tests for spectral synthesis, analysis and table caching.

use std::sync::Arc;

use grid_geometry::Grid;
use regrid_common::{Area, ErrorKind};
use spectral_transform::polynomials::table_file;
use spectral_transform::{
    analyse, cache::encode_legendre, coefficient_index, synthesise_rows, truncate, LegendreMethod, LegendreTable,
    PolynomialCaches, SynthesisOptions,
};
use test_utils::{assert_approx_eq, assert_slice_approx_eq, init_tracing, spherical_harmonic_values, temp_test_dir};

fn pairs(grid: &Grid) -> Vec<(f64, f64)> {
    grid.generate_grid_1d()
        .iter()
        .map(|p| (p.latitude(), p.longitude()))
        .collect()
}

fn caches(dir: &std::path::Path) -> PolynomialCaches {
    PolynomialCaches::new(Some(dir.join("legendre")), dir.join("mapped"), dir.join("shared"))
}

// ============================================================================
// Analysis and synthesis
// ============================================================================

#[test]
fn test_single_harmonic_analysis() {
    init_tracing();
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();
    let values = spherical_harmonic_values(&pairs(&grid), 2, 1);
    let table = LegendreTable::compute(20, &grid.abs_latitudes().unwrap());
    let coeffs = analyse(20, &values, &grid, &table, false).unwrap();

    let k = 2 * coefficient_index(20, 1, 2);
    assert_approx_eq!(coeffs[k], 0.5, 1e-12);
    assert_approx_eq!(coeffs[k + 1], 0.0, 1e-12);
    let others: f64 = coeffs
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != k)
        .map(|(_, v)| v.abs())
        .sum();
    assert!(others < 1e-10, "leakage {}", others);
}

#[test]
fn test_gaussian_round_trip() {
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();
    let points = pairs(&grid);
    let values: Vec<f64> = spherical_harmonic_values(&points, 1, 0)
        .iter()
        .zip(spherical_harmonic_values(&points, 2, 2))
        .map(|(a, b)| 3.0 + a - 0.5 * b)
        .collect();
    let table = LegendreTable::compute(21, &grid.abs_latitudes().unwrap());
    let coeffs = analyse(21, &values, &grid, &table, false).unwrap();
    let back = synthesise_rows(21, &coeffs, &table, grid.row_layout().unwrap(), SynthesisOptions::default()).unwrap();
    assert_slice_approx_eq!(back, values, 1e-10);
}

#[test]
fn test_reduced_gaussian_round_trip() {
    let grid = Grid::reduced_gg(8, test_utils::pl::octahedral(8), Area::empty()).unwrap();
    let values = spherical_harmonic_values(&pairs(&grid), 2, 1);
    let table = LegendreTable::compute(7, &grid.abs_latitudes().unwrap());
    let coeffs = analyse(7, &values, &grid, &table, false).unwrap();
    let options = SynthesisOptions {
        wind: false,
        fft_max_block_size: 2,
    };
    let back = synthesise_rows(7, &coeffs, &table, grid.row_layout().unwrap(), options).unwrap();
    assert_slice_approx_eq!(back, values, 1e-10);
}

#[test]
fn test_regional_synthesis_matches_global() {
    let global = Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap();
    let regional = Grid::regular_ll(Area::new(60.0, 10.0, 30.0, 40.0).unwrap(), 5.0, 5.0).unwrap();
    let mut coeffs = vec![0.0; spectral_transform::spectral_len(10)];
    coeffs[2 * coefficient_index(10, 3, 7)] = 1.0;
    coeffs[2 * coefficient_index(10, 0, 4)] = 0.4;

    let table = LegendreTable::compute(10, &global.abs_latitudes().unwrap());
    let full = synthesise_rows(10, &coeffs, &table, global.row_layout().unwrap(), SynthesisOptions::default()).unwrap();
    let part = synthesise_rows(10, &coeffs, &table, regional.row_layout().unwrap(), SynthesisOptions::default()).unwrap();

    let layout = global.row_layout().unwrap();
    for (k, p) in regional.generate_grid_1d().iter().enumerate() {
        let j = ((90.0 - p.latitude()) / 5.0).round() as usize;
        let i = (p.longitude() / 5.0).round() as usize;
        let index = layout.index(j, i).unwrap();
        assert_approx_eq!(part[k], full[index], 1e-12);
    }
}

#[test]
fn test_analysis_of_regional_gaussian_fails() {
    let grid = Grid::regular_gg(8, Area::new(45.0, 0.0, -45.0, 90.0).unwrap()).unwrap();
    let table = LegendreTable::compute(7, &grid.abs_latitudes().unwrap());
    let values = vec![1.0; grid.calculated_number_of_points()];
    let err = analyse(7, &values, &grid, &table, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryMismatch);
}

// ============================================================================
// Truncation
// ============================================================================

#[test]
fn test_truncation_increase_is_rejected() {
    let coeffs = vec![0.0; spectral_transform::spectral_len(63)];
    assert_eq!(truncate(63, &coeffs, 106).unwrap_err().kind(), ErrorKind::GeometryMismatch);
    assert_eq!(truncate(63, &coeffs, 21).unwrap().len(), spectral_transform::spectral_len(21));
}

// ============================================================================
// Polynomial caches
// ============================================================================

#[test]
fn test_shared_tables_are_reused() {
    init_tracing();
    let dir = temp_test_dir();
    let caches = caches(dir.path());
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();

    let a = caches.polynomials(LegendreMethod::Shared, 21, &grid).unwrap();
    let b = caches.polynomials(LegendreMethod::Shared, 21, &grid).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let c = caches.polynomials(LegendreMethod::Shared, 31, &grid).unwrap();
    assert_eq!(c.truncation(), 31);
    assert_eq!(a.truncation(), 21);
    assert_eq!(caches.stats().misses, 2);
}

#[test]
fn test_published_table_is_read_by_another_provider() {
    let dir = temp_test_dir();
    let grid = Grid::regular_gg(8, Area::empty()).unwrap();
    let first = caches(dir.path()).polynomials(LegendreMethod::Mapped, 15, &grid).unwrap();
    let second = caches(dir.path()).polynomials(LegendreMethod::Mapped, 15, &grid).unwrap();
    assert_eq!(*first, *second);
    assert!(dir.path().join("mapped").join("T15_N8.blob").exists());
}

#[test]
fn test_mapped_and_shared_tables_match_on_fly() {
    let dir = temp_test_dir();
    let caches = caches(dir.path());
    let grid = Grid::regular_gg(12, Area::empty()).unwrap();
    let fly = caches.polynomials(LegendreMethod::OnFly, 20, &grid).unwrap();
    let mapped = caches.polynomials(LegendreMethod::Mapped, 20, &grid).unwrap();
    let shared = caches.polynomials(LegendreMethod::Shared, 20, &grid).unwrap();
    assert_eq!(*fly, *mapped);
    assert_eq!(*mapped, *shared);
}

#[test]
fn test_fileio_missing_table() {
    let dir = temp_test_dir();
    let grid = Grid::regular_gg(8, Area::empty()).unwrap();
    let err = caches(dir.path())
        .polynomials(LegendreMethod::FileIo, 15, &grid)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_fileio_reads_precomputed_table() {
    let dir = temp_test_dir();
    let grid = Grid::regular_gg(8, Area::empty()).unwrap();
    let table = LegendreTable::compute(15, &grid.abs_latitudes().unwrap());
    let legendre_dir = dir.path().join("legendre");
    std::fs::create_dir_all(&legendre_dir).unwrap();
    std::fs::write(table_file(&legendre_dir, 15, &grid).unwrap(), encode_legendre(&table)).unwrap();

    let read = caches(dir.path()).polynomials(LegendreMethod::FileIo, 15, &grid).unwrap();
    assert_eq!(*read, table);
    let err = caches(dir.path())
        .polynomials(LegendreMethod::FileIo, 14, &grid)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}
