//! Integration tests for grid construction, enumeration and queries.

use grid_geometry::{
    same_as, Grid, PolarStereographic, ReducedLatLon, RegularLatLon, Rotation,
    RotatedRegularLatLon,
};
use regrid_common::{Area, ErrorKind, Point, ScanningMode};
use test_utils::{assert_approx_eq, pl};

fn area(t: (f64, f64, f64, f64)) -> Area {
    Area::new(t.0, t.1, t.2, t.3).unwrap()
}

fn all_variants() -> Vec<Grid> {
    let rotated = RotatedRegularLatLon::new(
        RegularLatLon::new(area((20.0, -20.0, -20.0, 20.0)), 2.0, 2.0).unwrap(),
        Rotation::new(-40.0, 10.0),
    );
    vec![
        Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap(),
        Grid::ReducedLatLon(ReducedLatLon::new(Area::empty(), 10.0, pl::REDUCED_LL_10.to_vec()).unwrap()),
        Grid::regular_gg(8, Area::empty()).unwrap(),
        Grid::reduced_gg(8, pl::octahedral(8), Area::empty()).unwrap(),
        Grid::pseudo_regular_gg(8, Area::empty()).unwrap(),
        Grid::RotatedRegularLatLon(rotated),
        Grid::RegularLatLonCellCentered(
            grid_geometry::RegularLatLonCellCentered::new(Area::empty(), 10.0, 10.0).unwrap(),
        ),
        Grid::list(vec![Point::new(10.0, 10.0), Point::new(-5.0, 200.0)]).unwrap(),
        Grid::PolarStereographic(
            PolarStereographic::new(20, 15, 100_000.0, 100_000.0, 30.0, 250.0, 255.0, false).unwrap(),
        ),
    ]
}

// ============================================================================
// Point counts
// ============================================================================

#[test]
fn test_row_lengths_sum_to_point_count() {
    for grid in all_variants() {
        let total: usize = grid.row_lengths().iter().sum();
        assert_eq!(total, grid.calculated_number_of_points(), "{}", grid);
        assert_eq!(grid.generate_grid_1d().len(), total, "{}", grid);
    }
}

#[test]
fn test_reduced_latlon_pl_length_checked() {
    let err = ReducedLatLon::new(Area::empty(), 10.0, vec![4; 18]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryMismatch);
}

#[test]
fn test_regional_gaussian_subset_rows() {
    let global = Grid::regular_gg(16, Area::empty()).unwrap();
    let band = Grid::regular_gg(16, area((30.0, 0.0, -30.0, 357.1875))).unwrap();
    let lats: Vec<f64> = band.row_layout().unwrap().latitudes();
    assert!(lats.iter().all(|l| l.abs() <= 30.0));
    let global_lats = global.row_layout().unwrap().latitudes();
    assert!(lats.iter().all(|l| global_lats.iter().any(|g| (g - l).abs() < 1e-12)));
    assert!(!band.is_global());
}

// ============================================================================
// Scanning modes
// ============================================================================

#[test]
fn test_reorder_round_trip_on_reduced_grid() {
    let grid = Grid::reduced_gg(4, pl::octahedral(4), Area::empty()).unwrap();
    let data: Vec<f64> = (0..grid.calculated_number_of_points()).map(|i| i as f64).collect();
    for mode in 1..=4 {
        let to = ScanningMode::from_number(mode).unwrap();
        let there = grid.reorder_new_data(&data, ScanningMode::NorthSouthWestEast, to).unwrap();
        let back = grid.reorder_new_data(&there, to, ScanningMode::NorthSouthWestEast).unwrap();
        assert_eq!(back, data);
    }
}

#[test]
fn test_reorder_rejects_wrong_length() {
    let grid = Grid::regular_ll(Area::empty(), 30.0, 30.0).unwrap();
    let err = grid
        .reorder_new_data(&[1.0, 2.0], ScanningMode::NorthSouthWestEast, ScanningMode::SouthNorthWestEast)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryMismatch);
}

// ============================================================================
// Nearest points
// ============================================================================

#[test]
fn test_nearest_points_carry_values() {
    let grid = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
    let data: Vec<f64> = (0..grid.calculated_number_of_points()).map(|i| i as f64).collect();
    let near = grid.nearest_points(&Point::new(41.0, 21.0), 1, &data).unwrap();
    assert_eq!(near.len(), 1);
    let index = grid.get_index(2, 5).unwrap();
    assert_eq!(near[0].index, index);
    assert_eq!(near[0].value, index as f64);
}

#[test]
fn test_nearest_on_list_is_brute_force() {
    let grid = Grid::list(vec![
        Point::new(0.0, 0.0),
        Point::new(0.0, 10.0),
        Point::new(50.0, 10.0),
    ])
    .unwrap();
    let near = grid.nearest_stencil(&Point::new(1.0, 9.0), 2);
    assert_eq!(near[0].index, 1);
    assert_eq!(near[1].index, 0);
}

#[test]
fn test_rotated_stencil_uses_rotated_frame() {
    let rotation = Rotation::new(-40.0, 10.0);
    let inner = RegularLatLon::new(area((10.0, -10.0, -10.0, 10.0)), 1.0, 1.0).unwrap();
    let grid = Grid::RotatedRegularLatLon(RotatedRegularLatLon::new(inner, rotation));
    // Rotated (0, 0) sits at geographic (50, 10).
    let stencil = grid.stencil(&Point::new(50.0, 10.0), false).unwrap();
    assert_approx_eq!(stencil.target.latitude(), 0.0, 1e-9);
    assert!(stencil.points.iter().any(|p| p.latitude.abs() < 1e-9));
}

// ============================================================================
// Cells
// ============================================================================

#[test]
fn test_global_cell_areas_cover_sphere() {
    for grid in [
        Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap(),
        Grid::reduced_gg(8, pl::octahedral(8), Area::empty()).unwrap(),
    ] {
        let total: f64 = grid.cell_areas().unwrap().iter().sum();
        assert_approx_eq!(total, 4.0 * std::f64::consts::PI, 1e-9);
    }
}

#[test]
fn test_cells_undefined_for_lists() {
    let grid = Grid::list(vec![Point::new(0.0, 0.0)]).unwrap();
    assert_eq!(grid.cell_areas().unwrap_err().kind(), ErrorKind::InvalidConfiguration);
}

// ============================================================================
// Output grid resolution
// ============================================================================

#[test]
fn test_new_grid_from_regional_source_snaps_to_lattice() {
    let source = Grid::regular_ll(area((51.3, 1.1, 20.7, 30.9)), 0.1, 0.1).unwrap();
    let out = Grid::regular_ll(Area::empty(), 1.0, 1.0).unwrap();
    let resolved = out.new_grid(&source).unwrap();
    let a = resolved.area().unwrap();
    assert_approx_eq!(a.north, 51.0, 1e-9);
    assert_approx_eq!(a.south, 21.0, 1e-9);
    assert_approx_eq!(a.west, 2.0, 1e-9);
    assert_approx_eq!(a.east, 30.0, 1e-9);
}

#[test]
fn test_new_grid_keeps_lists() {
    let source = Grid::regular_ll(Area::empty(), 1.0, 1.0).unwrap();
    let out = Grid::list(vec![Point::new(1.0, 2.0)]).unwrap();
    assert!(same_as(&out.new_grid(&source).unwrap(), &out));
}
