//! Integration tests for the factory and the transform pipelines.

use std::path::Path;
use std::sync::Arc;

use grid_geometry::{Grid, RegularLatLon, RotatedRegularLatLon, Rotation};
use regrid_common::parameter::{DIVERGENCE, U_COMPONENT, VORTICITY, V_COMPONENT};
use regrid_common::{Area, ErrorKind, Parameter, Point, MISSING_VALUE};
use regrid_engine::{
    EngineConfig, Factory, Field, GridField, InterpolationMethod, LsmMethod, PolePolicy, SpectralField, Statistic,
    TransformOutcome, TransformRequest, TransformerKind, Wind,
};
use spectral_transform::{coefficient_index, spectral_len, LegendreMethod};
use test_utils::{
    assert_approx_eq, assert_slice_approx_eq, bitmap, init_tracing, smooth_values, spherical_harmonic_values,
    temp_test_dir, write_fixture,
};

fn factory_with(dir: &Path, configure: impl FnOnce(&mut EngineConfig)) -> Factory {
    let mut config = EngineConfig {
        legendre_method: LegendreMethod::OnFly,
        mapped_cache_dir: dir.join("mapped"),
        shared_cache_dir: dir.join("shared"),
        ..EngineConfig::default()
    };
    configure(&mut config);
    Factory::new(config).unwrap()
}

fn factory(dir: &Path) -> Factory {
    factory_with(dir, |_| {})
}

fn pairs(grid: &Grid) -> Vec<(f64, f64)> {
    grid.generate_grid_1d()
        .iter()
        .map(|p| (p.latitude(), p.longitude()))
        .collect()
}

fn smooth_field(grid: Grid) -> GridField {
    let values = smooth_values(&pairs(&grid));
    GridField::new(Parameter::scalar(130), grid, values).unwrap()
}

fn transformed_grid(outcome: TransformOutcome<Field>) -> GridField {
    match outcome.transformed() {
        Some(Field::Grid(f)) => f,
        other => panic!("expected a grid field, got {:?}", other),
    }
}

fn transformed_spectral(outcome: TransformOutcome<Field>) -> SpectralField {
    match outcome.transformed() {
        Some(Field::Spectral(f)) => f,
        other => panic!("expected a spectral field, got {:?}", other),
    }
}

// ============================================================================
// Grid to grid
// ============================================================================

#[test]
fn test_constant_field_2deg_to_4deg() {
    init_tracing();
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let source = Grid::regular_ll(Area::empty(), 2.0, 2.0).unwrap();
    let n = source.calculated_number_of_points();
    let input: Field = GridField::new(Parameter::scalar(130), source, vec![287.5; n]).unwrap().into();

    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 4.0, 4.0).unwrap())
        .with_method(InterpolationMethod::Bilinear);
    let out = transformed_grid(factory.transform(&input, &request).unwrap());
    assert_eq!(out.values().len(), 46 * 90);
    assert!(out.values().iter().all(|v| (v - 287.5).abs() < 1e-9));
    assert!(!out.has_bitmap());
}

#[test]
fn test_linear_with_lsm_is_rejected() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let input = smooth_field(Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap());
    let output = Grid::regular_ll(Area::empty(), 20.0, 20.0).unwrap();
    let err = factory
        .interpolation_method("linear", 4, &input, &output, true, "predefined", "nearest")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn test_flux_conserving_preserves_area_integral() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let source = Grid::regular_ll(Area::empty(), 2.0, 2.0).unwrap();
    let input = smooth_field(source.clone());
    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 6.0, 6.0).unwrap())
        .with_method(InterpolationMethod::FluxConserving);
    let out = transformed_grid(factory.transform(&input.clone().into(), &request).unwrap());

    let integral = |grid: &Grid, values: &[f64]| -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| v * grid.cell_bounds(i).unwrap().area())
            .sum()
    };
    let before = integral(&source, input.values());
    let after = integral(out.grid(), out.values());
    assert_approx_eq!(after / before, 1.0, 1e-9);
}

#[test]
fn test_default_method_uses_parameter_semantics() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let source = Grid::regular_ll(Area::empty(), 2.0, 2.0).unwrap();
    let output = Grid::regular_ll(Area::empty(), 6.0, 6.0).unwrap();
    let precipitation = GridField::new(Parameter::new(228, 128, "sfc"), source.clone(), vec![1.0; 91 * 180]).unwrap();
    let i = factory
        .interpolation_method("default", 0, &precipitation, &output, false, "off", "default")
        .unwrap();
    assert_eq!(i.method(), InterpolationMethod::FluxConserving);

    let soil = precipitation.clone().with_parameter(Parameter::new(43, 128, "sfc"));
    let i = factory
        .interpolation_method("default", 0, &soil, &output, false, "off", "default")
        .unwrap();
    assert_eq!(i.method(), InterpolationMethod::NearestNeighbour);
}

#[test]
fn test_cubic_beats_bilinear_on_smooth_field() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let input: Field = smooth_field(Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap()).into();
    let targets = vec![
        Point::new(32.5, 47.5),
        Point::new(-12.5, 102.5),
        Point::new(2.5, 182.5),
        Point::new(47.5, 302.5),
    ];
    let expected = smooth_values(&targets.iter().map(|p| (p.latitude(), p.longitude())).collect::<Vec<_>>());
    let list = Grid::list(targets).unwrap();

    let error = |method| {
        let request = TransformRequest::to_grid(list.clone()).with_method(method);
        let out = transformed_grid(factory.transform(&input, &request).unwrap());
        out.values()
            .iter()
            .zip(&expected)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    };
    let cubic = error(InterpolationMethod::Cubic);
    let bilinear = error(InterpolationMethod::Bilinear);
    assert!(cubic < bilinear, "cubic {} bilinear {}", cubic, bilinear);
    assert!(cubic < 1e-3);
}

#[test]
fn test_standard_deviation_of_constant_is_zero() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let source = Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap();
    let input: Field = GridField::new(Parameter::scalar(160), source, vec![3.0; 37 * 72]).unwrap().into();
    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap())
        .with_statistic(Statistic::StandardDeviation);
    let out = transformed_grid(factory.transform(&input, &request).unwrap());
    assert!(out.values().iter().all(|v| v.abs() < 1e-6));
}

// ============================================================================
// Pole policies
// ============================================================================

fn pole_value(factory: &Factory, pole: PolePolicy) -> f64 {
    let source = Grid::regular_gg(8, Area::empty()).unwrap();
    let values = pairs(&source).iter().map(|(_, lon)| lon.to_radians().cos()).collect();
    let input: Field = GridField::new(Parameter::scalar(130), source, values).unwrap().into();
    let request = TransformRequest::to_grid(Grid::list(vec![Point::new(90.0, 0.0)]).unwrap())
        .with_method(InterpolationMethod::Bilinear)
        .with_pole(pole);
    transformed_grid(factory.transform(&input, &request).unwrap()).values()[0]
}

#[test]
fn test_pole_policies() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    assert_approx_eq!(pole_value(&factory, PolePolicy::Nearest), 1.0, 1e-9);
    assert_approx_eq!(pole_value(&factory, PolePolicy::Linear), 1.0, 1e-9);
    assert_approx_eq!(pole_value(&factory, PolePolicy::Average), 0.0, 1e-9);
}

#[test]
fn test_average_pole_with_bitmap_is_not_implemented() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let input: Field = smooth_field(Grid::regular_gg(8, Area::empty()).unwrap()).with_bitmap(true).into();
    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 30.0, 30.0).unwrap())
        .with_pole(PolePolicy::Average);
    let err = factory.transform(&input, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}

// ============================================================================
// Land-sea mask
// ============================================================================

#[test]
fn test_lsm_restricts_to_same_class() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let band = Grid::regular_ll(Area::new(10.0, 0.0, -10.0, 350.0).unwrap(), 10.0, 10.0).unwrap();
    let land: Vec<f64> = pairs(&band).iter().map(|(_, lon)| if *lon < 20.0 { 1.0 } else { 0.0 }).collect();
    let mask = GridField::new(Parameter::scalar(172), band.clone(), land.clone()).unwrap();
    factory
        .lsm_registry()
        .register(LsmMethod::Predefined, Arc::new(move || Ok(mask.clone())))
        .unwrap();

    let values = land.iter().map(|l| l * 100.0).collect();
    let input: Field = GridField::new(Parameter::scalar(167).with_lsm(true), band, values).unwrap().into();
    let target = Grid::list(vec![Point::new(0.0, 14.0)]).unwrap();

    let plain = TransformRequest::to_grid(target.clone()).with_method(InterpolationMethod::Bilinear);
    let out = transformed_grid(factory.transform(&input, &plain).unwrap());
    assert_approx_eq!(out.values()[0], 60.0, 1e-9);

    let masked = plain.with_lsm(LsmMethod::Predefined);
    let out = transformed_grid(factory.transform(&input, &masked).unwrap());
    assert_approx_eq!(out.values()[0], 100.0, 1e-9);
}

#[test]
fn test_cubic_lsm_on_checkerboard_keeps_class_values() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap();
    let land: Vec<f64> = pairs(&grid)
        .iter()
        .map(|(lat, lon)| {
            let block = ((lat + 90.0) / 10.0).floor() as i64 + (lon / 10.0).floor() as i64;
            if block % 2 == 0 { 1.0 } else { 0.0 }
        })
        .collect();
    let mask = GridField::new(Parameter::scalar(172), grid.clone(), land.clone()).unwrap();
    factory
        .lsm_registry()
        .register(LsmMethod::Predefined, Arc::new(move || Ok(mask.clone())))
        .unwrap();

    let values = land.iter().map(|l| l * 100.0).collect();
    let input: Field = GridField::new(Parameter::scalar(167).with_lsm(true), grid, values).unwrap().into();
    let mut points = Vec::new();
    for lat in [-37.3, -21.1, -6.8, 8.6, 23.4, 38.9] {
        for lon in [2.2, 13.7, 27.9, 41.3, 96.6, 178.1, 251.4, 333.8] {
            points.push(Point::new(lat, lon));
        }
    }
    let target = Grid::list(points).unwrap();

    let plain = TransformRequest::to_grid(target).with_method(InterpolationMethod::Cubic);
    let out = transformed_grid(factory.transform(&input, &plain).unwrap());
    assert!(out.values().iter().any(|v| (v - 100.0).abs() > 1e-6 && v.abs() > 1e-6));

    let masked = plain.with_lsm(LsmMethod::Predefined);
    let out = transformed_grid(factory.transform(&input, &masked).unwrap());
    for v in out.values() {
        assert!(v.is_finite());
        assert!((v - 100.0).abs() < 1e-9 || v.abs() < 1e-9, "value {} is neither land nor sea", v);
    }
    assert!(out.values().iter().any(|v| (v - 100.0).abs() < 1e-9));
    assert!(out.values().iter().any(|v| v.abs() < 1e-9));
}

// ============================================================================
// Identity and extraction
// ============================================================================

#[test]
fn test_identity_is_unchanged() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
    let input: Field = smooth_field(grid.clone()).into();
    let outcome = factory.transform(&input, &TransformRequest::to_grid(grid)).unwrap();
    assert!(outcome.is_unchanged());
}

#[test]
fn test_frame_on_identity_is_idempotent() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_ll(Area::new(40.0, 0.0, 0.0, 50.0).unwrap(), 10.0, 10.0).unwrap();
    let input: Field = smooth_field(grid.clone()).into();
    let request = TransformRequest::to_grid(grid).with_frame(1);

    let once = transformed_grid(factory.transform(&input, &request).unwrap());
    assert!(once.has_bitmap());
    assert_eq!(once.frame(), Some(1));
    let interior = once.grid().get_index(2, 2).unwrap();
    assert_eq!(once.values()[interior], MISSING_VALUE);
    assert_ne!(once.values()[0], MISSING_VALUE);

    let twice = transformed_grid(factory.transform(&once.clone().into(), &request).unwrap());
    assert_eq!(twice.values(), once.values());
}

#[test]
fn test_bitmap_file_is_idempotent() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let path = write_fixture(dir.path(), "hole.bitmap", bitmap::HOLE);
    let grid = Grid::regular_ll(Area::new(20.0, 0.0, 0.0, 30.0).unwrap(), 10.0, 10.0).unwrap();
    let input: Field = smooth_field(grid.clone()).into();
    let request = TransformRequest::to_grid(grid).with_bitmap_file(&path);

    let once = transformed_grid(factory.transform(&input, &request).unwrap());
    assert_eq!(once.values().iter().filter(|v| **v == MISSING_VALUE).count(), 2);
    let twice = transformed_grid(factory.transform(&once.clone().into(), &request).unwrap());
    assert_eq!(twice.values(), once.values());
}

// ============================================================================
// Weight matrices
// ============================================================================

#[test]
fn test_weight_matrix_matches_direct_interpolation() {
    let dir = temp_test_dir();
    let direct = factory(dir.path());
    let cached = factory_with(dir.path(), |c| c.use_weight_matrix = true);
    let input: Field = smooth_field(Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap()).into();
    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 7.5, 7.5).unwrap())
        .with_method(InterpolationMethod::Bilinear);

    let expected = transformed_grid(direct.transform(&input, &request).unwrap());
    let first = transformed_grid(cached.transform(&input, &request).unwrap());
    let second = transformed_grid(cached.transform(&input, &request).unwrap());
    assert_slice_approx_eq!(first.values(), expected.values(), 1e-12);
    assert_eq!(first.values(), second.values());

    let stats = cached.cache_stats().weights;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(direct.cache_stats().weights.misses, 0);
}

#[test]
fn test_weight_matrix_keyed_by_point_count() {
    let dir = temp_test_dir();
    let direct = factory(dir.path());
    let cached = factory_with(dir.path(), |c| c.use_weight_matrix = true);
    let input: Field = smooth_field(Grid::regular_ll(Area::empty(), 2.0, 2.0).unwrap()).into();
    let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap())
        .with_method(InterpolationMethod::Average);

    let four = transformed_grid(cached.transform(&input, &request.clone().with_points(4)).unwrap());
    let sixteen = transformed_grid(cached.transform(&input, &request.clone().with_points(16)).unwrap());
    let expected = transformed_grid(direct.transform(&input, &request.with_points(16)).unwrap());
    assert_slice_approx_eq!(sixteen.values(), expected.values(), 1e-12);
    assert_ne!(four.values(), sixteen.values());
    assert_eq!(cached.cache_stats().weights.misses, 2);
}

// ============================================================================
// Spectral pipelines
// ============================================================================

fn gaussian_values(grid: &Grid) -> Vec<f64> {
    let points = pairs(grid);
    spherical_harmonic_values(&points, 1, 0)
        .iter()
        .zip(spherical_harmonic_values(&points, 2, 1))
        .map(|(a, b)| 2.0 + a + 0.25 * b)
        .collect()
}

#[test]
fn test_spectral_round_trip() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();
    let values = gaussian_values(&grid);
    let input: Field = GridField::new(Parameter::scalar(129), grid.clone(), values.clone()).unwrap().into();

    let spectral = transformed_spectral(factory.transform(&input, &TransformRequest::to_spectral(21)).unwrap());
    assert_eq!(spectral.truncation(), 21);
    let back = transformed_grid(factory.transform(&spectral.into(), &TransformRequest::to_grid(grid)).unwrap());
    assert_slice_approx_eq!(back.values(), values, 1e-9);
}

#[test]
fn test_spectral_to_points_matches_grid_values() {
    let dir = temp_test_dir();
    let factory = factory_with(dir.path(), |c| c.legendre_method = LegendreMethod::Shared);
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();
    let values = gaussian_values(&grid);
    let input: Field = GridField::new(Parameter::scalar(129), grid.clone(), values.clone()).unwrap().into();
    let spectral: Field = transformed_spectral(factory.transform(&input, &TransformRequest::to_spectral(21)).unwrap()).into();

    let picks = [0, 17, 400, 1000];
    let points: Vec<Point> = picks.iter().map(|i| grid.generate_grid_1d()[*i]).collect();
    let request = TransformRequest::to_grid(Grid::list(points).unwrap());
    assert_eq!(
        factory.get_transformer(&spectral, &request.target).unwrap().kind(),
        TransformerKind::SpectralToListOfPoints
    );
    let out = transformed_grid(factory.transform(&spectral, &request).unwrap());
    for (k, i) in picks.iter().enumerate() {
        assert_approx_eq!(out.values()[k], values[*i], 1e-9);
    }
}

#[test]
fn test_spectral_to_rotated_grid_keeps_constants() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let mut coefficients = vec![0.0; spectral_len(21)];
    coefficients[0] = 5.0;
    let spectral: Field = SpectralField::new(Parameter::scalar(129), 21, coefficients).unwrap().into();

    let rotated = RotatedRegularLatLon::new(
        RegularLatLon::new(Area::new(20.0, -20.0, -20.0, 20.0).unwrap(), 5.0, 5.0).unwrap(),
        Rotation::new(-40.0, 10.0),
    );
    let request = TransformRequest::to_grid(Grid::RotatedRegularLatLon(rotated));
    let out = transformed_grid(factory.transform(&spectral, &request).unwrap());
    let first = out.values()[0];
    assert!(out.values().iter().all(|v| (v - first).abs() < 1e-9));
}

#[test]
fn test_truncation_change() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let values: Vec<f64> = (0..spectral_len(42)).map(|i| i as f64).collect();
    let spectral: Field = SpectralField::new(Parameter::scalar(129), 42, values.clone()).unwrap().into();

    assert!(factory.transform(&spectral, &TransformRequest::to_spectral(42)).unwrap().is_unchanged());

    let lower = transformed_spectral(factory.transform(&spectral, &TransformRequest::to_spectral(21)).unwrap());
    for m in 0..=21 {
        for n in m..=21 {
            let a = 2 * coefficient_index(21, m, n);
            let b = 2 * coefficient_index(42, m, n);
            assert_eq!(lower.values()[a], values[b]);
        }
    }

    let err = factory.transform(&spectral, &TransformRequest::to_spectral(63)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryMismatch);
}

#[test]
fn test_analysis_with_missing_values_not_implemented() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_gg(16, Area::empty()).unwrap();
    let mut values = gaussian_values(&grid);
    values[3] = MISSING_VALUE;
    let input: Field = GridField::new(Parameter::scalar(129), grid, values).unwrap().with_bitmap(true).into();
    let err = factory.transform(&input, &TransformRequest::to_spectral(21)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}

// ============================================================================
// Winds
// ============================================================================

fn vorticity_divergence(truncation: usize) -> Wind {
    let mut vo = vec![0.0; spectral_len(truncation)];
    vo[2 * coefficient_index(truncation, 0, 1)] = 1e-5;
    let mut d = vec![0.0; spectral_len(truncation)];
    d[2 * coefficient_index(truncation, 1, 2)] = 2e-6;
    Wind {
        u: SpectralField::new(Parameter::new(VORTICITY, 128, "pl"), truncation, vo).unwrap().into(),
        v: SpectralField::new(Parameter::new(DIVERGENCE, 128, "pl"), truncation, d).unwrap().into(),
    }
}

#[test]
fn test_vorticity_divergence_renumbered_to_uv() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let out = factory
        .transform_vector(&vorticity_divergence(21), &TransformRequest::to_spectral(21))
        .unwrap()
        .transformed()
        .unwrap();
    assert_eq!(out.u.parameter().number, U_COMPONENT);
    assert_eq!(out.v.parameter().number, V_COMPONENT);
    assert_eq!(out.u.as_spectral().unwrap().truncation(), 21);
}

#[test]
fn test_vorticity_divergence_kept_when_conversion_off() {
    let dir = temp_test_dir();
    let factory = factory_with(dir.path(), |c| c.vd_conversion = false);
    let outcome = factory
        .transform_vector(&vorticity_divergence(21), &TransformRequest::to_spectral(21))
        .unwrap();
    assert!(outcome.is_unchanged());
}

#[test]
fn test_spectral_winds_on_grid() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let grid = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
    let out = factory
        .transform_vector(&vorticity_divergence(21), &TransformRequest::to_grid(grid.clone()))
        .unwrap()
        .transformed()
        .unwrap();
    let u = out.u.as_grid().unwrap();
    assert_eq!(u.parameter().number, U_COMPONENT);
    assert_eq!(u.values().len(), grid.calculated_number_of_points());
    assert!(u.values().iter().all(|v| v.is_finite()));
    assert!(u.values().iter().any(|v| v.abs() > 0.0));
}

#[test]
fn test_rotated_winds_keep_speed() {
    let dir = temp_test_dir();
    let factory = factory(dir.path());
    let source = Grid::regular_ll(Area::empty(), 5.0, 5.0).unwrap();
    let n = source.calculated_number_of_points();
    let wind = Wind {
        u: GridField::new(Parameter::new(U_COMPONENT, 128, "pl"), source.clone(), vec![10.0; n]).unwrap().into(),
        v: GridField::new(Parameter::new(V_COMPONENT, 128, "pl"), source, vec![0.0; n]).unwrap().into(),
    };
    let rotated = RotatedRegularLatLon::new(
        RegularLatLon::new(Area::new(20.0, -20.0, -20.0, 20.0).unwrap(), 5.0, 5.0).unwrap(),
        Rotation::new(-40.0, 10.0),
    );
    let request = TransformRequest::to_grid(Grid::RotatedRegularLatLon(rotated));
    let out = factory.transform_vector(&wind, &request).unwrap().transformed().unwrap();
    let u = out.u.as_grid().unwrap().values();
    let v = out.v.as_grid().unwrap().values();
    for (a, b) in u.iter().zip(v) {
        assert_approx_eq!((a * a + b * b).sqrt(), 10.0, 1e-9);
    }
    assert!(v.iter().any(|b| b.abs() > 1e-3));
}
