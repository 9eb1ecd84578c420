//! Pipelines with spectral input.

use tracing::debug;

use grid_geometry::{gaussian_for_truncation, Grid};
use regrid_common::parameter::{U_COMPONENT, V_COMPONENT};
use regrid_common::{Area, ErrorKind, RegridError, Result, ScanningMode, MISSING_VALUE};
use spectral_transform::{synthesise_points, synthesise_rows, truncate, vorticity_divergence_to_uv};

use crate::factory::Factory;
use crate::field::{Field, GridField, SpectralField, TransformOutcome, Wind};

use super::{
    check_vector, no_statistic, rotate_winds, synthesised_field, target_grid, target_truncation, TransformRequest,
    Transformer, TransformerKind,
};

/// Truncation to synthesise onto `grid`: lowered to the grid's resolution
/// when auto-resolution is on.
fn output_truncation(factory: &Factory, truncation: usize, grid: &Grid) -> Result<usize> {
    if !factory.config().auto_resolution {
        return Ok(truncation);
    }
    match grid.truncate(truncation) {
        Ok(t) => {
            if t < truncation {
                debug!(from = truncation, to = t, grid = %grid, "Auto-resolution lowered truncation");
            }
            Ok(t)
        }
        Err(e) if e.kind() == ErrorKind::NotImplemented => Ok(truncation),
        Err(e) => Err(e),
    }
}

/// Gaussian number of the intermediate grid for T`truncation`: the
/// resolution table entry, else the quadratic grid.
fn intermediate_gaussian(truncation: usize) -> usize {
    gaussian_for_truncation(truncation).unwrap_or((3 * truncation + 4) / 4)
}

/// Grid point values of T`truncation` coefficients on `grid`. Row grids go
/// through Legendre tables and FFTs, everything else is evaluated per point.
fn synthesise(factory: &Factory, truncation: usize, coefficients: &[f64], grid: &Grid, wind: bool) -> Result<Vec<f64>> {
    match grid.row_layout() {
        Some(layout) if !grid.is_rotated() => {
            let table = factory.polynomials(truncation, grid)?;
            synthesise_rows(truncation, coefficients, &table, layout, factory.synthesis_options(wind))
        }
        _ => synthesise_points(truncation, coefficients, &grid.generate_grid_1d(), wind),
    }
}

/// A spectral wind pair ready for synthesis.
struct SpectralWinds {
    u: SpectralField,
    v: SpectralField,
    /// Coefficients hold `U cos φ` and `V cos φ`.
    cos_scaled: bool,
}

fn converts(factory: &Factory, u: &SpectralField, v: &SpectralField) -> bool {
    factory.config().vd_conversion && u.parameter().is_vorticity() && v.parameter().is_divergence()
}

/// The wind pair at T`to`. A vorticity/divergence pair is converted to u/v
/// when enabled, one truncation higher when `extend` is set.
fn spectral_winds(factory: &Factory, wind: &Wind, to: usize, extend: bool) -> Result<SpectralWinds> {
    check_vector(wind)?;
    let u = wind.u.as_spectral()?;
    let v = wind.v.as_spectral()?;
    if u.truncation() != v.truncation() {
        return Err(RegridError::geometry_mismatch(format!(
            "wind components at T{} and T{}",
            u.truncation(),
            v.truncation()
        )));
    }
    let from = u.truncation();
    if converts(factory, u, v) {
        let out = if extend { to + 1 } else { to };
        let (cu, cv) = vorticity_divergence_to_uv(from, u.values(), v.values(), out)?;
        debug!(from, to = out, "Converted vorticity/divergence to u/v");
        return Ok(SpectralWinds {
            u: u.derive(out, cu)?.with_parameter(u.parameter().renumbered(U_COMPONENT)),
            v: v.derive(out, cv)?.with_parameter(v.parameter().renumbered(V_COMPONENT)),
            cos_scaled: true,
        });
    }
    Ok(SpectralWinds {
        u: u.derive(to, truncate(from, u.values(), to)?)?,
        v: v.derive(to, truncate(from, v.values(), to)?)?,
        cos_scaled: false,
    })
}

/// Synthesise straight onto the requested grid.
fn direct(factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
    let field = input.as_spectral()?;
    let grid = target_grid(request)?.clone();
    let t = output_truncation(factory, field.truncation(), &grid)?;
    let coefficients = truncate(field.truncation(), field.values(), t)?;
    let values = synthesise(factory, t, &coefficients, &grid, false)?;
    let out = synthesised_field(field.parameter().clone(), field.metadata().clone(), grid, values, request)?;
    Ok(TransformOutcome::Transformed(out.into()))
}

fn direct_vector(factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
    let grid = target_grid(request)?;
    let from = wind.u.as_spectral()?.truncation();
    let t = output_truncation(factory, from, grid)?;
    let winds = spectral_winds(factory, wind, t, true)?;
    let component = |f: &SpectralField| -> Result<Field> {
        let values = synthesise(factory, f.truncation(), f.values(), grid, winds.cos_scaled)?;
        Ok(synthesised_field(f.parameter().clone(), f.metadata().clone(), grid.clone(), values, request)?.into())
    };
    Ok(TransformOutcome::Transformed(Wind {
        u: component(&winds.u)?,
        v: component(&winds.v)?,
    }))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralToSpectral;

impl Transformer for SpectralToSpectral {
    fn kind(&self) -> TransformerKind {
        TransformerKind::SpectralToSpectral
    }

    fn transform(&self, _factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        no_statistic(self.kind(), request)?;
        let field = input.as_spectral()?;
        let to = target_truncation(request)?;
        if to == field.truncation() {
            debug!(truncation = to, "Spectral field already at requested truncation");
            return Ok(TransformOutcome::Unchanged);
        }
        let values = truncate(field.truncation(), field.values(), to)?;
        Ok(TransformOutcome::Transformed(field.derive(to, values)?.into()))
    }

    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        no_statistic(self.kind(), request)?;
        let to = target_truncation(request)?;
        let u = wind.u.as_spectral()?;
        let v = wind.v.as_spectral()?;
        if !converts(factory, u, v) && to == u.truncation() && to == v.truncation() {
            return Ok(TransformOutcome::Unchanged);
        }
        let winds = spectral_winds(factory, wind, to, false)?;
        Ok(TransformOutcome::Transformed(Wind {
            u: winds.u.into(),
            v: winds.v.into(),
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralToGrid;

impl Transformer for SpectralToGrid {
    fn kind(&self) -> TransformerKind {
        TransformerKind::SpectralToGrid
    }

    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        no_statistic(self.kind(), request)?;
        direct(factory, input, request)
    }

    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        no_statistic(self.kind(), request)?;
        direct_vector(factory, wind, request)
    }
}

/// Evaluated exactly at each point of the list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralToListOfPoints;

impl Transformer for SpectralToListOfPoints {
    fn kind(&self) -> TransformerKind {
        TransformerKind::SpectralToListOfPoints
    }

    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        no_statistic(self.kind(), request)?;
        direct(factory, input, request)
    }

    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        no_statistic(self.kind(), request)?;
        direct_vector(factory, wind, request)
    }
}

/// Synthesised on a global Gaussian grid, then interpolated onto the
/// rotated grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralToRotatedGrid;

impl SpectralToRotatedGrid {
    /// Values of `field` on `output` through the intermediate grid of
    /// T`base`.
    fn resample(
        factory: &Factory,
        field: &SpectralField,
        base: usize,
        wind: bool,
        output: &Grid,
        request: &TransformRequest,
    ) -> Result<Vec<f64>> {
        let intermediate = Grid::regular_gg(intermediate_gaussian(base), Area::empty())?;
        debug!(truncation = field.truncation(), grid = %intermediate, "Synthesising on intermediate grid");
        let values = synthesise(factory, field.truncation(), field.values(), &intermediate, wind)?;
        let gridded = GridField::with_options(
            field.parameter().clone(),
            field.metadata().clone(),
            intermediate,
            values,
            ScanningMode::default(),
            false,
            MISSING_VALUE,
        )?;
        let interpolator = factory.interpolator(
            request.method,
            request.points,
            &gridded,
            output,
            request.lsm && field.parameter().lsm,
            request.lsm_method,
            request.pole,
        )?;
        interpolator.interpolate(&gridded, output)
    }
}

impl Transformer for SpectralToRotatedGrid {
    fn kind(&self) -> TransformerKind {
        TransformerKind::SpectralToRotatedGrid
    }

    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        no_statistic(self.kind(), request)?;
        let field = input.as_spectral()?;
        let output = target_grid(request)?;
        let t = output_truncation(factory, field.truncation(), output)?;
        let field = field.derive(t, truncate(field.truncation(), field.values(), t)?)?;
        let values = Self::resample(factory, &field, t, false, output, request)?;
        let out = synthesised_field(field.parameter().clone(), field.metadata().clone(), output.clone(), values, request)?;
        Ok(TransformOutcome::Transformed(out.into()))
    }

    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        no_statistic(self.kind(), request)?;
        let output = target_grid(request)?;
        let from = wind.u.as_spectral()?.truncation();
        let t = output_truncation(factory, from, output)?;
        let winds = spectral_winds(factory, wind, t, true)?;
        let mut u = Self::resample(factory, &winds.u, t, winds.cos_scaled, output, request)?;
        let mut v = Self::resample(factory, &winds.v, t, winds.cos_scaled, output, request)?;
        rotate_winds(output, &mut u, &mut v, MISSING_VALUE)?;
        let field = |f: &SpectralField, values: Vec<f64>| -> Result<Field> {
            Ok(synthesised_field(f.parameter().clone(), f.metadata().clone(), output.clone(), values, request)?.into())
        };
        Ok(TransformOutcome::Transformed(Wind {
            u: field(&winds.u, u)?,
            v: field(&winds.v, v)?,
        }))
    }
}
