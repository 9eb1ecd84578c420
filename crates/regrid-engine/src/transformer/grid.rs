//! Pipelines with grid point input.

use tracing::debug;

use grid_geometry::{same_as, Grid};
use regrid_common::{RegridError, Result};
use spectral_transform::analyse;

use crate::factory::Factory;
use crate::field::{Field, GridField, SpectralField, TransformOutcome, Wind};

use super::{
    check_vector, componentwise, derived_field, no_statistic, rotate_winds, target_grid, target_truncation, Statistic,
    TransformRequest, Transformer, TransformerKind,
};

/// Values of `field` on `output` with the requested method or statistic.
fn resample(factory: &Factory, field: &GridField, output: &Grid, request: &TransformRequest) -> Result<Vec<f64>> {
    let lsm = request.lsm && field.parameter().lsm;
    if request.lsm && !lsm {
        debug!(parameter = field.parameter().number, "Parameter is not land-sea sensitive, Lsm off");
    }
    let interpolator = factory.interpolator(
        request.method,
        request.points,
        field,
        output,
        lsm,
        request.lsm_method,
        request.pole,
    )?;
    match request.statistic {
        Some(Statistic::StandardDeviation) => interpolator.standard_deviation(field, output),
        Some(Statistic::Derived(parameter)) => interpolator.derived_subgrid_parameters(field, output, parameter),
        None if factory.config().use_weight_matrix && !field.has_bitmap() && interpolator.is_data_independent() => {
            let matrix = factory.weight_cache().matrix(&interpolator, field.grid(), output)?;
            matrix.apply(&field.canonical_values()?)
        }
        None => interpolator.interpolate(field, output),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridToGrid;

impl Transformer for GridToGrid {
    fn kind(&self) -> TransformerKind {
        TransformerKind::GridToGrid
    }

    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        let field = input.as_grid()?;
        let output = target_grid(request)?.new_grid(field.grid())?;
        if request.statistic.is_none() && same_as(field.grid(), &output) {
            if !request.has_extraction() {
                debug!(grid = %output, "Input already on the output grid");
                return Ok(TransformOutcome::Unchanged);
            }
            let values = field.canonical_values()?;
            return Ok(TransformOutcome::Transformed(derived_field(field, output, values, request)?.into()));
        }
        let values = resample(factory, field, &output, request)?;
        Ok(TransformOutcome::Transformed(derived_field(field, output, values, request)?.into()))
    }

    /// Component-wise; winds on a rotated output are turned to its frame.
    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        check_vector(wind)?;
        let u = wind.u.as_grid()?;
        let v = wind.v.as_grid()?;
        if !same_as(u.grid(), v.grid()) {
            return Err(RegridError::geometry_mismatch(format!(
                "wind components on {} and {}",
                u.grid(),
                v.grid()
            )));
        }
        if !target_grid(request)?.is_rotated() {
            return componentwise(self, factory, wind, request);
        }
        let output = target_grid(request)?.new_grid(u.grid())?;
        let mut uv = resample(factory, u, &output, request)?;
        let mut vv = resample(factory, v, &output, request)?;
        rotate_winds(&output, &mut uv, &mut vv, u.missing_value())?;
        Ok(TransformOutcome::Transformed(Wind {
            u: derived_field(u, output.clone(), uv, request)?.into(),
            v: derived_field(v, output, vv, request)?.into(),
        }))
    }
}

/// Gaussian quadrature analysis of a global Gaussian grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridToSpectral;

impl Transformer for GridToSpectral {
    fn kind(&self) -> TransformerKind {
        TransformerKind::GridToSpectral
    }

    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        no_statistic(self.kind(), request)?;
        let field = input.as_grid()?;
        if field.has_missing() {
            return Err(RegridError::not_implemented("spectral analysis of fields with missing values"));
        }
        let truncation = target_truncation(request)?;
        let grid = field.grid();
        let values = field.canonical_values()?;
        let table = factory.polynomials(truncation, grid)?;
        let coefficients = analyse(truncation, &values, grid, &table, false)?;
        let out = SpectralField::with_metadata(
            field.parameter().clone(),
            field.metadata().clone(),
            truncation,
            coefficients,
        )?;
        Ok(TransformOutcome::Transformed(out.into()))
    }
}
