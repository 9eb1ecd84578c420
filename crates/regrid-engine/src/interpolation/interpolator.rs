//! The interpolator: a kernel plus its options, applied over every output
//! point in parallel.

use rayon::prelude::*;
use tracing::debug;

use grid_geometry::Grid;
use regrid_common::numeric::is_missing;
use regrid_common::{RegridError, Result};

use crate::field::GridField;
use crate::lsm::LandSeaMasks;

use super::derivatives::{partial_derivatives, DerivedParameter, Klm};
use super::kernel::{Kernel, KernelContext, WeightedPoint};
use super::method::{InterpolationMethod, PolePolicy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatorOptions {
    pub pole: PolePolicy,
    /// Weight multiplier of opposite-class points when Lsm is on.
    pub lsm_factor: f64,
}

impl Default for InterpolatorOptions {
    fn default() -> Self {
        Self {
            pole: PolePolicy::Default,
            lsm_factor: 0.0,
        }
    }
}

/// Source values prepared for one interpolation.
struct Input<'a> {
    grid: &'a Grid,
    values: &'a [f64],
    /// Whether missing values must be looked for.
    bitmap: bool,
    missing: f64,
}

impl<'a> Input<'a> {
    fn new(grid: &'a Grid, values: &'a [f64], bitmap: bool, missing: f64) -> Self {
        Self {
            grid,
            values,
            bitmap,
            missing,
        }
    }
}

#[derive(Debug)]
pub struct Interpolator {
    kernel: Box<dyn Kernel>,
    options: InterpolatorOptions,
    masks: Option<LandSeaMasks>,
}

impl Interpolator {
    pub fn new(kernel: Box<dyn Kernel>, options: InterpolatorOptions, masks: Option<LandSeaMasks>) -> Self {
        Self { kernel, options, masks }
    }

    pub fn method(&self) -> InterpolationMethod {
        self.kernel.method()
    }

    pub fn options(&self) -> &InterpolatorOptions {
        &self.options
    }

    pub fn uses_lsm(&self) -> bool {
        self.masks.is_some()
    }

    /// Whether the output is a fixed sparse map of the input that can be
    /// cached.
    pub fn is_data_independent(&self) -> bool {
        self.kernel.data_independent() && self.masks.is_none()
    }

    pub fn cache_tag(&self) -> String {
        self.kernel.cache_tag()
    }

    fn check(&self, source: &Grid, output: &Grid) -> Result<()> {
        if self.method().is_area_based() && !(source.has_cells() && output.has_cells()) {
            return Err(RegridError::invalid_configuration(format!(
                "{} needs cell geometry on both grids, got {} and {}",
                self.method(),
                source.kind(),
                output.kind()
            )));
        }
        if let Some(masks) = &self.masks {
            masks.check(source, output)?;
        }
        Ok(())
    }

    /// Values of `field` resampled onto `output`, in canonical order.
    pub fn interpolate(&self, field: &GridField, output: &Grid) -> Result<Vec<f64>> {
        let values = field.canonical_values()?;
        let input = Input::new(field.grid(), &values, field.has_bitmap(), field.missing_value());
        self.interpolate_values(&input, output)
    }

    fn interpolate_values(&self, input: &Input<'_>, output: &Grid) -> Result<Vec<f64>> {
        self.check(input.grid, output)?;
        input.grid.check_values(input.values)?;
        let points = output.generate_grid_1d();
        let pole = self.options.pole.resolve(input.bitmap)?;
        let ctx = KernelContext::new(
            input.grid,
            output,
            &points,
            pole,
            self.masks.as_ref(),
            self.options.lsm_factor,
        );
        let values = (0..points.len())
            .into_par_iter()
            .map(|i| self.value_at(&ctx, i, input))
            .collect::<Result<Vec<f64>>>()?;
        if ctx.fallbacks() > 0 {
            debug!(method = %self.method(), points = ctx.fallbacks(), "Used lower-order fallback");
        }
        debug!(
            method = %self.method(),
            from = %input.grid,
            to = %output,
            lsm = self.uses_lsm(),
            "Interpolated field"
        );
        Ok(values)
    }

    fn point_weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let weights = self.kernel.weights(ctx, target)?;
        Ok(match ctx.masks {
            Some(masks) => self.kernel.apply_lsm(masks, ctx.lsm_factor, target, weights),
            None => weights,
        })
    }

    fn value_at(&self, ctx: &KernelContext<'_>, target: usize, input: &Input<'_>) -> Result<f64> {
        let weights = self.point_weights(ctx, target)?;
        let weights = if input.bitmap {
            match self
                .kernel
                .drop_missing(ctx, target, weights, input.values, input.missing)?
            {
                Some(w) => w,
                None => return Ok(input.missing),
            }
        } else {
            weights
        };
        Ok(self.kernel.combine(&weights, input.values))
    }

    /// Weights of every output point for a field without missing values.
    pub fn weights_for(&self, source: &Grid, output: &Grid) -> Result<Vec<Vec<WeightedPoint>>> {
        self.check(source, output)?;
        let points = output.generate_grid_1d();
        let pole = self.options.pole.resolve(false)?;
        let ctx = KernelContext::new(source, output, &points, pole, self.masks.as_ref(), self.options.lsm_factor);
        (0..points.len())
            .into_par_iter()
            .map(|i| self.point_weights(&ctx, i))
            .collect()
    }

    /// `sqrt(max(0, I(x²) − I(x)²))` with this interpolator's kernel.
    pub fn standard_deviation(&self, field: &GridField, output: &Grid) -> Result<Vec<f64>> {
        let values = field.canonical_values()?;
        let missing = field.missing_value();
        let bitmap = field.has_bitmap();
        let squares: Vec<f64> = values
            .iter()
            .map(|v| if bitmap && is_missing(*v, missing) { *v } else { v * v })
            .collect();
        let mean = self.interpolate_values(&Input::new(field.grid(), &values, bitmap, missing), output)?;
        let mean_square = self.interpolate_values(&Input::new(field.grid(), &squares, bitmap, missing), output)?;
        Ok(mean
            .iter()
            .zip(&mean_square)
            .map(|(m, s)| {
                if bitmap && (is_missing(*m, missing) || is_missing(*s, missing)) {
                    missing
                } else {
                    (s - m * m).max(0.0).sqrt()
                }
            })
            .collect())
    }

    /// Sub-grid orography parameter of `field` on `output`: the gradient
    /// terms are interpolated and combined per output point.
    pub fn derived_subgrid_parameters(
        &self,
        field: &GridField,
        output: &Grid,
        parameter: DerivedParameter,
    ) -> Result<Vec<f64>> {
        let values = field.canonical_values()?;
        let missing = field.missing_value();
        let derivatives = partial_derivatives(field.grid(), &values, missing)?;
        let klm = Klm::from_derivatives(&derivatives, missing);
        let bitmap = field.has_bitmap() || klm.k.iter().any(|v| is_missing(*v, missing));
        let grid = field.grid();
        let k = self.interpolate_values(&Input::new(grid, &klm.k, bitmap, missing), output)?;
        let l = self.interpolate_values(&Input::new(grid, &klm.l, bitmap, missing), output)?;
        let m = self.interpolate_values(&Input::new(grid, &klm.m, bitmap, missing), output)?;
        debug!(%parameter, points = k.len(), "Derived sub-grid parameter");
        Ok(k.iter()
            .zip(&l)
            .zip(&m)
            .map(|((k, l), m)| {
                if is_missing(*k, missing) || is_missing(*l, missing) || is_missing(*m, missing) {
                    missing
                } else {
                    parameter.calculate(*k, *l, *m)
                }
            })
            .collect())
    }
}
