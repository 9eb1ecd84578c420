//! Area-based kernels: `average-weighted`, `flux-conserving` and
//! `conserving`.
//!
//! Weights come from the overlap of each output cell with the source cells.
//! Cells that catch no source contribution take the nearest source point.

use regrid_common::{RegridError, Result};

use super::kernel::{Kernel, KernelContext, WeightedPoint};
use super::method::InterpolationMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conservative {
    method: InterpolationMethod,
}

impl Conservative {
    pub fn new(method: InterpolationMethod) -> Self {
        Self { method }
    }

    fn nearest(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        ctx.note_fallback();
        ctx.source
            .nearest_stencil(&ctx.target(target), 1)
            .first()
            .map(|p| vec![WeightedPoint::new(p.index, 1.0, p.distance)])
            .ok_or_else(|| RegridError::geometry_mismatch(format!("{} has no points", ctx.source)))
    }
}

impl Kernel for Conservative {
    fn method(&self) -> InterpolationMethod {
        self.method
    }

    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let cell = ctx.output.cell_bounds(target)?;
        let overlaps = ctx.source.overlapping_cells(&cell)?;
        let weights: Vec<WeightedPoint> = match self.method {
            InterpolationMethod::AverageWeighted => {
                let inside: Vec<_> = overlaps
                    .iter()
                    .filter(|o| cell.contains(o.point.latitude, o.point.longitude))
                    .collect();
                let total: f64 = inside.iter().map(|o| o.source_area).sum();
                if total <= 0.0 {
                    return self.nearest(ctx, target);
                }
                inside
                    .iter()
                    .map(|o| WeightedPoint::new(o.point.index, o.source_area / total, o.point.distance))
                    .collect()
            }
            InterpolationMethod::FluxConserving => {
                let total: f64 = overlaps.iter().map(|o| o.overlap).sum();
                if total <= 0.0 {
                    return self.nearest(ctx, target);
                }
                overlaps
                    .iter()
                    .map(|o| WeightedPoint::new(o.point.index, o.overlap / total, o.point.distance))
                    .collect()
            }
            _ => {
                let area = cell.area();
                if area <= 0.0 || overlaps.is_empty() {
                    return self.nearest(ctx, target);
                }
                overlaps
                    .iter()
                    .map(|o| WeightedPoint::new(o.point.index, o.overlap / area, o.point.distance))
                    .collect()
            }
        };
        Ok(weights)
    }
}
