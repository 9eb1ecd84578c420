//! Kernels on the `n` nearest source points.

use regrid_common::{RegridError, Result};

use crate::lsm::LandSeaMasks;

use super::kernel::{Kernel, KernelContext, WeightedPoint};
use super::method::InterpolationMethod;

/// Number of candidates examined when none is requested.
pub const DEFAULT_CANDIDATES: usize = 4;

fn nearest(ctx: &KernelContext<'_>, target: usize, count: usize) -> Result<Vec<WeightedPoint>> {
    let found = ctx.source.nearest_stencil(&ctx.target(target), count.max(1));
    if found.is_empty() {
        return Err(RegridError::geometry_mismatch(format!("{} has no points", ctx.source)));
    }
    Ok(found
        .iter()
        .map(|p| WeightedPoint::new(p.index, 0.0, p.distance))
        .collect())
}

/// Value of the nearest source point. The other candidates carry zero
/// weight and stand in when the nearest is missing or of the wrong
/// land-sea class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearestNeighbour {
    candidates: usize,
}

impl NearestNeighbour {
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates: if candidates == 0 { DEFAULT_CANDIDATES } else { candidates },
        }
    }
}

impl Kernel for NearestNeighbour {
    fn method(&self) -> InterpolationMethod {
        InterpolationMethod::NearestNeighbour
    }

    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let mut points = nearest(ctx, target, self.candidates)?;
        points[0].weight = 1.0;
        Ok(points)
    }

    fn cache_tag(&self) -> String {
        format!("{}{}", self.method(), self.candidates)
    }

    /// First candidate of the output point's class, else the nearest.
    fn apply_lsm(
        &self,
        masks: &LandSeaMasks,
        _lsm_factor: f64,
        target: usize,
        weights: Vec<WeightedPoint>,
    ) -> Vec<WeightedPoint> {
        let class = masks.output(target);
        let chosen = weights
            .iter()
            .position(|w| masks.input(w.index) == class)
            .unwrap_or(0);
        weights
            .into_iter()
            .enumerate()
            .map(|(k, w)| WeightedPoint {
                weight: if k == chosen { 1.0 } else { 0.0 },
                ..w
            })
            .collect()
    }
}

/// Unweighted mean of the `n` nearest points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Average {
    count: usize,
}

impl Average {
    pub fn new(count: usize) -> Self {
        Self {
            count: if count == 0 { DEFAULT_CANDIDATES } else { count },
        }
    }
}

impl Kernel for Average {
    fn method(&self) -> InterpolationMethod {
        InterpolationMethod::Average
    }

    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let mut points = nearest(ctx, target, self.count)?;
        let weight = 1.0 / points.len() as f64;
        for p in &mut points {
            p.weight = weight;
        }
        Ok(points)
    }

    fn cache_tag(&self) -> String {
        format!("{}{}", self.method(), self.count)
    }
}
