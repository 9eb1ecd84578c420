//! Weight kernels.
//!
//! A kernel turns the neighbourhood of one output point into a list of
//! weighted source points. Lsm restriction and missing-value handling are
//! separate steps with default behaviour a kernel may override.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use grid_geometry::Grid;
use regrid_common::numeric::{is_missing, DEGREE_EPSILON};
use regrid_common::{point::longitude_difference, Point, Result};

use crate::lsm::LandSeaMasks;

use super::method::{InterpolationMethod, PolePolicy};

/// One term of an output value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    pub index: usize,
    pub weight: f64,
    /// Angular distance from the output point, radians.
    pub distance: f64,
}

impl WeightedPoint {
    pub fn new(index: usize, weight: f64, distance: f64) -> Self {
        Self {
            index,
            weight,
            distance,
        }
    }
}

/// Everything a kernel may look at for one interpolation.
pub struct KernelContext<'a> {
    pub source: &'a Grid,
    pub output: &'a Grid,
    /// Output points in geographic coordinates, storage order.
    pub output_points: &'a [Point],
    /// Resolved pole policy, never `Default`.
    pub pole: PolePolicy,
    pub masks: Option<&'a LandSeaMasks>,
    pub lsm_factor: f64,
    fallbacks: AtomicUsize,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        source: &'a Grid,
        output: &'a Grid,
        output_points: &'a [Point],
        pole: PolePolicy,
        masks: Option<&'a LandSeaMasks>,
        lsm_factor: f64,
    ) -> Self {
        Self {
            source,
            output,
            output_points,
            pole,
            masks,
            lsm_factor,
            fallbacks: AtomicUsize::new(0),
        }
    }

    pub fn target(&self, index: usize) -> Point {
        self.output_points[index]
    }

    /// Record that a point used a lower-order fallback.
    pub fn note_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

pub trait Kernel: Send + Sync + fmt::Debug {
    fn method(&self) -> InterpolationMethod;

    /// Weights of output point `target` before Lsm and missing handling.
    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>>;

    /// Restrict weights to the land-sea class of the output point.
    fn apply_lsm(
        &self,
        masks: &LandSeaMasks,
        lsm_factor: f64,
        target: usize,
        weights: Vec<WeightedPoint>,
    ) -> Vec<WeightedPoint> {
        lsm_weights(masks, lsm_factor, target, weights)
    }

    /// Weights once missing source values are excluded; `None` when the
    /// output point must be missing.
    fn drop_missing(
        &self,
        _ctx: &KernelContext<'_>,
        _target: usize,
        weights: Vec<WeightedPoint>,
        values: &[f64],
        missing: f64,
    ) -> Result<Option<Vec<WeightedPoint>>> {
        Ok(rescale_without_missing(weights, values, missing))
    }

    fn combine(&self, weights: &[WeightedPoint], values: &[f64]) -> f64 {
        weighted_sum(weights, values)
    }

    /// When the output is a fixed linear map of the input, so its weights
    /// can be cached as a matrix.
    fn data_independent(&self) -> bool {
        true
    }

    /// Everything that shapes this kernel's weights, for cache keys.
    fn cache_tag(&self) -> String {
        self.method().to_string()
    }
}

pub fn weighted_sum(weights: &[WeightedPoint], values: &[f64]) -> f64 {
    weights.iter().map(|w| w.weight * values[w.index]).sum()
}

/// Single weight on the nearest point of `weights`.
pub fn nearest_only(weights: &[WeightedPoint]) -> Option<Vec<WeightedPoint>> {
    weights
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)))
        .map(|w| vec![WeightedPoint::new(w.index, 1.0, w.distance)])
}

/// Scale opposite-class points by `lsm_factor` and renormalise to the
/// original total. Without any same-class point the weights are kept.
///
/// Kernels with negative weights (cubic) can leave a scaled total near zero
/// or of the opposite sign; the positive same-class weights are then used
/// alone.
pub fn lsm_weights(
    masks: &LandSeaMasks,
    lsm_factor: f64,
    target: usize,
    weights: Vec<WeightedPoint>,
) -> Vec<WeightedPoint> {
    let class = masks.output(target);
    let same_class = weights
        .iter()
        .filter(|w| masks.input(w.index) == class)
        .map(|w| w.weight)
        .sum::<f64>();
    let total: f64 = weights.iter().map(|w| w.weight).sum();
    let new_total = same_class + (total - same_class) * lsm_factor;
    if new_total.abs() < f64::EPSILON || new_total.signum() != total.signum() {
        return positive_same_class(masks, class, total, weights);
    }
    let scaled: Vec<WeightedPoint> = weights
        .into_iter()
        .map(|w| {
            let weight = if masks.input(w.index) == class {
                w.weight
            } else {
                w.weight * lsm_factor
            };
            WeightedPoint { weight, ..w }
        })
        .collect();
    let new_total: f64 = scaled.iter().map(|w| w.weight).sum();
    scale(scaled, total / new_total)
}

fn positive_same_class(
    masks: &LandSeaMasks,
    class: bool,
    total: f64,
    weights: Vec<WeightedPoint>,
) -> Vec<WeightedPoint> {
    let kept: f64 = weights
        .iter()
        .filter(|w| w.weight > 0.0 && masks.input(w.index) == class)
        .map(|w| w.weight)
        .sum();
    if kept < f64::EPSILON {
        return weights;
    }
    weights
        .into_iter()
        .map(|w| {
            let weight = if w.weight > 0.0 && masks.input(w.index) == class {
                w.weight * total / kept
            } else {
                0.0
            };
            WeightedPoint { weight, ..w }
        })
        .collect()
}

/// Drop missing points and rescale the rest to the original total. Falls
/// back to the nearest non-missing point when the remaining weights
/// vanish.
pub fn rescale_without_missing(weights: Vec<WeightedPoint>, values: &[f64], missing: f64) -> Option<Vec<WeightedPoint>> {
    if !weights.iter().any(|w| is_missing(values[w.index], missing)) {
        return Some(weights);
    }
    let total: f64 = weights.iter().map(|w| w.weight).sum();
    let kept: Vec<WeightedPoint> = weights
        .into_iter()
        .filter(|w| !is_missing(values[w.index], missing))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let kept_total: f64 = kept.iter().map(|w| w.weight).sum();
    if kept_total.abs() < f64::EPSILON {
        return nearest_only(&kept).map(|n| scale(n, total));
    }
    Some(scale(kept, total / kept_total))
}

pub fn scale(weights: Vec<WeightedPoint>, factor: f64) -> Vec<WeightedPoint> {
    weights
        .into_iter()
        .map(|w| WeightedPoint {
            weight: w.weight * factor,
            ..w
        })
        .collect()
}

/// Position of `lon` between `west` and `east`, in `[0, 1]`.
pub fn longitude_fraction(west: f64, east: f64, lon: f64) -> f64 {
    let span = longitude_difference(west, east);
    if span.abs() < DEGREE_EPSILON {
        return 0.0;
    }
    (longitude_difference(west, lon) / span).clamp(0.0, 1.0)
}

/// Position of `lat` from `north` towards `south`, in `[0, 1]`.
pub fn latitude_fraction(north: f64, south: f64, lat: f64) -> f64 {
    if (north - south).abs() < DEGREE_EPSILON {
        return 0.0;
    }
    ((north - lat) / (north - south)).clamp(0.0, 1.0)
}
