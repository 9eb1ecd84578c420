//! Kernels on the four points surrounding a target.

use grid_geometry::{Stencil, StencilKind};
use regrid_common::numeric::{is_missing, DEGREE_EPSILON};
use regrid_common::{point::longitude_difference, Result};

use crate::lsm::LandSeaMasks;

use super::kernel::{
    latitude_fraction, longitude_fraction, lsm_weights, nearest_only, rescale_without_missing, scale, Kernel,
    KernelContext, WeightedPoint,
};
use super::method::InterpolationMethod;
use super::pole;

/// Bilinear weights of a four-point stencil. Edge stencils follow the pole
/// policy.
pub fn four_point_weights(ctx: &KernelContext<'_>, stencil: &Stencil) -> Vec<WeightedPoint> {
    let p = &stencil.points;
    match stencil.kind {
        StencilKind::Edge { .. } => pole::edge_weights(ctx, stencil),
        StencilKind::Projected { i_fraction, j_fraction } => {
            let w = [
                (1.0 - i_fraction) * (1.0 - j_fraction),
                i_fraction * (1.0 - j_fraction),
                (1.0 - i_fraction) * j_fraction,
                i_fraction * j_fraction,
            ];
            p.iter()
                .zip(w)
                .map(|(s, w)| WeightedPoint::new(s.index, w, s.distance))
                .collect()
        }
        StencilKind::Interior if p.len() < 4 => {
            let all: Vec<WeightedPoint> = p.iter().map(|s| WeightedPoint::new(s.index, 0.0, s.distance)).collect();
            nearest_only(&all).unwrap_or_default()
        }
        StencilKind::Interior => {
            let (fn_, fs, t) = fractions(stencil);
            vec![
                WeightedPoint::new(p[0].index, (1.0 - fn_) * (1.0 - t), p[0].distance),
                WeightedPoint::new(p[1].index, fn_ * (1.0 - t), p[1].distance),
                WeightedPoint::new(p[2].index, (1.0 - fs) * t, p[2].distance),
                WeightedPoint::new(p[3].index, fs * t, p[3].distance),
            ]
        }
    }
}

/// Longitude fractions on the north and south rows and the latitude
/// fraction between them.
fn fractions(stencil: &Stencil) -> (f64, f64, f64) {
    let p = &stencil.points;
    let lon = stencil.target.longitude();
    (
        longitude_fraction(p[0].longitude, p[1].longitude, lon),
        longitude_fraction(p[2].longitude, p[3].longitude, lon),
        latitude_fraction(p[0].latitude, p[2].latitude, stencil.target.latitude()),
    )
}

/// Bilinear family: `bilinear`, `bilinearinteger`, `linear`, `linear-fit`,
/// `double-linear` and `double-linear-adjusted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourPoint {
    method: InterpolationMethod,
}

impl FourPoint {
    pub fn new(method: InterpolationMethod) -> Self {
        Self { method }
    }
}

/// Lsm applied first within each row and then between the two rows. A row
/// with no point of the output's class is scaled by `lsm_factor` as a
/// whole.
fn staged_lsm(masks: &LandSeaMasks, lsm_factor: f64, target: usize, weights: Vec<WeightedPoint>) -> Vec<WeightedPoint> {
    if weights.len() != 2 && weights.len() != 4 {
        return lsm_weights(masks, lsm_factor, target, weights);
    }
    let class = masks.output(target);
    let total: f64 = weights.iter().map(|w| w.weight).sum();
    let rows: Vec<(bool, Vec<WeightedPoint>)> = weights
        .chunks(2)
        .map(|row| {
            let matches = row.iter().any(|w| masks.input(w.index) == class);
            (matches, lsm_weights(masks, lsm_factor, target, row.to_vec()))
        })
        .collect();
    if rows.iter().all(|(m, _)| *m) || rows.iter().all(|(m, _)| !*m) {
        return rows.into_iter().flat_map(|(_, r)| r).collect();
    }
    let scaled: Vec<WeightedPoint> = rows
        .into_iter()
        .flat_map(|(matches, row)| if matches { row } else { scale(row, lsm_factor) })
        .collect();
    let new_total: f64 = scaled.iter().map(|w| w.weight).sum();
    if new_total.abs() < f64::EPSILON {
        return scaled;
    }
    scale(scaled, total / new_total)
}

/// One-dimensional fit through the points that remain: along a complete
/// row, else along a meridian, else the nearest point.
fn linear_fallback(stencil: &Stencil, weights: &[WeightedPoint], values: &[f64], missing: f64) -> Option<Vec<WeightedPoint>> {
    let p = &stencil.points;
    let present = |k: usize| !is_missing(values[p[k].index], missing);
    let (fn_, fs, t) = fractions(stencil);
    let pair = |a: usize, b: usize, f: f64| {
        Some(vec![
            WeightedPoint::new(p[a].index, 1.0 - f, p[a].distance),
            WeightedPoint::new(p[b].index, f, p[b].distance),
        ])
    };
    if present(0) && present(1) {
        return pair(0, 1, fn_);
    }
    if present(2) && present(3) {
        return pair(2, 3, fs);
    }
    for (a, b) in [(0, 2), (1, 3)] {
        let aligned = longitude_difference(p[a].longitude, p[b].longitude).abs() < DEGREE_EPSILON;
        if aligned && present(a) && present(b) {
            return pair(a, b, t);
        }
    }
    let remaining: Vec<WeightedPoint> = weights
        .iter()
        .filter(|w| !is_missing(values[w.index], missing))
        .copied()
        .collect();
    nearest_only(&remaining)
}

impl Kernel for FourPoint {
    fn method(&self) -> InterpolationMethod {
        self.method
    }

    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let stencil = ctx.source.stencil(&ctx.target(target), false)?;
        Ok(four_point_weights(ctx, &stencil))
    }

    fn apply_lsm(
        &self,
        masks: &LandSeaMasks,
        lsm_factor: f64,
        target: usize,
        weights: Vec<WeightedPoint>,
    ) -> Vec<WeightedPoint> {
        match self.method {
            InterpolationMethod::LinearFit => staged_lsm(masks, lsm_factor, target, weights),
            InterpolationMethod::DoubleLinear => staged_lsm(masks, 0.0, target, weights),
            _ => lsm_weights(masks, lsm_factor, target, weights),
        }
    }

    fn drop_missing(
        &self,
        ctx: &KernelContext<'_>,
        target: usize,
        weights: Vec<WeightedPoint>,
        values: &[f64],
        missing: f64,
    ) -> Result<Option<Vec<WeightedPoint>>> {
        if !weights.iter().any(|w| is_missing(values[w.index], missing)) {
            return Ok(Some(weights));
        }
        match self.method {
            InterpolationMethod::DoubleLinearAdjusted => {
                let remaining: Vec<WeightedPoint> = weights
                    .into_iter()
                    .filter(|w| !is_missing(values[w.index], missing))
                    .collect();
                Ok(nearest_only(&remaining))
            }
            InterpolationMethod::Linear => {
                let stencil = ctx.source.stencil(&ctx.target(target), false)?;
                if matches!(stencil.kind, StencilKind::Interior) && stencil.points.len() == 4 {
                    Ok(linear_fallback(&stencil, &weights, values, missing))
                } else {
                    Ok(rescale_without_missing(weights, values, missing))
                }
            }
            _ => Ok(rescale_without_missing(weights, values, missing)),
        }
    }

    fn combine(&self, weights: &[WeightedPoint], values: &[f64]) -> f64 {
        let bilinear: f64 = weights.iter().map(|w| w.weight * values[w.index]).sum();
        if self.method != InterpolationMethod::BilinearInteger {
            return bilinear;
        }
        // Snap to the stencil value closest to the bilinear estimate.
        weights
            .iter()
            .filter(|w| w.weight != 0.0)
            .map(|w| values[w.index])
            .min_by(|a, b| (a - bilinear).abs().total_cmp(&(b - bilinear).abs()))
            .unwrap_or(bilinear)
    }

    fn data_independent(&self) -> bool {
        self.method != InterpolationMethod::BilinearInteger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_geometry::Grid;
    use regrid_common::{Area, Point, MISSING_VALUE};

    use super::super::method::PolePolicy;

    /// 3x3 points over 0-20N, 0-20E.
    fn square() -> Grid {
        Grid::regular_ll(Area::new(20.0, 0.0, 0.0, 20.0).unwrap(), 10.0, 10.0).unwrap()
    }

    fn weights(method: InterpolationMethod, target: Point) -> Vec<WeightedPoint> {
        let source = square();
        let points = [target];
        let ctx = KernelContext::new(&source, &source, &points, PolePolicy::Nearest, None, 0.0);
        FourPoint::new(method).weights(&ctx, 0).unwrap()
    }

    #[test]
    fn test_bilinear_weights() {
        let w = weights(InterpolationMethod::Bilinear, Point::new(17.5, 2.5));
        let indices: Vec<usize> = w.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
        let expected = [0.75 * 0.75, 0.25 * 0.75, 0.75 * 0.25, 0.25 * 0.25];
        for (p, e) in w.iter().zip(expected) {
            assert!((p.weight - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bilinear_on_grid_point() {
        let w = weights(InterpolationMethod::Bilinear, Point::new(10.0, 10.0));
        let at: f64 = w.iter().filter(|p| p.index == 4).map(|p| p.weight).sum();
        assert!((at - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_integer_snaps() {
        let k = FourPoint::new(InterpolationMethod::BilinearInteger);
        let w = weights(InterpolationMethod::BilinearInteger, Point::new(15.0, 5.0));
        let values = [1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(k.combine(&w, &values), 2.0);
        assert!(!k.data_independent());
    }

    #[test]
    fn test_double_linear_adjusted_uses_nearest_present() {
        let source = square();
        let points = [Point::new(18.0, 2.0)];
        let ctx = KernelContext::new(&source, &source, &points, PolePolicy::Nearest, None, 0.0);
        let k = FourPoint::new(InterpolationMethod::DoubleLinearAdjusted);
        let w = k.weights(&ctx, 0).unwrap();
        let mut values = vec![1.0; 9];
        values[0] = MISSING_VALUE;
        let w = k.drop_missing(&ctx, 0, w, &values, MISSING_VALUE).unwrap().unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].index, 1);
    }

    #[test]
    fn test_linear_fit_along_row() {
        let source = square();
        let points = [Point::new(15.0, 5.0)];
        let ctx = KernelContext::new(&source, &source, &points, PolePolicy::Nearest, None, 0.0);
        let k = FourPoint::new(InterpolationMethod::Linear);
        let w = k.weights(&ctx, 0).unwrap();
        let mut values = vec![1.0; 9];
        values[3] = MISSING_VALUE;
        let w = k.drop_missing(&ctx, 0, w, &values, MISSING_VALUE).unwrap().unwrap();
        let indices: Vec<usize> = w.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!((w[0].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fit_along_meridian() {
        let source = square();
        let points = [Point::new(12.5, 5.0)];
        let ctx = KernelContext::new(&source, &source, &points, PolePolicy::Nearest, None, 0.0);
        let k = FourPoint::new(InterpolationMethod::Linear);
        let w = k.weights(&ctx, 0).unwrap();
        let mut values = vec![1.0; 9];
        values[1] = MISSING_VALUE;
        values[4] = MISSING_VALUE;
        let w = k.drop_missing(&ctx, 0, w, &values, MISSING_VALUE).unwrap().unwrap();
        let indices: Vec<usize> = w.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert!((w[0].weight - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_double_linear_lsm_is_hard() {
        let masks = LandSeaMasks::from_masks(vec![true, false, false, false, true, false, false, false, false], vec![true]);
        let w = weights(InterpolationMethod::DoubleLinear, Point::new(15.0, 5.0));
        let k = FourPoint::new(InterpolationMethod::DoubleLinear);
        let w = k.apply_lsm(&masks, 0.5, 0, w);
        // Point 1 is sea on the land row and vanishes; point 4 carries its row.
        assert_eq!(w[1].weight, 0.0);
        assert!(w[3].weight > 0.0 && w[2].weight == 0.0);
        let total: f64 = w.iter().map(|p| p.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
