//! Twelve-point cubic kernel.

use grid_geometry::Stencil;
use regrid_common::Result;

use super::four_point::four_point_weights;
use super::kernel::{longitude_fraction, Kernel, KernelContext, WeightedPoint};
use super::method::InterpolationMethod;

/// Cubic in latitude over four rows, cubic in longitude on the two inner
/// rows and linear on the outer two. Falls back to the four-point kernel
/// where the twelve-point stencil does not fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cubic;

/// Lagrange weights of the nodes at -1, 0, 1 and 2 for position `f`.
fn cubic_row(f: f64) -> [f64; 4] {
    [
        -f * (f - 1.0) * (f - 2.0) / 6.0,
        (f + 1.0) * (f - 1.0) * (f - 2.0) / 2.0,
        -(f + 1.0) * f * (f - 2.0) / 2.0,
        (f + 1.0) * f * (f - 1.0) / 6.0,
    ]
}

/// Lagrange weights of arbitrary `nodes` for position `x`.
fn lagrange(nodes: [f64; 4], x: f64) -> [f64; 4] {
    let mut out = [1.0; 4];
    for (k, w) in out.iter_mut().enumerate() {
        for (m, node) in nodes.iter().enumerate() {
            if m != k {
                *w *= (x - node) / (nodes[k] - node);
            }
        }
    }
    out
}

fn twelve_point_weights(stencil: &Stencil) -> Vec<WeightedPoint> {
    let p = &stencil.points;
    let lon = stencil.target.longitude();
    let lat = stencil.target.latitude();
    let rows = lagrange([p[4].latitude, p[0].latitude, p[2].latitude, p[10].latitude], lat);

    let f_top = longitude_fraction(p[4].longitude, p[5].longitude, lon);
    let f_north = longitude_fraction(p[0].longitude, p[1].longitude, lon);
    let f_south = longitude_fraction(p[2].longitude, p[3].longitude, lon);
    let f_bottom = longitude_fraction(p[10].longitude, p[11].longitude, lon);
    let north = cubic_row(f_north);
    let south = cubic_row(f_south);

    let terms = [
        (4, rows[0] * (1.0 - f_top)),
        (5, rows[0] * f_top),
        (6, rows[1] * north[0]),
        (0, rows[1] * north[1]),
        (1, rows[1] * north[2]),
        (7, rows[1] * north[3]),
        (8, rows[2] * south[0]),
        (2, rows[2] * south[1]),
        (3, rows[2] * south[2]),
        (9, rows[2] * south[3]),
        (10, rows[3] * (1.0 - f_bottom)),
        (11, rows[3] * f_bottom),
    ];
    terms
        .iter()
        .map(|&(k, w)| WeightedPoint::new(p[k].index, w, p[k].distance))
        .collect()
}

impl Kernel for Cubic {
    fn method(&self) -> InterpolationMethod {
        InterpolationMethod::Cubic
    }

    fn weights(&self, ctx: &KernelContext<'_>, target: usize) -> Result<Vec<WeightedPoint>> {
        let stencil = ctx.source.stencil(&ctx.target(target), true)?;
        if stencil.is_twelve_point() {
            return Ok(twelve_point_weights(&stencil));
        }
        ctx.note_fallback();
        Ok(four_point_weights(ctx, &stencil))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_geometry::Grid;
    use regrid_common::{Area, Point};

    use super::super::method::PolePolicy;

    #[test]
    fn test_cubic_row_is_partition_of_unity() {
        for f in [0.0, 0.25, 0.5, 0.9] {
            let w = cubic_row(f);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert_eq!(cubic_row(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lagrange_reproduces_cubic() {
        let nodes = [30.0, 20.0, 10.0, 0.0];
        let w = lagrange(nodes, 13.0);
        let cubic = |x: f64| 0.01 * x * x * x - x + 2.0;
        let estimate: f64 = nodes.iter().zip(w).map(|(n, w)| w * cubic(*n)).sum();
        assert!((estimate - cubic(13.0)).abs() < 1e-9);
    }

    #[test]
    fn test_interior_uses_twelve_points() {
        let source = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
        let points = [Point::new(15.0, 15.0), Point::new(85.0, 15.0)];
        let ctx = KernelContext::new(&source, &source, &points, PolePolicy::Nearest, None, 0.0);
        let w = Cubic.weights(&ctx, 0).unwrap();
        assert_eq!(w.len(), 12);
        assert!((w.iter().map(|p| p.weight).sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(ctx.fallbacks(), 0);

        let near_pole = Cubic.weights(&ctx, 1).unwrap();
        assert_eq!(near_pole.len(), 4);
        assert_eq!(ctx.fallbacks(), 1);
    }
}
