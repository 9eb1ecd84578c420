//! Weights for output points beyond the first or last source row.

use tracing::debug;

use grid_geometry::{Stencil, StencilKind};
use regrid_common::numeric::{same_within, DEGREE_EPSILON};
use regrid_common::Point;

use super::kernel::{longitude_fraction, KernelContext, WeightedPoint};
use super::method::PolePolicy;

/// Weights of an edge stencil under the context's pole policy.
///
/// Points 0 and 1 bracket the target on the outermost row, 2 and 3 on the
/// next row inwards.
pub fn edge_weights(ctx: &KernelContext<'_>, stencil: &Stencil) -> Vec<WeightedPoint> {
    let north = matches!(stencil.kind, StencilKind::Edge { north: true });
    match ctx.pole {
        PolePolicy::Linear if stencil.points.len() >= 4 => meridian_extrapolation(stencil),
        PolePolicy::Average if same_within(stencil.target.latitude().abs(), 90.0, DEGREE_EPSILON) => {
            match polar_average(ctx, stencil, north) {
                Some(w) => w,
                None => {
                    debug!(north, "Outer row does not close the circle, using nearest row");
                    ctx.note_fallback();
                    outer_row(stencil)
                }
            }
        }
        _ => outer_row(stencil),
    }
}

/// Clamp to the outermost row, interpolating along it.
fn outer_row(stencil: &Stencil) -> Vec<WeightedPoint> {
    let p = &stencil.points;
    if p.len() < 2 {
        return p.iter().map(|s| WeightedPoint::new(s.index, 1.0, s.distance)).collect();
    }
    let f = longitude_fraction(p[0].longitude, p[1].longitude, stencil.target.longitude());
    vec![
        WeightedPoint::new(p[0].index, 1.0 - f, p[0].distance),
        WeightedPoint::new(p[1].index, f, p[1].distance),
    ]
}

fn meridian_extrapolation(stencil: &Stencil) -> Vec<WeightedPoint> {
    let p = &stencil.points;
    let lon = stencil.target.longitude();
    let (outer, inner) = (p[0].latitude, p[2].latitude);
    if (inner - outer).abs() < DEGREE_EPSILON {
        return outer_row(stencil);
    }
    let t = (stencil.target.latitude() - outer) / (inner - outer);
    let fo = longitude_fraction(p[0].longitude, p[1].longitude, lon);
    let fi = longitude_fraction(p[2].longitude, p[3].longitude, lon);
    vec![
        WeightedPoint::new(p[0].index, (1.0 - t) * (1.0 - fo), p[0].distance),
        WeightedPoint::new(p[1].index, (1.0 - t) * fo, p[1].distance),
        WeightedPoint::new(p[2].index, t * (1.0 - fi), p[2].distance),
        WeightedPoint::new(p[3].index, t * fi, p[3].distance),
    ]
}

/// Mean of the whole outermost row, when it closes the circle.
fn polar_average(ctx: &KernelContext<'_>, stencil: &Stencil, north: bool) -> Option<Vec<WeightedPoint>> {
    let layout = ctx.source.row_layout()?;
    let rows = layout.rows();
    let row = if north { rows.first()? } else { rows.last()? };
    if !row.full_circle || row.count == 0 {
        return None;
    }
    let weight = 1.0 / row.count as f64;
    Some(
        (0..row.count)
            .map(|k| {
                let p = Point::new(row.latitude, row.longitude(k));
                WeightedPoint::new(row.offset + k, weight, stencil.target.angular_distance(&p))
            })
            .collect(),
    )
}
