//! Source-point neighbourhoods of a target location.
//!
//! Stencils are purely geometric: they name source indices and their
//! positions, and the interpolation kernels turn them into weights.

use serde::{Deserialize, Serialize};

use regrid_common::{point::longitude_difference, Point};

use crate::cell::CellBounds;
use crate::layout::{Bracket, RowLayout, RowPosition};
use crate::polar_stereographic::PolarStereographic;

/// A source sample taking part in a stencil.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilPoint {
    pub index: usize,
    pub row: usize,
    pub column: usize,
    pub latitude: f64,
    /// Longitude unwrapped to within half a turn of the target.
    pub longitude: f64,
    /// Angular distance to the target in radians.
    pub distance: f64,
}

/// A source sample with its value, as returned by nearest-point queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldPoint {
    pub index: usize,
    pub row: usize,
    pub column: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

impl FieldPoint {
    pub fn new(point: &StencilPoint, value: f64) -> Self {
        Self {
            index: point.index,
            row: point.row,
            column: point.column,
            latitude: point.latitude,
            longitude: point.longitude,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StencilKind {
    /// Points 0..4 are (north, west), (north, east), (south, west),
    /// (south, east). Twelve-point stencils add 4, 5 on the row north of
    /// north; 6, 7 at west-1 and east+1 of north; 8, 9 at west-1 and
    /// east+1 of south; 10, 11 on the row south of south.
    Interior,
    /// Target beyond the outermost row: points 0, 1 bracket it on that row,
    /// 2, 3 on the next row inwards (absent for single-row layouts).
    Edge { north: bool },
    /// Cell of a projected grid, points ordered as in `Interior`, with the
    /// target's fractional position inside the cell.
    Projected { i_fraction: f64, j_fraction: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stencil {
    pub kind: StencilKind,
    pub points: Vec<StencilPoint>,
    /// Target position in the source grid's frame.
    pub target: Point,
}

impl Stencil {
    pub fn is_twelve_point(&self) -> bool {
        matches!(self.kind, StencilKind::Interior) && self.points.len() == 12
    }

    /// Index of the nearest stencil point, ties broken by source index.
    pub fn nearest(&self) -> Option<&StencilPoint> {
        self.points
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)))
    }
}

/// A source cell overlapping a destination cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellOverlap {
    pub point: StencilPoint,
    /// Overlap area on the unit sphere.
    pub overlap: f64,
    /// Full area of the source cell.
    pub source_area: f64,
}

fn make_point(layout: &RowLayout, row: usize, column: usize, longitude: f64, target: &Point) -> StencilPoint {
    let r = &layout.rows()[row];
    let p = Point::new(r.latitude, longitude);
    StencilPoint {
        index: r.offset + column,
        row,
        column,
        latitude: r.latitude,
        longitude,
        distance: target.angular_distance(&p),
    }
}

fn bracket_points(layout: &RowLayout, row: usize, b: &Bracket, target: &Point) -> [StencilPoint; 2] {
    [
        make_point(layout, row, b.west, b.west_longitude, target),
        make_point(layout, row, b.east, b.east_longitude, target),
    ]
}

/// Four- or twelve-point stencil around `target` on a row layout.
///
/// The twelve-point form is only returned when every extra point exists;
/// otherwise the four inner points are used.
pub fn structured(layout: &RowLayout, target: &Point, twelve: bool) -> Stencil {
    let rows = layout.rows();
    let last = rows.len() - 1;
    let lon = target.longitude();
    match layout.position(target.latitude()) {
        RowPosition::NorthOf => edge(layout, 0, 1.min(last), true, target),
        RowPosition::SouthOf => edge(layout, last, last.saturating_sub(1), false, target),
        RowPosition::Between { north, south } => {
            let bn = rows[north].bracket(lon);
            let bs = rows[south].bracket(lon);
            let mut points = Vec::with_capacity(if twelve { 12 } else { 4 });
            points.extend(bracket_points(layout, north, &bn, target));
            points.extend(bracket_points(layout, south, &bs, target));
            if twelve {
                if let Some(extra) = twelve_point_extension(layout, north, south, &bn, &bs, target) {
                    points.extend(extra);
                }
            }
            Stencil {
                kind: StencilKind::Interior,
                points,
                target: *target,
            }
        }
    }
}

fn edge(layout: &RowLayout, outer: usize, inner: usize, north: bool, target: &Point) -> Stencil {
    let rows = layout.rows();
    let lon = target.longitude();
    let bo = rows[outer].bracket(lon);
    let mut points = Vec::with_capacity(4);
    points.extend(bracket_points(layout, outer, &bo, target));
    if inner != outer {
        let bi = rows[inner].bracket(lon);
        points.extend(bracket_points(layout, inner, &bi, target));
    }
    Stencil {
        kind: StencilKind::Edge { north },
        points,
        target: *target,
    }
}

fn twelve_point_extension(
    layout: &RowLayout,
    north: usize,
    south: usize,
    bn: &Bracket,
    bs: &Bracket,
    target: &Point,
) -> Option<Vec<StencilPoint>> {
    let rows = layout.rows();
    if north == south || north == 0 || south + 1 >= rows.len() || !bn.inside || !bs.inside {
        return None;
    }
    let lon = target.longitude();
    let outer_north = rows[north - 1].bracket(lon);
    let outer_south = rows[south + 1].bracket(lon);
    if !outer_north.inside || !outer_south.inside || outer_north.west == outer_north.east || outer_south.west == outer_south.east {
        return None;
    }
    let mut extra = Vec::with_capacity(8);
    extra.extend(bracket_points(layout, north - 1, &outer_north, target));
    for (row, b) in [(north, bn), (south, bs)] {
        let r = &rows[row];
        if r.count < 4 {
            return None;
        }
        let west = r.wrap(b.west as isize - 1)?;
        let east = r.wrap(b.east as isize + 1)?;
        extra.push(make_point(layout, row, west, b.west_longitude - r.increment, target));
        extra.push(make_point(layout, row, east, b.east_longitude + r.increment, target));
    }
    extra.extend(bracket_points(layout, south + 1, &outer_south, target));
    Some(extra)
}

/// Row-layout point closest in row/column terms given the target position.
fn centre_rows(layout: &RowLayout, target: &Point) -> (usize, usize) {
    let last = layout.number_of_rows() - 1;
    match layout.position(target.latitude()) {
        RowPosition::Between { north, south } => (north, south),
        RowPosition::NorthOf => (0, 0),
        RowPosition::SouthOf => (last, last),
    }
}

fn sort_and_take(mut candidates: Vec<StencilPoint>, k: usize) -> Vec<StencilPoint> {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
    candidates.truncate(k);
    candidates
}

fn layout_window(layout: &RowLayout, target: &Point, north: usize, south: usize, ring: usize) -> Vec<StencilPoint> {
    let rows = layout.rows();
    let first = north.saturating_sub(ring);
    let last = (south + ring).min(rows.len() - 1);
    let lon = target.longitude();
    let mut out = Vec::new();
    for j in first..=last {
        let row = &rows[j];
        let half = ring + 1;
        if row.count <= 2 * half + 1 {
            for k in 0..row.count {
                let l = lon + longitude_difference(lon, row.longitude(k));
                out.push(make_point(layout, j, k, l, target));
            }
            continue;
        }
        let centre = row.nearest_column(lon) as isize;
        for d in -(half as isize)..=(half as isize) {
            if let Some(k) = row.wrap(centre + d) {
                let l = lon + longitude_difference(lon, row.longitude(k));
                out.push(make_point(layout, j, k, l, target));
            }
        }
    }
    out
}

/// The `k` points of a row layout nearest to `target`, by angular
/// distance then ascending index.
///
/// The search widens a window around the target's rows until it holds
/// `k` candidates, then takes one more ring so that points just outside
/// the first window can still win.
pub fn nearest_in_layout(layout: &RowLayout, target: &Point, k: usize) -> Vec<StencilPoint> {
    let k = k.min(layout.number_of_points());
    if k == 0 {
        return Vec::new();
    }
    let (north, south) = centre_rows(layout, target);
    let mut ring = 0;
    loop {
        let candidates = layout_window(layout, target, north, south, ring);
        if candidates.len() >= layout.number_of_points() {
            return sort_and_take(candidates, k);
        }
        if candidates.len() >= k {
            return sort_and_take(layout_window(layout, target, north, south, ring + 1), k);
        }
        ring += 1;
    }
}

/// Brute-force nearest points of an unstructured point list.
pub fn nearest_in_list(points: &[Point], target: &Point, k: usize) -> Vec<StencilPoint> {
    let lon = target.longitude();
    let candidates = points
        .iter()
        .enumerate()
        .map(|(index, p)| StencilPoint {
            index,
            row: 0,
            column: index,
            latitude: p.latitude(),
            longitude: lon + longitude_difference(lon, p.longitude()),
            distance: target.angular_distance(p),
        })
        .collect();
    sort_and_take(candidates, k)
}

fn projected_point(grid: &PolarStereographic, i: usize, j: usize, target: &Point) -> StencilPoint {
    let p = grid.grid_to_geo(i as f64, j as f64);
    let lon = target.longitude();
    StencilPoint {
        index: j * grid.nx + i,
        row: j,
        column: i,
        latitude: p.latitude(),
        longitude: lon + longitude_difference(lon, p.longitude()),
        distance: target.angular_distance(&p),
    }
}

fn projected_centre(grid: &PolarStereographic, target: &Point) -> (f64, f64) {
    let (fi, fj) = grid.geo_to_grid(target.latitude(), target.longitude());
    (
        fi.clamp(0.0, (grid.nx - 1) as f64),
        fj.clamp(0.0, (grid.ny - 1) as f64),
    )
}

/// Nearest points of a polar stereographic grid, searching a widening
/// window in index space.
pub fn nearest_in_projection(grid: &PolarStereographic, target: &Point, k: usize) -> Vec<StencilPoint> {
    let k = k.min(grid.number_of_points());
    if k == 0 {
        return Vec::new();
    }
    let (fi, fj) = projected_centre(grid, target);
    let (ci, cj) = (fi.round() as usize, fj.round() as usize);
    let window = |ring: usize| {
        let mut out = Vec::new();
        let (i0, i1) = (ci.saturating_sub(ring), (ci + ring).min(grid.nx - 1));
        let (j0, j1) = (cj.saturating_sub(ring), (cj + ring).min(grid.ny - 1));
        for j in j0..=j1 {
            for i in i0..=i1 {
                out.push(projected_point(grid, i, j, target));
            }
        }
        out
    };
    let mut ring = 1;
    loop {
        let candidates = window(ring);
        if candidates.len() >= grid.number_of_points() {
            return sort_and_take(candidates, k);
        }
        if candidates.len() >= k {
            return sort_and_take(window(ring + 1), k);
        }
        ring += 1;
    }
}

/// Four-point cell of a projected grid containing the target (clamped to
/// the grid's extent).
pub fn projected(grid: &PolarStereographic, target: &Point) -> Stencil {
    let (fi, fj) = projected_centre(grid, target);
    let i0 = if grid.nx > 1 { (fi.floor() as usize).min(grid.nx - 2) } else { 0 };
    let j0 = if grid.ny > 1 { (fj.floor() as usize).min(grid.ny - 2) } else { 0 };
    let i1 = (i0 + 1).min(grid.nx - 1);
    let j1 = (j0 + 1).min(grid.ny - 1);
    let points = vec![
        projected_point(grid, i0, j0, target),
        projected_point(grid, i1, j0, target),
        projected_point(grid, i0, j1, target),
        projected_point(grid, i1, j1, target),
    ];
    Stencil {
        kind: StencilKind::Projected {
            i_fraction: if i1 > i0 { fi - i0 as f64 } else { 0.0 },
            j_fraction: if j1 > j0 { fj - j0 as f64 } else { 0.0 },
        },
        points,
        target: *target,
    }
}

/// Source cells of a row layout overlapping `cell`, with overlap areas.
pub fn overlapping_cells(layout: &RowLayout, cell: &CellBounds) -> Vec<CellOverlap> {
    let rows = layout.rows();
    let centre = Point::new((cell.north + cell.south) / 2.0, (cell.west + cell.east) / 2.0);
    let first = rows.partition_point(|r| r.latitude > cell.north).saturating_sub(1);
    let last = rows.partition_point(|r| r.latitude >= cell.south).min(rows.len() - 1);
    let mut out = Vec::new();
    for j in first..=last {
        let (north, south) = layout.latitude_bounds(j);
        if north <= cell.south || south >= cell.north {
            continue;
        }
        let row = &rows[j];
        let mut columns: Vec<usize> = Vec::new();
        for shift in [-360.0, 0.0, 360.0] {
            let lo = ((cell.west + shift - row.increment / 2.0 - row.first_longitude) / row.increment).ceil() as isize;
            let hi = ((cell.east + shift + row.increment / 2.0 - row.first_longitude) / row.increment).floor() as isize;
            if hi < lo {
                continue;
            }
            if row.full_circle && (hi - lo + 1) as usize >= row.count {
                columns = (0..row.count).collect();
                break;
            }
            for k in lo..=hi {
                let candidate = if row.full_circle { row.wrap(k) } else if k >= 0 && (k as usize) < row.count { Some(k as usize) } else { None };
                if let Some(c) = candidate {
                    if !columns.contains(&c) {
                        columns.push(c);
                    }
                }
            }
        }
        for k in columns {
            let bounds = layout.cell_bounds(j, k);
            let overlap = cell.overlap(&bounds);
            if overlap > 0.0 {
                let lon = centre.longitude() + longitude_difference(centre.longitude(), row.longitude(k));
                out.push(CellOverlap {
                    point: make_point(layout, j, k, lon, &centre),
                    overlap,
                    source_area: bounds.area(),
                });
            }
        }
    }
    out.sort_by_key(|c| c.point.index);
    out
}
