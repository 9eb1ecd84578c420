//! The closed set of grid variants.
//!
//! Row-structured variants (lat/lon, Gaussian, reduced, cell-centred and
//! rotated) all materialise a [`RowLayout`] at construction; queries go
//! through it. Point lists and polar stereographic grids carry their own
//! geometry.

use std::fmt;

use tracing::debug;

use regrid_common::{numeric::same, Area, Point, RegridError, Result, ScanningMode};

use crate::cell::CellBounds;
use crate::gaussian::{truncation_for_gaussian, truncation_for_increment, GaussianLatitudes};
use crate::layout::{Row, RowLayout};
use crate::polar_stereographic::PolarStereographic;
use crate::rotation::Rotation;
use crate::stencil::{self, CellOverlap, FieldPoint, Stencil, StencilPoint};

/// Discriminant of [`Grid`], used for method selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    RegularLatLon,
    ReducedLatLon,
    RegularGaussian,
    ReducedGaussian,
    PseudoRegularGaussian,
    RotatedRegularLatLon,
    RegularLatLonCellCentered,
    ListOfPoints,
    PolarStereographic,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GridKind::RegularLatLon => "regular_ll",
            GridKind::ReducedLatLon => "reduced_ll",
            GridKind::RegularGaussian => "regular_gg",
            GridKind::ReducedGaussian => "reduced_gg",
            GridKind::PseudoRegularGaussian => "pseudo_regular_gg",
            GridKind::RotatedRegularLatLon => "rotated_ll",
            GridKind::RegularLatLonCellCentered => "regular_ll_cell_centred",
            GridKind::ListOfPoints => "list",
            GridKind::PolarStereographic => "polar_stereographic",
        };
        f.write_str(s)
    }
}

/// Points in `span` degrees at `increment` spacing, endpoints included.
fn lattice_count(span: f64, increment: f64) -> usize {
    (span / increment + 1e-6).floor() as usize + 1
}

/// Whether `count` points `increment` apart close the circle.
fn closes_circle(count: usize, increment: f64) -> bool {
    (count as f64 * increment - 360.0).abs() < 1e-6 * 360.0
}

fn check_increment(name: &str, value: f64) -> Result<()> {
    if value <= 0.0 || !value.is_finite() {
        return Err(RegridError::geometry_mismatch(format!(
            "{} increment must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// A row with `per_circle` points around the globe, restricted to the
/// longitudes of `area`. Columns sit on multiples of `360 / per_circle`.
fn circle_row(latitude: f64, per_circle: usize, west: f64, east: f64) -> Option<Row> {
    let inc = 360.0 / per_circle as f64;
    let k0 = (west / inc - 1e-6).ceil();
    if east - west >= 360.0 - inc - 1e-6 {
        return Some(Row::new(latitude, k0 * inc, inc, per_circle, true));
    }
    let k1 = (east / inc + 1e-6).floor();
    if k1 < k0 {
        return None;
    }
    let count = ((k1 - k0) as usize + 1).min(per_circle);
    Some(Row::new(latitude, k0 * inc, inc, count, closes_circle(count, inc)))
}

fn area_of_layout(layout: &RowLayout) -> Result<Area> {
    let rows = layout.rows();
    let north = rows[0].latitude;
    let south = rows[rows.len() - 1].latitude;
    if layout.is_global_west_east() {
        let west = rows.iter().map(|r| r.first_longitude).fold(f64::INFINITY, f64::min);
        let inc = rows.iter().map(|r| r.increment).fold(f64::INFINITY, f64::min);
        return Area::new(north, west, south, west + 360.0 - inc);
    }
    let west = rows.iter().map(|r| r.first_longitude).fold(f64::INFINITY, f64::min);
    let east = rows.iter().map(|r| r.last_longitude()).fold(f64::NEG_INFINITY, f64::max);
    Area::new(north, west, south, east)
}

fn layouts_match(a: &RowLayout, b: &RowLayout) -> bool {
    a.number_of_rows() == b.number_of_rows()
        && a.rows().iter().zip(b.rows()).all(|(x, y)| {
            x.count == y.count
                && same(x.latitude, y.latitude)
                && same(x.first_longitude, y.first_longitude)
                && same(x.increment, y.increment)
        })
}

/// Sorted (descending) distinct absolute latitudes of the lattice
/// `first - k * increment` over the whole globe.
fn lattice_abs_latitudes(first: f64, increment: f64) -> Vec<f64> {
    let phase = first.rem_euclid(increment);
    let mut out = Vec::new();
    for start in [phase, increment - phase] {
        let mut k = 0;
        loop {
            let lat = start + k as f64 * increment;
            if lat > 90.0 + 1e-9 {
                break;
            }
            out.push(lat.min(90.0));
            k += 1;
        }
    }
    out.sort_by(|a, b| b.total_cmp(a));
    out.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    out
}

fn lattice_signature(first: f64, increment: f64) -> String {
    let phase = first.rem_euclid(increment);
    let phase = if same(phase, increment) { 0.0 } else { phase };
    format!("LL{:.6}+{:.6}", increment, phase)
}

// =============================================================================
// Lat/lon variants
// =============================================================================

/// Regular latitude/longitude grid with points on the area edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularLatLon {
    area: Area,
    north_south_increment: f64,
    west_east_increment: f64,
    layout: RowLayout,
}

impl RegularLatLon {
    /// An empty `area` means global.
    pub fn new(area: Area, north_south_increment: f64, west_east_increment: f64) -> Result<Self> {
        check_increment("north-south", north_south_increment)?;
        check_increment("west-east", west_east_increment)?;
        let area = if area.is_empty() {
            Area::new(90.0, 0.0, -90.0, 360.0 - west_east_increment)?
        } else {
            area
        };
        let nlat = lattice_count(area.height(), north_south_increment);
        let mut nlon = lattice_count(area.width(), west_east_increment);
        let per_circle = (360.0 / west_east_increment).round() as usize;
        let circle = closes_circle(per_circle, west_east_increment);
        if circle && nlon > per_circle {
            nlon = per_circle;
        }
        let full_circle = circle && nlon == per_circle;
        let rows = (0..nlat)
            .map(|j| {
                Row::new(
                    area.north - j as f64 * north_south_increment,
                    area.west,
                    west_east_increment,
                    nlon,
                    full_circle,
                )
            })
            .collect();
        let south = area.north - (nlat - 1) as f64 * north_south_increment;
        let global_ns = same(area.north, 90.0) && same(south, -90.0);
        let layout = RowLayout::new(rows, global_ns)?.with_latitude_spacing(north_south_increment);
        let area = Area::new(
            area.north,
            area.west,
            south,
            area.west + (nlon - 1) as f64 * west_east_increment,
        )?;
        Ok(Self {
            area,
            north_south_increment,
            west_east_increment,
            layout,
        })
    }

    pub fn global(north_south_increment: f64, west_east_increment: f64) -> Result<Self> {
        Self::new(Area::empty(), north_south_increment, west_east_increment)
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn north_south_increment(&self) -> f64 {
        self.north_south_increment
    }

    pub fn west_east_increment(&self) -> f64 {
        self.west_east_increment
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn number_of_latitudes(&self) -> usize {
        self.layout.number_of_rows()
    }

    pub fn number_of_longitudes(&self) -> usize {
        self.layout.rows()[0].count
    }
}

/// Regular lat/lon grid whose points sit at cell centres, half an
/// increment inside the area edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularLatLonCellCentered {
    area: Area,
    north_south_increment: f64,
    west_east_increment: f64,
    layout: RowLayout,
}

impl RegularLatLonCellCentered {
    /// `area` gives the outer edges of the cells; empty means global.
    pub fn new(area: Area, north_south_increment: f64, west_east_increment: f64) -> Result<Self> {
        check_increment("north-south", north_south_increment)?;
        check_increment("west-east", west_east_increment)?;
        let area = if area.is_empty() {
            Area::new(90.0, 0.0, -90.0, 360.0)?
        } else {
            area
        };
        let nlat = ((area.height() / north_south_increment).round() as usize).max(1);
        let nlon = ((area.width() / west_east_increment).round() as usize).max(1);
        let full_circle = closes_circle(nlon, west_east_increment);
        let rows = (0..nlat)
            .map(|j| {
                Row::new(
                    area.north - (j as f64 + 0.5) * north_south_increment,
                    area.west + 0.5 * west_east_increment,
                    west_east_increment,
                    nlon,
                    full_circle,
                )
            })
            .collect();
        let layout = RowLayout::new(rows, area.is_global_north_south())?.with_latitude_spacing(north_south_increment);
        Ok(Self {
            area,
            north_south_increment,
            west_east_increment,
            layout,
        })
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn north_south_increment(&self) -> f64 {
        self.north_south_increment
    }

    pub fn west_east_increment(&self) -> f64 {
        self.west_east_increment
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }
}

/// Lat/lon grid with `pl[j]` points around the circle on row `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedLatLon {
    area: Area,
    north_south_increment: f64,
    pl: Vec<usize>,
    layout: RowLayout,
}

impl ReducedLatLon {
    /// One `pl` entry per latitude row of `area` (empty means global).
    pub fn new(area: Area, north_south_increment: f64, pl: Vec<usize>) -> Result<Self> {
        check_increment("north-south", north_south_increment)?;
        let area = if area.is_empty() {
            Area::new(90.0, 0.0, -90.0, 360.0)?
        } else {
            area
        };
        let nlat = lattice_count(area.height(), north_south_increment);
        if pl.len() != nlat {
            return Err(RegridError::geometry_mismatch(format!(
                "reduced lat/lon pl has {} entries for {} latitudes",
                pl.len(),
                nlat
            )));
        }
        if let Some(j) = pl.iter().position(|&n| n == 0) {
            return Err(RegridError::geometry_mismatch(format!(
                "reduced lat/lon pl entry {} is zero",
                j
            )));
        }
        let mut rows = Vec::with_capacity(nlat);
        for (j, &n) in pl.iter().enumerate() {
            let lat = area.north - j as f64 * north_south_increment;
            if let Some(row) = circle_row(lat, n, area.west, area.east) {
                rows.push(row);
            }
        }
        let south = area.north - (nlat - 1) as f64 * north_south_increment;
        let layout = RowLayout::new(rows, same(area.north, 90.0) && same(south, -90.0))?
            .with_latitude_spacing(north_south_increment);
        Ok(Self {
            area,
            north_south_increment,
            pl,
            layout,
        })
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn north_south_increment(&self) -> f64 {
        self.north_south_increment
    }

    pub fn pl(&self) -> &[usize] {
        &self.pl
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    fn clipped(&self, area: &Area) -> Result<Self> {
        let ns = self.north_south_increment;
        let mut pl = Vec::new();
        let mut north = None;
        let mut south = 0.0;
        for (j, &n) in self.pl.iter().enumerate() {
            let lat = self.area.north - j as f64 * ns;
            if lat <= area.north + 1e-6 && lat >= area.south - 1e-6 {
                north.get_or_insert(lat);
                south = lat;
                pl.push(n);
            }
        }
        let north = north.ok_or_else(|| RegridError::geometry_mismatch("no reduced latitude inside area"))?;
        Self::new(Area::new(north, area.west, south, area.east)?, ns, pl)
    }
}

// =============================================================================
// Gaussian variants
// =============================================================================

fn gaussian_rows(
    gaussian: &GaussianLatitudes,
    area: &Area,
    per_row: impl Fn(usize) -> usize,
) -> Result<RowLayout> {
    let mut rows = Vec::new();
    for (j, &lat) in gaussian.latitudes().iter().enumerate() {
        if lat > area.north + 1e-6 || lat < area.south - 1e-6 {
            continue;
        }
        if let Some(row) = circle_row(lat, per_row(j), area.west, area.east) {
            rows.push(row);
        }
    }
    let global_ns = rows.len() == gaussian.latitudes().len();
    let latitudes = gaussian.latitudes();
    let spacing = latitudes.windows(2).map(|w| w[0] - w[1]).fold(f64::INFINITY, f64::min);
    let layout = RowLayout::new(rows, global_ns)?;
    Ok(if spacing.is_finite() { layout.with_latitude_spacing(spacing) } else { layout })
}

/// Regular Gaussian grids end one `90/N` step short of 360; reduced rows
/// each close their own circle.
fn default_gaussian_area(gaussian: &GaussianLatitudes, reduced: bool) -> Result<Area> {
    let lats = gaussian.latitudes();
    let n = gaussian.number() as f64;
    let east = if reduced { 360.0 } else { (4.0 * n - 1.0) * 90.0 / n };
    Area::new(lats[0], 0.0, lats[lats.len() - 1], east)
}

/// Gaussian grid with `4N` points on every row.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGaussian {
    number: usize,
    area: Area,
    layout: RowLayout,
}

impl RegularGaussian {
    pub fn new(number: usize, area: Area) -> Result<Self> {
        let gaussian = GaussianLatitudes::compute(number)?;
        let area = if area.is_empty() { default_gaussian_area(&gaussian, false)? } else { area };
        let layout = gaussian_rows(&gaussian, &area, |_| 4 * number)?;
        Ok(Self { number, area, layout })
    }

    pub fn global(number: usize) -> Result<Self> {
        Self::new(number, Area::empty())
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }
}

/// Gaussian grid with a per-latitude point count over all `2N` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedGaussian {
    number: usize,
    area: Area,
    pl: Vec<usize>,
    layout: RowLayout,
}

impl ReducedGaussian {
    pub fn new(number: usize, pl: Vec<usize>, area: Area) -> Result<Self> {
        if pl.len() != 2 * number {
            return Err(RegridError::geometry_mismatch(format!(
                "reduced Gaussian N{} needs {} pl entries, got {}",
                number,
                2 * number,
                pl.len()
            )));
        }
        if let Some(j) = pl.iter().position(|&n| n == 0) {
            return Err(RegridError::geometry_mismatch(format!(
                "reduced Gaussian pl entry {} is zero",
                j
            )));
        }
        let gaussian = GaussianLatitudes::compute(number)?;
        let area = if area.is_empty() { default_gaussian_area(&gaussian, true)? } else { area };
        let layout = gaussian_rows(&gaussian, &area, |j| pl[j])?;
        Ok(Self {
            number,
            area,
            pl,
            layout,
        })
    }

    /// Reduced representation with `4N` points on every row.
    pub fn pseudo_regular(number: usize, area: Area) -> Result<Self> {
        Self::new(number, vec![4 * number; 2 * number], area)
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn pl(&self) -> &[usize] {
        &self.pl
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }
}

// =============================================================================
// Rotated and unstructured variants
// =============================================================================

/// Regular lat/lon grid defined in a rotated frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedRegularLatLon {
    grid: RegularLatLon,
    rotation: Rotation,
}

impl RotatedRegularLatLon {
    /// `grid` is expressed in rotated coordinates.
    pub fn new(grid: RegularLatLon, rotation: Rotation) -> Self {
        Self { grid, rotation }
    }

    pub fn grid(&self) -> &RegularLatLon {
        &self.grid
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    /// Angle, per point, between the rotated frame's north and true north.
    /// Adding it to a geographic wind direction gives the rotated-frame
    /// direction.
    pub fn angular_change(&self) -> Vec<f64> {
        self.grid
            .layout()
            .points()
            .iter()
            .map(|p| self.rotation.north_bearing(&self.rotation.unrotate(p)))
            .collect()
    }
}

/// Arbitrary scattered points.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOfPoints {
    points: Vec<Point>,
}

impl ListOfPoints {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(RegridError::geometry_mismatch("list of points is empty"));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

// =============================================================================
// Grid
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Grid {
    RegularLatLon(RegularLatLon),
    ReducedLatLon(ReducedLatLon),
    RegularGaussian(RegularGaussian),
    ReducedGaussian(ReducedGaussian),
    PseudoRegularGaussian(ReducedGaussian),
    RotatedRegularLatLon(RotatedRegularLatLon),
    RegularLatLonCellCentered(RegularLatLonCellCentered),
    ListOfPoints(ListOfPoints),
    PolarStereographic(PolarStereographic),
}

impl Grid {
    pub fn regular_ll(area: Area, ns: f64, we: f64) -> Result<Self> {
        RegularLatLon::new(area, ns, we).map(Grid::RegularLatLon)
    }

    pub fn regular_gg(number: usize, area: Area) -> Result<Self> {
        RegularGaussian::new(number, area).map(Grid::RegularGaussian)
    }

    pub fn reduced_gg(number: usize, pl: Vec<usize>, area: Area) -> Result<Self> {
        ReducedGaussian::new(number, pl, area).map(Grid::ReducedGaussian)
    }

    pub fn pseudo_regular_gg(number: usize, area: Area) -> Result<Self> {
        ReducedGaussian::pseudo_regular(number, area).map(Grid::PseudoRegularGaussian)
    }

    pub fn list(points: Vec<Point>) -> Result<Self> {
        ListOfPoints::new(points).map(Grid::ListOfPoints)
    }

    pub fn kind(&self) -> GridKind {
        match self {
            Grid::RegularLatLon(_) => GridKind::RegularLatLon,
            Grid::ReducedLatLon(_) => GridKind::ReducedLatLon,
            Grid::RegularGaussian(_) => GridKind::RegularGaussian,
            Grid::ReducedGaussian(_) => GridKind::ReducedGaussian,
            Grid::PseudoRegularGaussian(_) => GridKind::PseudoRegularGaussian,
            Grid::RotatedRegularLatLon(_) => GridKind::RotatedRegularLatLon,
            Grid::RegularLatLonCellCentered(_) => GridKind::RegularLatLonCellCentered,
            Grid::ListOfPoints(_) => GridKind::ListOfPoints,
            Grid::PolarStereographic(_) => GridKind::PolarStereographic,
        }
    }

    /// Row structure in the grid's own frame; `None` for point lists and
    /// projected grids.
    pub fn row_layout(&self) -> Option<&RowLayout> {
        match self {
            Grid::RegularLatLon(g) => Some(g.layout()),
            Grid::ReducedLatLon(g) => Some(g.layout()),
            Grid::RegularGaussian(g) => Some(g.layout()),
            Grid::ReducedGaussian(g) | Grid::PseudoRegularGaussian(g) => Some(g.layout()),
            Grid::RotatedRegularLatLon(g) => Some(g.grid().layout()),
            Grid::RegularLatLonCellCentered(g) => Some(g.layout()),
            Grid::ListOfPoints(_) | Grid::PolarStereographic(_) => None,
        }
    }

    pub fn calculated_number_of_points(&self) -> usize {
        match self {
            Grid::ListOfPoints(g) => g.points().len(),
            Grid::PolarStereographic(g) => g.number_of_points(),
            _ => self.row_layout().map(|l| l.number_of_points()).unwrap_or(0),
        }
    }

    /// Per-row point counts in storage order.
    pub fn row_lengths(&self) -> Vec<usize> {
        match self {
            Grid::ListOfPoints(g) => vec![g.points().len()],
            Grid::PolarStereographic(g) => vec![g.nx; g.ny],
            _ => self.row_layout().map(|l| l.row_lengths()).unwrap_or_default(),
        }
    }

    /// Every parameter that places the grid's points, as bytes for hashing.
    /// Grids with equal bytes enumerate the same points.
    pub fn definition_bytes(&self) -> Vec<u8> {
        fn put(out: &mut Vec<u8>, value: f64) {
            out.extend_from_slice(&value.to_le_bytes());
        }
        fn put_count(out: &mut Vec<u8>, value: usize) {
            out.extend_from_slice(&(value as u64).to_le_bytes());
        }
        fn put_layout(out: &mut Vec<u8>, layout: &RowLayout) {
            out.push(u8::from(layout.is_global_north_south()));
            for row in layout.rows() {
                put(out, row.latitude);
                put(out, row.first_longitude);
                put(out, row.increment);
                put_count(out, row.count);
                out.push(u8::from(row.full_circle));
            }
        }

        let mut out = self.kind().to_string().into_bytes();
        match self {
            Grid::RegularLatLon(g) => {
                put(&mut out, g.north_south_increment());
                put(&mut out, g.west_east_increment());
                put_layout(&mut out, g.layout());
            }
            Grid::RegularLatLonCellCentered(g) => {
                put(&mut out, g.north_south_increment());
                put(&mut out, g.west_east_increment());
                put_layout(&mut out, g.layout());
            }
            Grid::ReducedLatLon(g) => {
                put(&mut out, g.north_south_increment());
                put_layout(&mut out, g.layout());
            }
            Grid::RegularGaussian(g) => {
                put_count(&mut out, g.number());
                put_layout(&mut out, g.layout());
            }
            Grid::ReducedGaussian(g) | Grid::PseudoRegularGaussian(g) => {
                put_count(&mut out, g.number());
                put_layout(&mut out, g.layout());
            }
            Grid::RotatedRegularLatLon(g) => {
                put(&mut out, g.rotation().south_pole_latitude);
                put(&mut out, g.rotation().south_pole_longitude);
                put(&mut out, g.grid().north_south_increment());
                put(&mut out, g.grid().west_east_increment());
                put_layout(&mut out, g.grid().layout());
            }
            Grid::ListOfPoints(g) => {
                put_count(&mut out, g.points().len());
                for p in g.points() {
                    put(&mut out, p.latitude());
                    put(&mut out, p.longitude());
                }
            }
            Grid::PolarStereographic(g) => {
                put_count(&mut out, g.nx);
                put_count(&mut out, g.ny);
                put(&mut out, g.dx);
                put(&mut out, g.dy);
                put(&mut out, g.first_latitude);
                put(&mut out, g.first_longitude);
                put(&mut out, g.orientation);
                out.push(u8::from(g.south_pole));
                put(&mut out, g.true_latitude);
            }
        }
        out
    }

    /// Every point in storage order, in geographic coordinates.
    pub fn generate_grid_1d(&self) -> Vec<Point> {
        match self {
            Grid::ListOfPoints(g) => g.points().to_vec(),
            Grid::PolarStereographic(g) => g.points(),
            Grid::RotatedRegularLatLon(g) => g
                .grid()
                .layout()
                .points()
                .iter()
                .map(|p| g.rotation().unrotate(p))
                .collect(),
            _ => self.row_layout().map(|l| l.points()).unwrap_or_default(),
        }
    }

    /// Linear storage offset of column `i` on row `j`.
    pub fn get_index(&self, i: usize, j: usize) -> Result<usize> {
        match self {
            Grid::ListOfPoints(g) => {
                if j != 0 || i >= g.points().len() {
                    return Err(RegridError::geometry_mismatch(format!(
                        "point ({}, {}) outside list of {} points",
                        i,
                        j,
                        g.points().len()
                    )));
                }
                Ok(i)
            }
            Grid::PolarStereographic(g) => {
                if i >= g.nx || j >= g.ny {
                    return Err(RegridError::geometry_mismatch(format!(
                        "point ({}, {}) outside {}x{} grid",
                        i, j, g.nx, g.ny
                    )));
                }
                Ok(j * g.nx + i)
            }
            _ => match self.row_layout() {
                Some(layout) => layout.index(j, i),
                None => Err(RegridError::geometry_mismatch("grid has no rows")),
            },
        }
    }

    /// Permute values between two scanning modes.
    pub fn reorder_new_data(&self, data: &[f64], from: ScanningMode, to: ScanningMode) -> Result<Vec<f64>> {
        self.check_values(data)?;
        ScanningMode::reorder(from, to, data, &self.row_lengths())
    }

    /// Fail unless `data` has one value per grid point.
    pub fn check_values(&self, data: &[f64]) -> Result<()> {
        let expected = self.calculated_number_of_points();
        if data.len() != expected {
            return Err(RegridError::geometry_mismatch(format!(
                "{} grid expects {} values, got {}",
                self.kind(),
                expected,
                data.len()
            )));
        }
        Ok(())
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self, Grid::RotatedRegularLatLon(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Grid::ListOfPoints(_))
    }

    pub fn is_reduced(&self) -> bool {
        matches!(
            self,
            Grid::ReducedLatLon(_) | Grid::ReducedGaussian(_) | Grid::PseudoRegularGaussian(_)
        )
    }

    pub fn is_gaussian(&self) -> bool {
        self.gaussian_number().is_some()
    }

    pub fn gaussian_number(&self) -> Option<usize> {
        match self {
            Grid::RegularGaussian(g) => Some(g.number()),
            Grid::ReducedGaussian(g) | Grid::PseudoRegularGaussian(g) => Some(g.number()),
            _ => None,
        }
    }

    /// Cover the whole globe: every row closes the circle and the rows span
    /// pole to pole (all `2N` latitudes for Gaussian grids).
    pub fn is_global(&self) -> bool {
        match self {
            Grid::ListOfPoints(_) | Grid::PolarStereographic(_) | Grid::RotatedRegularLatLon(_) => false,
            _ => self
                .row_layout()
                .map(|l| l.is_global_north_south() && l.is_global_west_east())
                .unwrap_or(false),
        }
    }

    pub fn is_global_west_east(&self) -> bool {
        self.row_layout().map(|l| l.is_global_west_east()).unwrap_or(false)
    }

    /// Grids on which area-based methods are defined.
    pub fn has_cells(&self) -> bool {
        matches!(
            self,
            Grid::RegularLatLon(_)
                | Grid::ReducedLatLon(_)
                | Grid::RegularGaussian(_)
                | Grid::ReducedGaussian(_)
                | Grid::PseudoRegularGaussian(_)
                | Grid::RegularLatLonCellCentered(_)
        )
    }

    /// The area the grid's points occupy (geographic bounding box for
    /// rotated and unstructured grids).
    pub fn area(&self) -> Result<Area> {
        match self {
            Grid::RegularLatLon(g) => Ok(*g.area()),
            Grid::RegularLatLonCellCentered(g) => Ok(*g.area()),
            Grid::ReducedLatLon(_)
            | Grid::RegularGaussian(_)
            | Grid::ReducedGaussian(_)
            | Grid::PseudoRegularGaussian(_) => match self.row_layout() {
                Some(layout) => area_of_layout(layout),
                None => Ok(Area::empty()),
            },
            _ => {
                let points = self.generate_grid_1d();
                let north = points.iter().map(|p| p.latitude()).fold(f64::NEG_INFINITY, f64::max);
                let south = points.iter().map(|p| p.latitude()).fold(f64::INFINITY, f64::min);
                let west = points.iter().map(|p| p.longitude()).fold(f64::INFINITY, f64::min);
                let east = points.iter().map(|p| p.longitude()).fold(f64::NEG_INFINITY, f64::max);
                Area::new(north, west, south, east)
            }
        }
    }

    /// Map a geographic point into the frame the grid's rows live in.
    pub fn query_point(&self, geographic: &Point) -> Point {
        match self {
            Grid::RotatedRegularLatLon(g) => g.rotation().rotate(geographic),
            _ => *geographic,
        }
    }

    /// Name of the grid's global latitude lattice, used to key Legendre
    /// tables.
    pub fn latitude_signature(&self) -> Result<String> {
        if let Some(n) = self.gaussian_number() {
            return Ok(format!("N{}", n));
        }
        match self {
            Grid::RegularLatLon(g) => Ok(lattice_signature(g.area().north, g.north_south_increment())),
            Grid::ReducedLatLon(g) => Ok(lattice_signature(g.area().north, g.north_south_increment())),
            Grid::RotatedRegularLatLon(g) => Ok(lattice_signature(
                g.grid().area().north,
                g.grid().north_south_increment(),
            )),
            Grid::RegularLatLonCellCentered(g) => Ok(lattice_signature(
                g.layout().rows()[0].latitude,
                g.north_south_increment(),
            )),
            _ => Err(RegridError::not_implemented(format!(
                "{} grids have no latitude lattice",
                self.kind()
            ))),
        }
    }

    /// Distinct absolute latitudes of the global lattice, descending.
    pub fn abs_latitudes(&self) -> Result<Vec<f64>> {
        if let Some(n) = self.gaussian_number() {
            let g = GaussianLatitudes::compute(n)?;
            return Ok(g.latitudes()[..n].to_vec());
        }
        match self {
            Grid::RegularLatLon(g) => Ok(lattice_abs_latitudes(g.area().north, g.north_south_increment())),
            Grid::ReducedLatLon(g) => Ok(lattice_abs_latitudes(g.area().north, g.north_south_increment())),
            Grid::RotatedRegularLatLon(g) => Ok(lattice_abs_latitudes(
                g.grid().area().north,
                g.grid().north_south_increment(),
            )),
            Grid::RegularLatLonCellCentered(g) => Ok(lattice_abs_latitudes(
                g.layout().rows()[0].latitude,
                g.north_south_increment(),
            )),
            _ => Err(RegridError::not_implemented(format!(
                "{} grids have no latitude lattice",
                self.kind()
            ))),
        }
    }

    /// Truncation matched to this grid's resolution, never above `truncation`.
    pub fn truncate(&self, truncation: usize) -> Result<usize> {
        if let Some(n) = self.gaussian_number() {
            return Ok(truncation_for_gaussian(n).map(|t| t.min(truncation)).unwrap_or(truncation));
        }
        let increment = match self {
            Grid::RegularLatLon(g) => g.north_south_increment().min(g.west_east_increment()),
            Grid::RegularLatLonCellCentered(g) => g.north_south_increment().min(g.west_east_increment()),
            Grid::RotatedRegularLatLon(g) => g
                .grid()
                .north_south_increment()
                .min(g.grid().west_east_increment()),
            Grid::ReducedLatLon(g) => g.north_south_increment(),
            _ => {
                return Err(RegridError::not_implemented(format!(
                    "automatic truncation for {} grids",
                    self.kind()
                )))
            }
        };
        Ok(truncation_for_increment(increment).min(truncation))
    }

    /// Global grid of the same resolution and variant.
    pub fn global(&self) -> Result<Grid> {
        match self {
            Grid::RegularLatLon(g) => Grid::regular_ll(Area::empty(), g.north_south_increment(), g.west_east_increment()),
            Grid::RegularLatLonCellCentered(g) => RegularLatLonCellCentered::new(
                Area::empty(),
                g.north_south_increment(),
                g.west_east_increment(),
            )
            .map(Grid::RegularLatLonCellCentered),
            Grid::RegularGaussian(g) => Grid::regular_gg(g.number(), Area::empty()),
            Grid::ReducedGaussian(g) => Grid::reduced_gg(g.number(), g.pl().to_vec(), Area::empty()),
            Grid::PseudoRegularGaussian(g) => Grid::pseudo_regular_gg(g.number(), Area::empty()),
            _ => Ok(self.clone()),
        }
    }

    /// Variant constructor applied to an explicit area.
    fn with_area(&self, area: &Area) -> Result<Grid> {
        match self {
            Grid::RegularLatLon(g) => Grid::regular_ll(*area, g.north_south_increment(), g.west_east_increment()),
            Grid::RegularLatLonCellCentered(g) => {
                RegularLatLonCellCentered::new(*area, g.north_south_increment(), g.west_east_increment())
                    .map(Grid::RegularLatLonCellCentered)
            }
            Grid::ReducedLatLon(g) => g.clipped(area).map(Grid::ReducedLatLon),
            Grid::RegularGaussian(g) => Grid::regular_gg(g.number(), *area),
            Grid::ReducedGaussian(g) => Grid::reduced_gg(g.number(), g.pl().to_vec(), *area),
            Grid::PseudoRegularGaussian(g) => Grid::pseudo_regular_gg(g.number(), *area),
            _ => Ok(self.clone()),
        }
    }

    /// Snap `area` inwards onto this grid's lattice. Lat/lon lattices are
    /// anchored at `anchor` (the equator and Greenwich when deriving from a
    /// source grid).
    fn snapped(&self, area: &Area, anchor: (f64, f64), global_we: bool) -> Result<Area> {
        let (ns, we) = match self {
            Grid::RegularLatLon(g) => (g.north_south_increment(), g.west_east_increment()),
            Grid::RegularLatLonCellCentered(g) => {
                // Cell edges rather than centres sit on the lattice.
                (g.north_south_increment(), g.west_east_increment())
            }
            Grid::ReducedLatLon(g) => (g.north_south_increment(), 0.0),
            // Gaussian rows and reduced columns already snap at construction.
            _ => {
                if global_we {
                    return Area::new(area.north, 0.0, area.south, 360.0);
                }
                return Ok(*area);
            }
        };
        let (lat0, lon0) = anchor;
        let north = lat0 + ((area.north - lat0) / ns + 1e-6).floor() * ns;
        let south = lat0 + ((area.south - lat0) / ns - 1e-6).ceil() * ns;
        if we == 0.0 {
            let (west, east) = if global_we { (0.0, 360.0) } else { (area.west, area.east) };
            return Area::new(north.min(90.0), west, south.max(-90.0), east);
        }
        let (west, east) = if global_we {
            (lon0, lon0 + 360.0 - we)
        } else {
            (
                lon0 + ((area.west - lon0) / we - 1e-6).ceil() * we,
                lon0 + ((area.east - lon0) / we + 1e-6).floor() * we,
            )
        };
        if north < south || east < west {
            return Err(RegridError::geometry_mismatch(format!(
                "area {} holds no point of the output lattice",
                area
            )));
        }
        Area::new(north.min(90.0), west, south.max(-90.0), east)
    }

    /// Resolve the grid to materialise when `self` is the requested output
    /// and `source` the input grid.
    ///
    /// An output without an area inherits the source extent (global when
    /// the source is global); an explicit area is clipped to the source.
    /// Lists, polar stereographic and rotated grids are used as given.
    pub fn new_grid(&self, source: &Grid) -> Result<Grid> {
        if matches!(
            self,
            Grid::ListOfPoints(_) | Grid::PolarStereographic(_) | Grid::RotatedRegularLatLon(_)
        ) {
            return Ok(self.clone());
        }
        let explicit = self.requested_area();
        let source_global = source.is_global();
        if source_global && (explicit.is_none() || self.is_global()) {
            debug!(kind = %self.kind(), "Output grid is global");
            return self.global();
        }
        let source_area = source.area()?;
        let source_global_we = source.is_global_west_east();
        let grid = match explicit {
            Some(area) if !self.is_global() => {
                let clipped = if source_global {
                    area
                } else {
                    area.intersection(&source_area).ok_or_else(|| {
                        RegridError::geometry_mismatch(format!(
                            "output area {} does not intersect input area {}",
                            area, source_area
                        ))
                    })?
                };
                let snapped = self.snapped(&clipped, (area.north, area.west), false)?;
                self.with_area(&snapped)?
            }
            _ => {
                let snapped = self.snapped(&source_area, (0.0, 0.0), source_global_we)?;
                self.with_area(&snapped)?
            }
        };
        debug!(kind = %grid.kind(), points = grid.calculated_number_of_points(), "Resolved output grid");
        Ok(grid)
    }

    /// The area the caller asked for, `None` when it was left unconstrained.
    fn requested_area(&self) -> Option<Area> {
        match self.area() {
            Ok(a) if !a.is_empty() => Some(a),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Neighbourhood queries
    // -------------------------------------------------------------------------

    /// Four- or twelve-point stencil around a geographic target. Projected
    /// grids give their four-point cell; point lists have no stencil.
    pub fn stencil(&self, target: &Point, twelve: bool) -> Result<Stencil> {
        match self {
            Grid::PolarStereographic(g) => Ok(stencil::projected(g, target)),
            Grid::ListOfPoints(_) => Err(RegridError::invalid_configuration(
                "structured stencils need a gridded source, not a list of points",
            )),
            _ => match self.row_layout() {
                Some(layout) => Ok(stencil::structured(layout, &self.query_point(target), twelve)),
                None => Err(RegridError::geometry_mismatch("grid has no rows")),
            },
        }
    }

    /// The `count` source points nearest to a geographic target.
    pub fn nearest_stencil(&self, target: &Point, count: usize) -> Vec<StencilPoint> {
        match self {
            Grid::ListOfPoints(g) => stencil::nearest_in_list(g.points(), target, count),
            Grid::PolarStereographic(g) => stencil::nearest_in_projection(g, target, count),
            _ => match self.row_layout() {
                Some(layout) => stencil::nearest_in_layout(layout, &self.query_point(target), count),
                None => Vec::new(),
            },
        }
    }

    /// Nearest points with their values, ties broken by ascending index.
    pub fn nearest_points(&self, target: &Point, count: usize, data: &[f64]) -> Result<Vec<FieldPoint>> {
        self.check_values(data)?;
        Ok(self
            .nearest_stencil(target, count)
            .iter()
            .map(|p| FieldPoint::new(p, data[p.index]))
            .collect())
    }

    /// Cell of point `index` in the grid's frame.
    pub fn cell_bounds(&self, index: usize) -> Result<CellBounds> {
        let layout = self.cell_layout()?;
        let (row, column) = layout.locate(index).ok_or_else(|| {
            RegridError::geometry_mismatch(format!("index {} outside grid", index))
        })?;
        Ok(layout.cell_bounds(row, column))
    }

    pub fn cell_area(&self, index: usize) -> Result<f64> {
        self.cell_bounds(index).map(|c| c.area())
    }

    /// All cell areas in storage order.
    pub fn cell_areas(&self) -> Result<Vec<f64>> {
        let layout = self.cell_layout()?;
        let mut out = Vec::with_capacity(layout.number_of_points());
        for (j, row) in layout.rows().iter().enumerate() {
            for k in 0..row.count {
                out.push(layout.cell_bounds(j, k).area());
            }
        }
        Ok(out)
    }

    /// Source cells of this grid overlapping `cell`.
    pub fn overlapping_cells(&self, cell: &CellBounds) -> Result<Vec<CellOverlap>> {
        Ok(stencil::overlapping_cells(self.cell_layout()?, cell))
    }

    fn cell_layout(&self) -> Result<&RowLayout> {
        if !self.has_cells() {
            return Err(RegridError::invalid_configuration(format!(
                "{} grids have no cell geometry",
                self.kind()
            )));
        }
        self.row_layout()
            .ok_or_else(|| RegridError::geometry_mismatch("grid has no rows"))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grid::RegularLatLon(g) => write!(
                f,
                "regular_ll {}/{} {}",
                g.north_south_increment(),
                g.west_east_increment(),
                g.area()
            ),
            Grid::RegularLatLonCellCentered(g) => write!(
                f,
                "regular_ll_cell_centred {}/{} {}",
                g.north_south_increment(),
                g.west_east_increment(),
                g.area()
            ),
            Grid::ReducedLatLon(g) => write!(f, "reduced_ll {} {}", g.north_south_increment(), g.area()),
            Grid::RegularGaussian(g) => write!(f, "regular_gg F{} {}", g.number(), g.area()),
            Grid::ReducedGaussian(g) => write!(f, "reduced_gg N{} {}", g.number(), g.area()),
            Grid::PseudoRegularGaussian(g) => write!(f, "pseudo_regular_gg N{} {}", g.number(), g.area()),
            Grid::RotatedRegularLatLon(g) => write!(
                f,
                "rotated_ll {}/{} {} pole ({}, {})",
                g.grid().north_south_increment(),
                g.grid().west_east_increment(),
                g.grid().area(),
                g.rotation().south_pole_latitude,
                g.rotation().south_pole_longitude
            ),
            Grid::ListOfPoints(g) => write!(f, "list of {} points", g.points().len()),
            Grid::PolarStereographic(g) => write!(f, "polar_stereographic {}x{}", g.nx, g.ny),
        }
    }
}

/// Structural identity: same variant with the same geometry.
pub fn same_as(a: &Grid, b: &Grid) -> bool {
    match (a, b) {
        (Grid::RegularLatLon(x), Grid::RegularLatLon(y)) => {
            same(x.north_south_increment(), y.north_south_increment())
                && same(x.west_east_increment(), y.west_east_increment())
                && layouts_match(x.layout(), y.layout())
        }
        (Grid::RegularLatLonCellCentered(x), Grid::RegularLatLonCellCentered(y)) => {
            same(x.north_south_increment(), y.north_south_increment())
                && same(x.west_east_increment(), y.west_east_increment())
                && layouts_match(x.layout(), y.layout())
        }
        (Grid::ReducedLatLon(x), Grid::ReducedLatLon(y)) => {
            same(x.north_south_increment(), y.north_south_increment()) && layouts_match(x.layout(), y.layout())
        }
        (Grid::RegularGaussian(x), Grid::RegularGaussian(y)) => {
            x.number() == y.number() && layouts_match(x.layout(), y.layout())
        }
        (Grid::ReducedGaussian(x), Grid::ReducedGaussian(y))
        | (Grid::PseudoRegularGaussian(x), Grid::PseudoRegularGaussian(y)) => {
            x.number() == y.number() && x.pl() == y.pl() && layouts_match(x.layout(), y.layout())
        }
        (Grid::RotatedRegularLatLon(x), Grid::RotatedRegularLatLon(y)) => {
            x.rotation().same_as(y.rotation())
                && same_as(
                    &Grid::RegularLatLon(x.grid().clone()),
                    &Grid::RegularLatLon(y.grid().clone()),
                )
        }
        (Grid::ListOfPoints(x), Grid::ListOfPoints(y)) => {
            x.points().len() == y.points().len()
                && x.points().iter().zip(y.points()).all(|(p, q)| p.same_position(q))
        }
        (Grid::PolarStereographic(x), Grid::PolarStereographic(y)) => x.same_as(y),
        _ => false,
    }
}
