//! Row-structured point layouts.
//!
//! Every lat/lon and Gaussian variant, regular or reduced, rotated or not,
//! stores its points as latitude rows running north to south, each row an
//! arithmetic progression of longitudes. [`RowLayout`] is that shared
//! structure; the grid variants only differ in how they build it.

use serde::{Deserialize, Serialize};

use regrid_common::{numeric::DEGREE_EPSILON, Point, RegridError, Result};

use crate::cell::CellBounds;

/// One latitude row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub latitude: f64,
    pub first_longitude: f64,
    pub increment: f64,
    pub count: usize,
    /// Linear index of the row's first point.
    pub offset: usize,
    /// The row closes the circle (the point after the last is the first).
    pub full_circle: bool,
}

/// The two columns of a row surrounding a longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub west: usize,
    pub east: usize,
    /// Position of the target between `west` (0) and `east` (1).
    pub fraction: f64,
    /// Longitude of `west`, unwrapped so that it is at most one increment
    /// west of the target.
    pub west_longitude: f64,
    pub east_longitude: f64,
    /// False when the target lies outside a regional row and was clamped.
    pub inside: bool,
}

impl Row {
    pub fn new(latitude: f64, first_longitude: f64, increment: f64, count: usize, full_circle: bool) -> Self {
        Self {
            latitude,
            first_longitude,
            increment,
            count,
            offset: 0,
            full_circle,
        }
    }

    pub fn longitude(&self, column: usize) -> f64 {
        self.first_longitude + column as f64 * self.increment
    }

    pub fn last_longitude(&self) -> f64 {
        self.longitude(self.count.saturating_sub(1))
    }

    /// Wrap a possibly out-of-range column of a full-circle row.
    pub fn wrap(&self, column: isize) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        if self.full_circle {
            Some(column.rem_euclid(self.count as isize) as usize)
        } else if column >= 0 && (column as usize) < self.count {
            Some(column as usize)
        } else {
            None
        }
    }

    /// Longitude shifted to lie at or east of the first point.
    fn unwrap_east_of_first(&self, lon: f64) -> f64 {
        let mut d = lon;
        while d < self.first_longitude - DEGREE_EPSILON {
            d += 360.0;
        }
        while d >= self.first_longitude + 360.0 - DEGREE_EPSILON {
            d -= 360.0;
        }
        d
    }

    pub fn bracket(&self, lon: f64) -> Bracket {
        let d = self.unwrap_east_of_first(lon);
        let f = (d - self.first_longitude) / self.increment;

        if self.count == 1 {
            return self.clamped(0, d);
        }

        if self.full_circle {
            let base = f.floor();
            let fraction = f - base;
            let west = (base as isize).rem_euclid(self.count as isize) as usize;
            let east = (west + 1) % self.count;
            let west_longitude = d - fraction * self.increment;
            return Bracket {
                west,
                east,
                fraction,
                west_longitude,
                east_longitude: west_longitude + self.increment,
                inside: true,
            };
        }

        let last = (self.count - 1) as f64;
        if f > last + 1e-9 {
            // Outside the span: clamp to whichever edge is closer across the gap.
            let past_end = d - self.last_longitude();
            let before_start = self.first_longitude + 360.0 - d;
            let column = if past_end <= before_start { self.count - 1 } else { 0 };
            return self.clamped(column, d);
        }
        let west = (f.floor().max(0.0) as usize).min(self.count - 2);
        let fraction = (f - west as f64).clamp(0.0, 1.0);
        Bracket {
            west,
            east: west + 1,
            fraction,
            west_longitude: self.longitude(west),
            east_longitude: self.longitude(west + 1),
            inside: true,
        }
    }

    fn clamped(&self, column: usize, target: f64) -> Bracket {
        let lon = self.longitude(column);
        // Keep the clamped longitude on the target's side of the meridian.
        let lon = target + regrid_common::point::longitude_difference(target, lon);
        Bracket {
            west: column,
            east: column,
            fraction: 0.0,
            west_longitude: lon,
            east_longitude: lon,
            inside: false,
        }
    }

    /// Column closest in longitude to `lon`.
    pub fn nearest_column(&self, lon: f64) -> usize {
        let b = self.bracket(lon);
        if b.fraction > 0.5 {
            b.east
        } else {
            b.west
        }
    }
}

/// Where a latitude falls relative to the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPosition {
    /// Between two rows (equal when the layout has a single row).
    Between { north: usize, south: usize },
    /// North of the first row.
    NorthOf,
    /// South of the last row.
    SouthOf,
}

/// Rows sorted north to south with contiguous linear offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowLayout {
    rows: Vec<Row>,
    global_north_south: bool,
    number_of_points: usize,
    /// Distance between neighbouring latitudes of the generating lattice.
    #[serde(default)]
    latitude_spacing: Option<f64>,
}

impl RowLayout {
    /// Assemble rows, assigning offsets in order. Fails on empty layouts or
    /// rows that are not strictly descending in latitude.
    pub fn new(mut rows: Vec<Row>, global_north_south: bool) -> Result<Self> {
        if rows.is_empty() {
            return Err(RegridError::geometry_mismatch("grid has no latitude rows"));
        }
        let mut offset = 0;
        for (j, row) in rows.iter_mut().enumerate() {
            if row.count == 0 {
                return Err(RegridError::geometry_mismatch(format!(
                    "latitude row {} at {} has no points",
                    j, row.latitude
                )));
            }
            row.offset = offset;
            offset += row.count;
        }
        if rows.windows(2).any(|w| w[1].latitude >= w[0].latitude) {
            return Err(RegridError::geometry_mismatch(
                "latitude rows must run strictly north to south",
            ));
        }
        Ok(Self {
            rows,
            global_north_south,
            number_of_points: offset,
            latitude_spacing: None,
        })
    }

    /// Latitude spacing used for the cell edges of a single-row layout.
    pub fn with_latitude_spacing(mut self, spacing: f64) -> Self {
        self.latitude_spacing = Some(spacing.abs());
        self
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, j: usize) -> Option<&Row> {
        self.rows.get(j)
    }

    pub fn number_of_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn number_of_points(&self) -> usize {
        self.number_of_points
    }

    pub fn is_global_north_south(&self) -> bool {
        self.global_north_south
    }

    /// True when every row closes the circle.
    pub fn is_global_west_east(&self) -> bool {
        self.rows.iter().all(|r| r.full_circle)
    }

    pub fn row_lengths(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.count).collect()
    }

    pub fn latitudes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.latitude).collect()
    }

    /// Points in storage order, in the layout's own frame.
    pub fn points(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.number_of_points);
        for row in &self.rows {
            for k in 0..row.count {
                out.push(Point::new(row.latitude, row.longitude(k)));
            }
        }
        out
    }

    /// Linear index of `column` in row `row`.
    pub fn index(&self, row: usize, column: usize) -> Result<usize> {
        let r = self.rows.get(row).ok_or_else(|| {
            RegridError::geometry_mismatch(format!("row {} out of range ({} rows)", row, self.rows.len()))
        })?;
        if column >= r.count {
            return Err(RegridError::geometry_mismatch(format!(
                "column {} out of range for row {} ({} points)",
                column, row, r.count
            )));
        }
        Ok(r.offset + column)
    }

    /// Row and column of a linear index.
    pub fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.number_of_points {
            return None;
        }
        let j = self.rows.partition_point(|r| r.offset + r.count <= index);
        let row = self.rows.get(j)?;
        Some((j, index - row.offset))
    }

    pub fn position(&self, latitude: f64) -> RowPosition {
        let first = self.rows[0].latitude;
        let last = self.rows[self.rows.len() - 1].latitude;
        if latitude > first + DEGREE_EPSILON {
            return RowPosition::NorthOf;
        }
        if latitude < last - DEGREE_EPSILON {
            return RowPosition::SouthOf;
        }
        if self.rows.len() == 1 {
            return RowPosition::Between { north: 0, south: 0 };
        }
        // Rows at or north of the target.
        let at_or_north = self.rows.partition_point(|r| r.latitude >= latitude - DEGREE_EPSILON);
        let north = at_or_north.saturating_sub(1).min(self.rows.len() - 2);
        RowPosition::Between {
            north,
            south: north + 1,
        }
    }

    /// Northern and southern cell boundaries of row `j`. A lone row without
    /// a known latitude spacing has zero height unless it spans the globe.
    pub fn latitude_bounds(&self, j: usize) -> (f64, f64) {
        let n = self.rows.len();
        let lat = self.rows[j].latitude;
        let spacing = if n > 1 {
            if j + 1 < n {
                lat - self.rows[j + 1].latitude
            } else {
                self.rows[j - 1].latitude - lat
            }
        } else {
            self.latitude_spacing.unwrap_or(0.0)
        };
        let north = if j == 0 {
            if self.global_north_south {
                90.0
            } else {
                (lat + spacing / 2.0).min(90.0)
            }
        } else {
            (self.rows[j - 1].latitude + lat) / 2.0
        };
        let south = if j + 1 == n {
            if self.global_north_south {
                -90.0
            } else {
                (lat - spacing / 2.0).max(-90.0)
            }
        } else {
            (lat + self.rows[j + 1].latitude) / 2.0
        };
        (north, south)
    }

    pub fn cell_bounds(&self, row: usize, column: usize) -> CellBounds {
        let (north, south) = self.latitude_bounds(row);
        let r = &self.rows[row];
        let lon = r.longitude(column);
        CellBounds {
            north,
            south,
            west: lon - r.increment / 2.0,
            east: lon + r.increment / 2.0,
        }
    }
}
