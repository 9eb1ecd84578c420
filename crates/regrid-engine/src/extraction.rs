//! Post-interpolation masks: frames and bitmaps.
//!
//! Both set masked output points to the missing value in place. Applying
//! the same mask twice changes nothing further.

use std::fmt;
use std::path::Path;

use tracing::debug;

use grid_geometry::Grid;
use regrid_common::{RegridError, Result};

pub trait Extraction: Send + Sync + fmt::Debug {
    /// Set masked points of `values` (laid out on `grid`) to `missing`.
    /// Returns the number of points masked.
    fn extract(&self, grid: &Grid, values: &mut [f64], missing: f64) -> Result<usize>;
}

/// Keep an `N`-point border of every row and the first and last `N` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    width: usize,
}

impl Frame {
    pub fn new(width: usize) -> Result<Self> {
        if width == 0 {
            return Err(RegridError::invalid_configuration("frame width must be > 0"));
        }
        Ok(Self { width })
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl Extraction for Frame {
    fn extract(&self, grid: &Grid, values: &mut [f64], missing: f64) -> Result<usize> {
        if grid.is_list() {
            return Err(RegridError::invalid_configuration("frames need a gridded output, not a list of points"));
        }
        grid.check_values(values)?;
        let rows = grid.row_lengths();
        let n = self.width;
        let mut offset = 0;
        let mut masked = 0;
        for (j, &count) in rows.iter().enumerate() {
            let border_row = j < n || j + n >= rows.len();
            if !border_row {
                for k in n..count.saturating_sub(n) {
                    values[offset + k] = missing;
                    masked += 1;
                }
            }
            offset += count;
        }
        debug!(width = n, masked, "Applied frame");
        Ok(masked)
    }
}

/// On/off mask read from a bitmap file, row-major from the north-west.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    on: Vec<bool>,
}

fn malformed(line: usize, msg: impl fmt::Display) -> RegridError {
    RegridError::invalid_configuration(format!("bitmap line {}: {}", line, msg))
}

/// `a` or `a-b`, 1-based and inclusive, checked against `limit`.
fn parse_range(text: &str, limit: usize, line: usize) -> Result<(usize, usize)> {
    let number = |s: &str| -> Result<usize> {
        s.trim()
            .parse::<usize>()
            .map_err(|_| malformed(line, format!("'{}' is not a number", s.trim())))
    };
    let (a, b) = match text.split_once('-') {
        Some((a, b)) => (number(a)?, number(b)?),
        None => {
            let a = number(text)?;
            (a, a)
        }
    };
    if a == 0 || a > b || b > limit {
        return Err(malformed(line, format!("range {}-{} outside 1-{}", a, b, limit)));
    }
    Ok((a - 1, b - 1))
}

impl Bitmap {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").trim()))
            .filter(|(_, l)| !l.is_empty());

        let (first, header) = lines
            .next()
            .ok_or_else(|| RegridError::invalid_configuration("bitmap file is empty"))?;
        let mut directives = header.split(',').map(str::trim);
        if !directives.next().is_some_and(|d| d.eq_ignore_ascii_case("SPEC")) {
            return Err(malformed(first, "expected a SPEC directive"));
        }
        let mut size = None;
        let mut default_on = None;
        for directive in directives {
            let (key, value) = directive
                .split_once('=')
                .ok_or_else(|| malformed(first, format!("bad directive '{}'", directive)))?;
            match key.trim().to_ascii_uppercase().as_str() {
                "SIZE" => {
                    let (we, ns) = value
                        .split_once(':')
                        .ok_or_else(|| malformed(first, "SIZE must be <we>:<ns>"))?;
                    let parse = |s: &str| s.trim().parse::<usize>().ok().filter(|n| *n > 0);
                    match (parse(we), parse(ns)) {
                        (Some(we), Some(ns)) => size = Some((we, ns)),
                        _ => return Err(malformed(first, format!("bad SIZE '{}'", value))),
                    }
                }
                "VALUES" => match value.trim().to_ascii_uppercase().as_str() {
                    "ON" => default_on = Some(true),
                    "OFF" => default_on = Some(false),
                    other => return Err(malformed(first, format!("VALUES must be ON or OFF, got '{}'", other))),
                },
                other => return Err(malformed(first, format!("unknown directive '{}'", other))),
            }
        }
        let (width, height) = size.ok_or_else(|| malformed(first, "missing SIZE"))?;
        let default_on = default_on.ok_or_else(|| malformed(first, "missing VALUES"))?;

        let mut on = vec![default_on; width * height];
        for (number, line) in lines {
            let (rows, columns) = line
                .split_once(':')
                .ok_or_else(|| malformed(number, "expected row:columns"))?;
            let (r0, r1) = parse_range(rows, height, number)?;
            for group in columns.split('/') {
                let (c0, c1) = parse_range(group, width, number)?;
                for r in r0..=r1 {
                    for c in c0..=c1 {
                        on[r * width + c] = !default_on;
                    }
                }
            }
        }
        Ok(Self { width, height, on })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RegridError::resource_unavailable(format!("cannot read bitmap {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Columns (west-east) and rows (north-south).
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_on(&self, row: usize, column: usize) -> bool {
        row < self.height && column < self.width && self.on[row * self.width + column]
    }
}

impl Extraction for Bitmap {
    fn extract(&self, grid: &Grid, values: &mut [f64], missing: f64) -> Result<usize> {
        grid.check_values(values)?;
        let rows = grid.row_lengths();
        if rows.len() != self.height || rows.iter().any(|&c| c != self.width) {
            return Err(RegridError::geometry_mismatch(format!(
                "bitmap of {}x{} does not fit {}",
                self.width, self.height, grid
            )));
        }
        let mut masked = 0;
        for (v, on) in values.iter_mut().zip(&self.on) {
            if !on {
                *v = missing;
                masked += 1;
            }
        }
        debug!(masked, "Applied bitmap");
        Ok(masked)
    }
}

/// The extraction a request asks for: a frame takes precedence over a
/// bitmap file.
pub fn multi_extraction(frame: Option<usize>, bitmap: Option<&Path>) -> Result<Option<Box<dyn Extraction>>> {
    if let Some(width) = frame {
        return Ok(Some(Box::new(Frame::new(width)?)));
    }
    if let Some(path) = bitmap {
        return Ok(Some(Box::new(Bitmap::from_file(path)?)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::{Area, ErrorKind, MISSING_VALUE};
    use test_utils::bitmap;

    /// 4 columns by 3 rows.
    fn grid() -> Grid {
        Grid::regular_ll(Area::new(20.0, 0.0, 0.0, 30.0).unwrap(), 10.0, 10.0).unwrap()
    }

    #[test]
    fn test_bitmap_hole() {
        let b = Bitmap::parse(bitmap::HOLE).unwrap();
        assert_eq!(b.size(), (4, 3));
        assert!(b.is_on(0, 0));
        assert!(!b.is_on(1, 1));
        assert!(!b.is_on(1, 2));
        assert!(b.is_on(1, 3));

        let mut values = vec![1.0; 12];
        assert_eq!(b.extract(&grid(), &mut values, MISSING_VALUE).unwrap(), 2);
        assert_eq!(values[5], MISSING_VALUE);
        assert_eq!(values[6], MISSING_VALUE);
        assert_eq!(values[7], 1.0);
    }

    #[test]
    fn test_bitmap_default_off() {
        let b = Bitmap::parse(bitmap::FIRST_COLUMN).unwrap();
        let mut values = vec![1.0; 12];
        assert_eq!(b.extract(&grid(), &mut values, MISSING_VALUE).unwrap(), 9);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[4], 1.0);
        assert_eq!(values[1], MISSING_VALUE);
    }

    #[test]
    fn test_bitmap_malformed() {
        let err = Bitmap::parse(bitmap::MALFORMED).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(Bitmap::parse("SPEC,SIZE=4:3,VALUES=ON\n4:1\n").is_err());
        assert!(Bitmap::parse("SPEC,SIZE=4:3,VALUES=ON\n1:0-2\n").is_err());
        assert!(Bitmap::parse("SPEC,SIZE=4:3\n").is_err());
    }

    #[test]
    fn test_bitmap_size_mismatch() {
        let b = Bitmap::parse("SPEC,SIZE=5:3,VALUES=ON\n").unwrap();
        let mut values = vec![1.0; 12];
        let err = b.extract(&grid(), &mut values, MISSING_VALUE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeometryMismatch);
    }

    #[test]
    fn test_frame_keeps_border() {
        let g = Grid::regular_ll(Area::new(40.0, 0.0, 0.0, 40.0).unwrap(), 10.0, 10.0).unwrap();
        let mut values = vec![1.0; 25];
        assert_eq!(Frame::new(1).unwrap().extract(&g, &mut values, MISSING_VALUE).unwrap(), 9);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[6], MISSING_VALUE);
        assert_eq!(values[9], 1.0);
        assert_eq!(values[12], MISSING_VALUE);
    }

    #[test]
    fn test_multi_extraction_prefers_frame() {
        let dir = test_utils::temp_test_dir();
        let path = test_utils::write_fixture(dir.path(), "hole.txt", bitmap::HOLE);
        let frame = multi_extraction(Some(2), Some(&path)).unwrap();
        assert!(format!("{:?}", frame).contains("Frame"));
        let bitmap = multi_extraction(None, Some(&path)).unwrap();
        assert!(format!("{:?}", bitmap).contains("Bitmap"));
        assert!(multi_extraction(None, None).unwrap().is_none());
    }
}
