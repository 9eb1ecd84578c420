//! Scanning modes and value reordering.
//!
//! Values of a row-structured grid are stored row by row. The four modes
//! combine the row order with the order of points inside each row:
//!
//! | mode | rows             | points in a row |
//! |------|------------------|-----------------|
//! | 1    | north to south   | west to east    |
//! | 2    | south to north   | west to east    |
//! | 3    | north to south   | east to west    |
//! | 4    | south to north   | east to west    |
//!
//! Mode 1 is the canonical in-memory order of the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegridError, Result};

/// Scanning mode flags for value ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScanningMode {
    #[default]
    NorthSouthWestEast,
    SouthNorthWestEast,
    NorthSouthEastWest,
    SouthNorthEastWest,
}

impl ScanningMode {
    /// Create from the numeric mode 1..4.
    pub fn from_number(mode: u8) -> Result<Self> {
        match mode {
            1 => Ok(Self::NorthSouthWestEast),
            2 => Ok(Self::SouthNorthWestEast),
            3 => Ok(Self::NorthSouthEastWest),
            4 => Ok(Self::SouthNorthEastWest),
            other => Err(RegridError::invalid_configuration(format!(
                "scanning mode {} is not one of 1..4",
                other
            ))),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::NorthSouthWestEast => 1,
            Self::SouthNorthWestEast => 2,
            Self::NorthSouthEastWest => 3,
            Self::SouthNorthEastWest => 4,
        }
    }

    /// Rows run from south to north.
    pub fn rows_reversed(&self) -> bool {
        matches!(self, Self::SouthNorthWestEast | Self::SouthNorthEastWest)
    }

    /// Points in a row run from east to west.
    pub fn points_reversed(&self) -> bool {
        matches!(self, Self::NorthSouthEastWest | Self::SouthNorthEastWest)
    }

    /// Reorder `data` stored in this mode into the canonical mode 1.
    ///
    /// `row_lengths` lists the point count of every row in canonical
    /// (north to south) order.
    pub fn to_canonical(&self, data: &[f64], row_lengths: &[usize]) -> Result<Vec<f64>> {
        check_length(data, row_lengths)?;
        let mut out = vec![0.0; data.len()];
        let offsets = canonical_offsets(row_lengths);
        let mut cursor = 0;
        for k in 0..row_lengths.len() {
            let row = if self.rows_reversed() { row_lengths.len() - 1 - k } else { k };
            let len = row_lengths[row];
            let dest = &mut out[offsets[row]..offsets[row] + len];
            let src = &data[cursor..cursor + len];
            copy_row(src, dest, self.points_reversed());
            cursor += len;
        }
        Ok(out)
    }

    /// Reorder canonical mode 1 `data` into this mode.
    pub fn reorder_from_canonical(&self, data: &[f64], row_lengths: &[usize]) -> Result<Vec<f64>> {
        check_length(data, row_lengths)?;
        let mut out = vec![0.0; data.len()];
        let offsets = canonical_offsets(row_lengths);
        let mut cursor = 0;
        for k in 0..row_lengths.len() {
            let row = if self.rows_reversed() { row_lengths.len() - 1 - k } else { k };
            let len = row_lengths[row];
            let src = &data[offsets[row]..offsets[row] + len];
            copy_row(src, &mut out[cursor..cursor + len], self.points_reversed());
            cursor += len;
        }
        Ok(out)
    }

    /// Reorder between two arbitrary modes.
    pub fn reorder(from: ScanningMode, to: ScanningMode, data: &[f64], row_lengths: &[usize]) -> Result<Vec<f64>> {
        if from == to {
            check_length(data, row_lengths)?;
            return Ok(data.to_vec());
        }
        let canonical = from.to_canonical(data, row_lengths)?;
        to.reorder_from_canonical(&canonical, row_lengths)
    }
}

impl fmt::Display for ScanningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

fn check_length(data: &[f64], row_lengths: &[usize]) -> Result<()> {
    let expected: usize = row_lengths.iter().sum();
    if expected != data.len() {
        return Err(RegridError::geometry_mismatch(format!(
            "{} values cannot be reordered over rows holding {} points",
            data.len(),
            expected
        )));
    }
    Ok(())
}

fn canonical_offsets(row_lengths: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(row_lengths.len());
    let mut acc = 0;
    for len in row_lengths {
        offsets.push(acc);
        acc += len;
    }
    offsets
}

fn copy_row(src: &[f64], dest: &mut [f64], reversed: bool) {
    if reversed {
        for (d, s) in dest.iter_mut().zip(src.iter().rev()) {
            *d = *s;
        }
    } else {
        dest.copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<f64>, Vec<usize>) {
        // Reduced layout: rows of 2, 4 and 3 points.
        let rows = vec![2, 4, 3];
        let data = (0..9).map(|v| v as f64).collect();
        (data, rows)
    }

    #[test]
    fn test_mode_numbers_round_trip() {
        for n in 1..=4 {
            assert_eq!(ScanningMode::from_number(n).unwrap().number(), n);
        }
        assert!(ScanningMode::from_number(0).is_err());
        assert!(ScanningMode::from_number(5).is_err());
    }

    #[test]
    fn test_south_north_reverses_rows() {
        let (data, rows) = sample();
        let out = ScanningMode::SouthNorthWestEast.reorder_from_canonical(&data, &rows).unwrap();
        assert_eq!(out, vec![6.0, 7.0, 8.0, 2.0, 3.0, 4.0, 5.0, 0.0, 1.0]);
    }

    #[test]
    fn test_east_west_reverses_points() {
        let (data, rows) = sample();
        let out = ScanningMode::NorthSouthEastWest.reorder_from_canonical(&data, &rows).unwrap();
        assert_eq!(out, vec![1.0, 0.0, 5.0, 4.0, 3.0, 2.0, 8.0, 7.0, 6.0]);
    }

    #[test]
    fn test_every_pair_round_trips() {
        let (data, rows) = sample();
        for a in 1..=4 {
            for b in 1..=4 {
                let ma = ScanningMode::from_number(a).unwrap();
                let mb = ScanningMode::from_number(b).unwrap();
                let there = ScanningMode::reorder(ma, mb, &data, &rows).unwrap();
                let back = ScanningMode::reorder(mb, ma, &there, &rows).unwrap();
                assert_eq!(back, data, "modes {} -> {} -> {}", a, b, a);
            }
        }
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let err = ScanningMode::SouthNorthEastWest
            .to_canonical(&[1.0, 2.0], &[3])
            .unwrap_err();
        assert!(err.to_string().contains("cannot be reordered"));
    }
}
