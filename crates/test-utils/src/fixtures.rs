//! Common test fixtures for regrid tests.
//!
//! Areas are `(north, west, south, east)` in degrees.

/// Common areas for testing.
pub mod area {
    /// Whole globe.
    pub const GLOBAL: (f64, f64, f64, f64) = (90.0, 0.0, -90.0, 360.0);

    /// Europe, crossing the Greenwich meridian.
    pub const EUROPE: (f64, f64, f64, f64) = (72.0, -15.0, 35.0, 45.0);

    /// Tropical band.
    pub const TROPICS: (f64, f64, f64, f64) = (23.5, 0.0, -23.5, 360.0);

    /// A small box in the Pacific crossing the date line.
    pub const DATELINE: (f64, f64, f64, f64) = (10.0, 170.0, -10.0, 190.0);
}

/// Reduced-grid point counts.
pub mod pl {
    /// Octahedral counts `20 + 4j` from the pole to the equator, mirrored
    /// for the southern hemisphere.
    pub fn octahedral(n: usize) -> Vec<usize> {
        let north: Vec<usize> = (0..n).map(|j| 20 + 4 * j).collect();
        north.iter().chain(north.iter().rev()).copied().collect()
    }

    /// Lat/lon counts for a 10-degree reduced grid (19 rows, pole to pole).
    pub const REDUCED_LL_10: [usize; 19] = [
        1, 8, 12, 18, 24, 28, 30, 34, 36, 36, 36, 34, 30, 28, 24, 18, 12, 8, 1,
    ];
}

/// Bitmap definition files.
pub mod bitmap {
    /// 4x3 lat/lon grid, everything on except row 2 columns 2-3.
    pub const HOLE: &str = "# sample bitmap\nSPEC,SIZE=4:3,VALUES=ON\n2:2-3\n";

    /// Everything off except the first column.
    pub const FIRST_COLUMN: &str = "SPEC,SIZE=4:3,VALUES=OFF\n1-3:1\n";

    /// Missing directive line.
    pub const MALFORMED: &str = "SIZE=4:3\n1:1\n";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octahedral_pl() {
        let p = pl::octahedral(3);
        assert_eq!(p, vec![20, 24, 28, 28, 24, 20]);
    }

    #[test]
    fn test_reduced_ll_rows() {
        assert_eq!(pl::REDUCED_LL_10.len(), 19);
        assert_eq!(pl::REDUCED_LL_10[9], 36);
    }
}
