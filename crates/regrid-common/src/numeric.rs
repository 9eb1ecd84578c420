//! Numeric tolerances and physical constants.

/// Tolerance, in degrees, under which two coordinates are the same.
pub const DEGREE_EPSILON: f64 = 1e-5;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Default missing-value sentinel for bitmapped fields.
pub const MISSING_VALUE: f64 = 9999.0;

/// Equality within [`DEGREE_EPSILON`].
#[inline]
pub fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < DEGREE_EPSILON
}

/// Equality within an explicit tolerance.
#[inline]
pub fn same_within(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Whether `value` is the missing sentinel.
#[inline]
pub fn is_missing(value: f64, missing: f64) -> bool {
    value == missing || (value - missing).abs() < 1e-9 * missing.abs().max(1.0)
}
