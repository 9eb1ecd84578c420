//! Shared test utilities for the regrid workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Approximate float assertions for scalars, slices and coordinates
//! - Synthetic field generators over arbitrary point sets
//! - Common fixtures (areas, reduced-grid `pl` arrays, bitmap files)
//! - Temporary directories and one-time tracing setup
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use logging::init_tracing;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two slices of equal length.
///
/// ```ignore
/// assert_slice_approx_eq!(&[1.0, 2.0], &[1.0, 2.0000001], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_slice_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f64] = &$left[..];
        let right: &[f64] = &$right[..];
        let epsilon: f64 = $epsilon as f64;
        if left.len() != right.len() {
            panic!(
                "assertion failed: slice lengths differ: left {} right {}",
                left.len(),
                right.len()
            );
        }
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let diff = (l - r).abs();
            if !(diff <= epsilon) {
                panic!(
                    "assertion failed: `(left[{i}] ≈ right[{i}])`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                    l, r, diff, epsilon
                );
            }
        }
    }};
}

/// Macro for approximate equality of (latitude, longitude) pairs.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!((1.0001, 2.0001), (1.0, 2.0), 0.001);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (l1, l2): (f64, f64) = $left;
        let (r1, r2): (f64, f64) = $right;
        let epsilon: f64 = $epsilon as f64;
        let diff1 = (l1 - r1).abs();
        let diff2 = (l2 - r2).abs();
        if diff1 > epsilon || diff2 > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `({:?}, {:?})`,\n right: `({:?}, {:?})`,\n  epsilon: `{:?}`",
                l1, l2, r1, r2, epsilon
            );
        }
    }};
}
