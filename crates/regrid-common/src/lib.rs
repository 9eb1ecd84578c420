//! Common types shared across the regrid workspace.
//!
//! Everything here is geometry-agnostic: coordinates, bounding areas,
//! field parameters, storage orderings and the error kinds every other
//! crate propagates.

pub mod area;
pub mod error;
pub mod numeric;
pub mod parameter;
pub mod point;
pub mod scanning;

pub use area::Area;
pub use error::{ErrorKind, RegridError, Result};
pub use numeric::{same, EARTH_RADIUS, MISSING_VALUE};
pub use parameter::Parameter;
pub use point::Point;
pub use scanning::ScanningMode;
