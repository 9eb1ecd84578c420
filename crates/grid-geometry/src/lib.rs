//! Grid geometry for regridding.
//!
//! Provides the closed [`Grid`] type over every supported variant together
//! with the geometry the interpolation and spectral layers need:
//! - Gaussian latitudes, weights and the truncation/resolution table
//! - rotated-pole and polar stereographic coordinate transforms
//! - row layouts, nearest-point stencils and spherical cell areas

pub mod cell;
pub mod gaussian;
pub mod grid;
pub mod layout;
pub mod polar_stereographic;
pub mod rotation;
pub mod stencil;

pub use cell::CellBounds;
pub use gaussian::{gaussian_for_truncation, truncation_for_gaussian, GaussianLatitudes};
pub use grid::{
    same_as, Grid, GridKind, ListOfPoints, ReducedGaussian, ReducedLatLon, RegularGaussian,
    RegularLatLon, RegularLatLonCellCentered, RotatedRegularLatLon,
};
pub use layout::{Bracket, Row, RowLayout, RowPosition};
pub use polar_stereographic::PolarStereographic;
pub use rotation::Rotation;
pub use stencil::{CellOverlap, FieldPoint, Stencil, StencilKind, StencilPoint};
