//! Spherical-harmonic transforms for the regridding engine.
//!
//! - [`legendre`]: normalised associated Legendre functions and tables
//! - [`fft`]: per-row Fourier synthesis and analysis
//! - [`transform`]: spectral to grid synthesis and Gaussian analysis
//! - [`truncation`], [`vordiv`]: spectral to spectral operations
//! - [`polynomials`], [`cache`]: table strategies and their caches

pub mod cache;
pub mod fft;
pub mod legendre;
pub mod polynomials;
pub mod transform;
pub mod truncation;
pub mod vordiv;

pub use cache::{CacheStats, KeyedBlobCache, MappedFileCache, ProcessCache, SharedSegmentCache};
pub use legendre::{coefficient_index, legendre_functions, triangle_size, LegendreTable};
pub use polynomials::{LegendreMethod, PolynomialCaches};
pub use transform::{analyse, spectral_len, synthesise_points, synthesise_rows, SynthesisOptions};
pub use truncation::truncate;
pub use vordiv::vorticity_divergence_to_uv;
