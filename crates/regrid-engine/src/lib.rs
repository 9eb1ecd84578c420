//! Regridding engine: fields, interpolation and transform pipelines.
//!
//! This crate turns a field on one grid or spectral truncation into the
//! same field on another. It provides:
//!
//! - **Interpolation kernels**: bilinear, cubic, nearest-neighbour, linear,
//!   double-linear, averages and conservative remapping, with Lsm, bitmap
//!   and pole policies layered on top
//! - **Transformers**: grid to grid, grid to spectral and spectral to grid,
//!   rotated grid or point list, for scalars and wind pairs
//! - **Caching**: Legendre tables and weight matrices computed once per key
//!   and shared between processes
//!
//! # Architecture
//!
//! ```text
//! Field + TransformRequest
//!      │
//!      ▼
//! Factory::get_transformer(input kind, target)
//!      │
//!      ├─► grid target:     Interpolator (kernel + Lsm + pole policy)
//!      │         │
//!      │         └─► WeightCache when the weights do not depend on data
//!      │
//!      ├─► spectral source: Legendre table ─► FFT synthesis
//!      │
//!      └─► Extraction (frame / bitmap)
//!               │
//!               ▼
//!          TransformOutcome<Field>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use regrid_engine::{EngineConfig, Factory, Field, GridField, TransformRequest};
//!
//! let factory = Factory::new(EngineConfig::default())?;
//! let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 4.0, 4.0)?);
//! let out = factory.transform(&Field::from(field), &request)?;
//! ```

pub mod config;
pub mod extraction;
pub mod factory;
pub mod field;
pub mod interpolation;
pub mod lsm;
pub mod transformer;
pub mod weights;

pub use config::EngineConfig;
pub use extraction::{multi_extraction, Bitmap, Extraction, Frame};
pub use factory::{Factory, FactoryStats};
pub use field::{Field, FieldKind, FieldMetadata, GridField, SpectralField, TransformOutcome, Wind};
pub use interpolation::{DerivedParameter, InterpolationMethod, Interpolator, InterpolatorOptions, PolePolicy};
pub use lsm::{FieldLsm, LandSeaMasks, LsmMethod, LsmRegistry, LsmSource};
pub use transformer::{select_transformer, Statistic, Target, TransformRequest, Transformer, TransformerKind};
pub use weights::{grid_signature, WeightCache, WeightMatrix};
