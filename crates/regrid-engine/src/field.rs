//! Value-bearing fields: grid point values or spectral coefficients.

use serde::{Deserialize, Serialize};

use grid_geometry::Grid;
use regrid_common::numeric::is_missing;
use regrid_common::{Parameter, RegridError, Result, ScanningMode, MISSING_VALUE};
use spectral_transform::transform::check_spectral;

/// Descriptive metadata carried unchanged through a transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub units: String,
    pub centre: String,
    pub edition: u8,
    pub level: f64,
    pub date: u32,
    pub time: u32,
    pub step_units: String,
    pub start_step: u32,
    pub end_step: u32,
    pub bits_per_value: u8,
}

impl Default for FieldMetadata {
    fn default() -> Self {
        Self {
            units: String::new(),
            centre: "ecmf".to_string(),
            edition: 1,
            level: 0.0,
            date: 0,
            time: 0,
            step_units: "h".to_string(),
            start_step: 0,
            end_step: 0,
            bits_per_value: 16,
        }
    }
}

/// Grid point values, exclusively owning their grid.
#[derive(Debug, Clone)]
pub struct GridField {
    parameter: Parameter,
    metadata: FieldMetadata,
    grid: Grid,
    values: Vec<f64>,
    scanning_mode: ScanningMode,
    bitmap: bool,
    missing_value: f64,
    frame: Option<usize>,
}

impl GridField {
    /// Field in the canonical scanning mode without a bitmap.
    pub fn new(parameter: Parameter, grid: Grid, values: Vec<f64>) -> Result<Self> {
        Self::with_options(parameter, FieldMetadata::default(), grid, values, ScanningMode::default(), false, MISSING_VALUE)
    }

    pub fn with_options(
        parameter: Parameter,
        metadata: FieldMetadata,
        grid: Grid,
        values: Vec<f64>,
        scanning_mode: ScanningMode,
        bitmap: bool,
        missing_value: f64,
    ) -> Result<Self> {
        grid.check_values(&values)?;
        Ok(Self {
            parameter,
            metadata,
            grid,
            values,
            scanning_mode,
            bitmap,
            missing_value,
            frame: None,
        })
    }

    /// A field on `grid` with everything else taken from `self`.
    pub fn derive(&self, grid: Grid, values: Vec<f64>) -> Result<Self> {
        Self::with_options(
            self.parameter.clone(),
            self.metadata.clone(),
            grid,
            values,
            ScanningMode::default(),
            self.bitmap,
            self.missing_value,
        )
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_bitmap(mut self, bitmap: bool) -> Self {
        self.bitmap = bitmap;
        self
    }

    pub fn with_frame(mut self, frame: Option<usize>) -> Self {
        self.frame = frame;
        self
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn scanning_mode(&self) -> ScanningMode {
        self.scanning_mode
    }

    pub fn has_bitmap(&self) -> bool {
        self.bitmap
    }

    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    pub fn frame(&self) -> Option<usize> {
        self.frame
    }

    /// Values in the canonical north-to-south, west-to-east order.
    pub fn canonical_values(&self) -> Result<Vec<f64>> {
        if self.scanning_mode == ScanningMode::default() || self.grid.is_list() {
            return Ok(self.values.clone());
        }
        self.grid.reorder_new_data(&self.values, self.scanning_mode, ScanningMode::default())
    }

    /// Whether any value equals the missing sentinel.
    pub fn has_missing(&self) -> bool {
        self.bitmap && self.values.iter().any(|v| is_missing(*v, self.missing_value))
    }

    /// Release the grid and values to the caller.
    pub fn into_parts(self) -> (Grid, Vec<f64>) {
        (self.grid, self.values)
    }
}

/// Spherical-harmonic coefficients of triangular truncation `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralField {
    parameter: Parameter,
    metadata: FieldMetadata,
    truncation: usize,
    values: Vec<f64>,
}

impl SpectralField {
    pub fn new(parameter: Parameter, truncation: usize, values: Vec<f64>) -> Result<Self> {
        Self::with_metadata(parameter, FieldMetadata::default(), truncation, values)
    }

    pub fn with_metadata(parameter: Parameter, metadata: FieldMetadata, truncation: usize, values: Vec<f64>) -> Result<Self> {
        check_spectral(truncation, &values)?;
        Ok(Self {
            parameter,
            metadata,
            truncation,
            values,
        })
    }

    /// An all-zero request describing the wanted truncation.
    pub fn request(parameter: Parameter, truncation: usize) -> Self {
        Self {
            parameter,
            metadata: FieldMetadata::default(),
            truncation,
            values: vec![0.0; spectral_transform::spectral_len(truncation)],
        }
    }

    pub fn derive(&self, truncation: usize, values: Vec<f64>) -> Result<Self> {
        Self::with_metadata(self.parameter.clone(), self.metadata.clone(), truncation, values)
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    pub fn truncation(&self) -> usize {
        self.truncation
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub enum Field {
    Grid(GridField),
    Spectral(SpectralField),
}

/// Whether a field lives on grid points or in spectral space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Grid,
    Spectral,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Grid(_) => FieldKind::Grid,
            Field::Spectral(_) => FieldKind::Spectral,
        }
    }

    pub fn parameter(&self) -> &Parameter {
        match self {
            Field::Grid(f) => f.parameter(),
            Field::Spectral(f) => f.parameter(),
        }
    }

    pub fn as_grid(&self) -> Result<&GridField> {
        match self {
            Field::Grid(f) => Ok(f),
            Field::Spectral(_) => Err(RegridError::invalid_configuration("expected a grid field, got a spectral field")),
        }
    }

    pub fn as_spectral(&self) -> Result<&SpectralField> {
        match self {
            Field::Spectral(f) => Ok(f),
            Field::Grid(_) => Err(RegridError::invalid_configuration("expected a spectral field, got a grid field")),
        }
    }

    /// Grid of a grid field.
    pub fn grid(&self) -> Option<&Grid> {
        match self {
            Field::Grid(f) => Some(f.grid()),
            Field::Spectral(_) => None,
        }
    }
}

impl From<GridField> for Field {
    fn from(f: GridField) -> Self {
        Field::Grid(f)
    }
}

impl From<SpectralField> for Field {
    fn from(f: SpectralField) -> Self {
        Field::Spectral(f)
    }
}

/// A pair of wind components.
#[derive(Debug, Clone)]
pub struct Wind {
    pub u: Field,
    pub v: Field,
}

/// Result of a transform: either new data or a signal that the input
/// already matches the request.
#[derive(Debug, Clone)]
#[must_use]
pub enum TransformOutcome<T> {
    Transformed(T),
    Unchanged,
}

impl<T> TransformOutcome<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, TransformOutcome::Unchanged)
    }

    /// The new value, or `input` when nothing changed.
    pub fn or_input(self, input: T) -> T {
        match self {
            TransformOutcome::Transformed(v) => v,
            TransformOutcome::Unchanged => input,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransformOutcome<U> {
        match self {
            TransformOutcome::Transformed(v) => TransformOutcome::Transformed(f(v)),
            TransformOutcome::Unchanged => TransformOutcome::Unchanged,
        }
    }

    pub fn transformed(self) -> Option<T> {
        match self {
            TransformOutcome::Transformed(v) => Some(v),
            TransformOutcome::Unchanged => None,
        }
    }
}
