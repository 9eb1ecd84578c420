//! Transform pipelines between grid and spectral representations.
//!
//! [`select_transformer`] picks the pipeline from the input kind and the
//! requested target; each pipeline is a [`Transformer`].

mod grid;
mod request;
mod spectral;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use grid_geometry::Grid;
use regrid_common::numeric::is_missing;
use regrid_common::{Parameter, RegridError, Result, ScanningMode, MISSING_VALUE};

use crate::extraction::multi_extraction;
use crate::factory::Factory;
use crate::field::{Field, FieldKind, FieldMetadata, GridField, TransformOutcome, Wind};

pub use grid::{GridToGrid, GridToSpectral};
pub use request::{Statistic, Target, TransformRequest};
pub use spectral::{SpectralToGrid, SpectralToListOfPoints, SpectralToRotatedGrid, SpectralToSpectral};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformerKind {
    SpectralToSpectral,
    GridToGrid,
    SpectralToGrid,
    SpectralToRotatedGrid,
    SpectralToListOfPoints,
    GridToSpectral,
}

impl TransformerKind {
    pub const ALL: [TransformerKind; 6] = [
        TransformerKind::SpectralToSpectral,
        TransformerKind::GridToGrid,
        TransformerKind::SpectralToGrid,
        TransformerKind::SpectralToRotatedGrid,
        TransformerKind::SpectralToListOfPoints,
        TransformerKind::GridToSpectral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformerKind::SpectralToSpectral => "sh2sh",
            TransformerKind::GridToGrid => "grid2grid",
            TransformerKind::SpectralToGrid => "sh2grid",
            TransformerKind::SpectralToRotatedGrid => "sh2rotated",
            TransformerKind::SpectralToListOfPoints => "sh2points",
            TransformerKind::GridToSpectral => "grid2sh",
        }
    }
}

impl fmt::Display for TransformerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline for an input kind and a target description.
pub fn select_transformer(input: FieldKind, output: FieldKind, rotated: bool, list: bool) -> Result<TransformerKind> {
    use FieldKind::{Grid, Spectral};
    match (input, output, rotated, list) {
        (_, _, true, true) => Err(RegridError::invalid_configuration(
            "an output cannot be both rotated and a list of points",
        )),
        (Spectral, Spectral, false, false) => Ok(TransformerKind::SpectralToSpectral),
        (Grid, Spectral, false, false) => Ok(TransformerKind::GridToSpectral),
        (_, Spectral, _, _) => Err(RegridError::invalid_configuration(
            "spectral outputs cannot be rotated or lists of points",
        )),
        (Spectral, Grid, true, false) => Ok(TransformerKind::SpectralToRotatedGrid),
        (Spectral, Grid, false, true) => Ok(TransformerKind::SpectralToListOfPoints),
        (Spectral, Grid, false, false) => Ok(TransformerKind::SpectralToGrid),
        (Grid, Grid, _, _) => Ok(TransformerKind::GridToGrid),
    }
}

/// A transform pipeline for one (input kind, output kind) pair.
pub trait Transformer: Send + Sync + fmt::Debug {
    fn kind(&self) -> TransformerKind;

    /// Transform one field. `Unchanged` means the input already is the
    /// requested output.
    fn transform(&self, factory: &Factory, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>>;

    /// Transform a wind pair. Components are transformed independently
    /// unless the pipeline overrides this.
    fn transform_vector(&self, factory: &Factory, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        componentwise(self, factory, wind, request)
    }
}

/// Each wind component through `transformer` on its own.
fn componentwise<T: Transformer + ?Sized>(
    transformer: &T,
    factory: &Factory,
    wind: &Wind,
    request: &TransformRequest,
) -> Result<TransformOutcome<Wind>> {
    check_vector(wind)?;
    let u = transformer.transform(factory, &wind.u, request)?;
    let v = transformer.transform(factory, &wind.v, request)?;
    Ok(match (u, v) {
        (TransformOutcome::Unchanged, TransformOutcome::Unchanged) => TransformOutcome::Unchanged,
        (u, v) => TransformOutcome::Transformed(Wind {
            u: u.or_input(wind.u.clone()),
            v: v.or_input(wind.v.clone()),
        }),
    })
}

/// Statistics are only defined between grids.
fn no_statistic(kind: TransformerKind, request: &TransformRequest) -> Result<()> {
    match request.statistic {
        Some(s) => Err(RegridError::not_implemented(format!("{:?} on {} transforms", s, kind))),
        None => Ok(()),
    }
}

pub type TransformerBuilder = fn() -> Box<dyn Transformer>;

fn sh2sh() -> Box<dyn Transformer> {
    Box::new(SpectralToSpectral)
}

fn grid2grid() -> Box<dyn Transformer> {
    Box::new(GridToGrid)
}

fn sh2grid() -> Box<dyn Transformer> {
    Box::new(SpectralToGrid)
}

fn sh2rotated() -> Box<dyn Transformer> {
    Box::new(SpectralToRotatedGrid)
}

fn sh2points() -> Box<dyn Transformer> {
    Box::new(SpectralToListOfPoints)
}

fn grid2sh() -> Box<dyn Transformer> {
    Box::new(GridToSpectral)
}

/// Every pipeline with its constructor.
pub fn builtin_transformers() -> HashMap<TransformerKind, TransformerBuilder> {
    let table: [(TransformerKind, TransformerBuilder); 6] = [
        (TransformerKind::SpectralToSpectral, sh2sh),
        (TransformerKind::GridToGrid, grid2grid),
        (TransformerKind::SpectralToGrid, sh2grid),
        (TransformerKind::SpectralToRotatedGrid, sh2rotated),
        (TransformerKind::SpectralToListOfPoints, sh2points),
        (TransformerKind::GridToSpectral, grid2sh),
    ];
    table.into_iter().collect()
}

fn target_grid(request: &TransformRequest) -> Result<&Grid> {
    match &request.target {
        Target::Grid(g) => Ok(g),
        Target::Spectral { .. } => Err(RegridError::invalid_configuration("expected a grid target, got a spectral one")),
    }
}

fn target_truncation(request: &TransformRequest) -> Result<usize> {
    match &request.target {
        Target::Spectral { truncation } => Ok(*truncation),
        Target::Grid(_) => Err(RegridError::invalid_configuration("expected a spectral target, got a grid")),
    }
}

fn check_vector(wind: &Wind) -> Result<()> {
    if wind.u.kind() != wind.v.kind() {
        return Err(RegridError::invalid_configuration("wind components must both be grid or both be spectral"));
    }
    Ok(())
}

/// Output values become a field on `grid`, with the request's extraction
/// applied. Any missing value switches on the bitmap.
fn grid_field(
    parameter: Parameter,
    metadata: FieldMetadata,
    grid: Grid,
    mut values: Vec<f64>,
    bitmap: bool,
    missing: f64,
    request: &TransformRequest,
) -> Result<GridField> {
    let masked = match multi_extraction(request.frame, request.bitmap_file.as_deref())? {
        Some(extraction) => extraction.extract(&grid, &mut values, missing)?,
        None => 0,
    };
    let bitmap = bitmap || masked > 0 || values.iter().any(|v| is_missing(*v, missing));
    if masked > 0 {
        debug!(masked, "Masked output points");
    }
    Ok(GridField::with_options(parameter, metadata, grid, values, ScanningMode::default(), bitmap, missing)?
        .with_frame(request.frame))
}

/// An output field derived from a grid input.
fn derived_field(input: &GridField, grid: Grid, values: Vec<f64>, request: &TransformRequest) -> Result<GridField> {
    grid_field(
        input.parameter().clone(),
        input.metadata().clone(),
        grid,
        values,
        input.has_bitmap(),
        input.missing_value(),
        request,
    )
}

/// An output field synthesised from spectral data, which has no missing
/// values of its own.
fn synthesised_field(
    parameter: Parameter,
    metadata: FieldMetadata,
    grid: Grid,
    values: Vec<f64>,
    request: &TransformRequest,
) -> Result<GridField> {
    grid_field(parameter, metadata, grid, values, false, MISSING_VALUE, request)
}

/// Express geographic winds on `grid`'s rotated frame; winds on other
/// grids are returned as they are.
fn rotate_winds(grid: &Grid, u: &mut [f64], v: &mut [f64], missing: f64) -> Result<()> {
    let Grid::RotatedRegularLatLon(rotated) = grid else {
        return Ok(());
    };
    grid.check_values(u)?;
    grid.check_values(v)?;
    let rotation = rotated.rotation();
    for ((p, u), v) in grid.generate_grid_1d().iter().zip(u.iter_mut()).zip(v.iter_mut()) {
        if is_missing(*u, missing) || is_missing(*v, missing) {
            continue;
        }
        let (ru, rv) = rotation.wind_to_rotated(p, *u, *v);
        *u = ru;
        *v = rv;
    }
    debug!(points = u.len(), "Rotated winds onto output frame");
    Ok(())
}
