//! What a caller asks a transform to produce.

use std::path::PathBuf;

use grid_geometry::Grid;

use crate::field::FieldKind;
use crate::interpolation::{DerivedParameter, InterpolationMethod, PolePolicy};
use crate::lsm::LsmMethod;

/// Output representation of a transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Resampled onto this grid, resolved against the input by `new_grid`.
    Grid(Grid),
    /// Spherical harmonics of this triangular truncation.
    Spectral { truncation: usize },
}

impl Target {
    pub fn kind(&self) -> FieldKind {
        match self {
            Target::Grid(_) => FieldKind::Grid,
            Target::Spectral { .. } => FieldKind::Spectral,
        }
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self, Target::Grid(g) if g.is_rotated())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Target::Grid(g) if g.is_list())
    }
}

/// Per-point statistic computed instead of the plain interpolated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    StandardDeviation,
    Derived(DerivedParameter),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub target: Target,
    pub method: InterpolationMethod,
    /// Neighbours examined by the point-count kernels; 0 keeps their default.
    pub points: usize,
    /// Restrict interpolation by land-sea class when the parameter allows it.
    pub lsm: bool,
    pub lsm_method: LsmMethod,
    pub pole: PolePolicy,
    pub frame: Option<usize>,
    pub bitmap_file: Option<PathBuf>,
    pub statistic: Option<Statistic>,
}

impl TransformRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            method: InterpolationMethod::Default,
            points: 0,
            lsm: false,
            lsm_method: LsmMethod::Off,
            pole: PolePolicy::Default,
            frame: None,
            bitmap_file: None,
            statistic: None,
        }
    }

    pub fn to_grid(grid: Grid) -> Self {
        Self::new(Target::Grid(grid))
    }

    pub fn to_spectral(truncation: usize) -> Self {
        Self::new(Target::Spectral { truncation })
    }

    pub fn with_method(mut self, method: InterpolationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_points(mut self, points: usize) -> Self {
        self.points = points;
        self
    }

    /// Turn Lsm on with `method`; `LsmMethod::Off` turns it off.
    pub fn with_lsm(mut self, method: LsmMethod) -> Self {
        self.lsm = method != LsmMethod::Off;
        self.lsm_method = method;
        self
    }

    pub fn with_pole(mut self, pole: PolePolicy) -> Self {
        self.pole = pole;
        self
    }

    pub fn with_frame(mut self, width: usize) -> Self {
        self.frame = Some(width);
        self
    }

    pub fn with_bitmap_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.bitmap_file = Some(path.into());
        self
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = Some(statistic);
        self
    }

    /// Whether a frame or bitmap is applied to the output.
    pub fn has_extraction(&self) -> bool {
        self.frame.is_some() || self.bitmap_file.is_some()
    }
}
