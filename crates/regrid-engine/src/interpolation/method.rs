//! Interpolation method and pole policy names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use grid_geometry::Grid;
use regrid_common::{Parameter, RegridError, Result};

/// Interpolation method for grid resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationMethod {
    Bilinear,
    #[serde(rename = "bilinearinteger")]
    BilinearInteger,
    Linear,
    LinearFit,
    NearestNeighbour,
    Cubic,
    Average,
    DoubleLinear,
    DoubleLinearAdjusted,
    AverageWeighted,
    FluxConserving,
    Conserving,
    /// Resolved per parameter and output grid, see [`InterpolationMethod::resolve`].
    Default,
}

impl InterpolationMethod {
    pub const ALL: [InterpolationMethod; 13] = [
        InterpolationMethod::Bilinear,
        InterpolationMethod::BilinearInteger,
        InterpolationMethod::Linear,
        InterpolationMethod::LinearFit,
        InterpolationMethod::NearestNeighbour,
        InterpolationMethod::Cubic,
        InterpolationMethod::Average,
        InterpolationMethod::DoubleLinear,
        InterpolationMethod::DoubleLinearAdjusted,
        InterpolationMethod::AverageWeighted,
        InterpolationMethod::FluxConserving,
        InterpolationMethod::Conserving,
        InterpolationMethod::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMethod::Bilinear => "bilinear",
            InterpolationMethod::BilinearInteger => "bilinearinteger",
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::LinearFit => "linear-fit",
            InterpolationMethod::NearestNeighbour => "nearest-neighbour",
            InterpolationMethod::Cubic => "cubic",
            InterpolationMethod::Average => "average",
            InterpolationMethod::DoubleLinear => "double-linear",
            InterpolationMethod::DoubleLinearAdjusted => "double-linear-adjusted",
            InterpolationMethod::AverageWeighted => "average-weighted",
            InterpolationMethod::FluxConserving => "flux-conserving",
            InterpolationMethod::Conserving => "conserving",
            InterpolationMethod::Default => "default",
        }
    }

    /// Methods that can restrict their stencil by land-sea class.
    pub fn supports_lsm(&self) -> bool {
        matches!(
            self,
            InterpolationMethod::Bilinear
                | InterpolationMethod::LinearFit
                | InterpolationMethod::NearestNeighbour
                | InterpolationMethod::Cubic
                | InterpolationMethod::Average
                | InterpolationMethod::DoubleLinear
                | InterpolationMethod::AverageWeighted
                | InterpolationMethod::Default
        )
    }

    /// Methods working on cell areas rather than point stencils.
    pub fn is_area_based(&self) -> bool {
        matches!(
            self,
            InterpolationMethod::AverageWeighted | InterpolationMethod::FluxConserving | InterpolationMethod::Conserving
        )
    }

    /// Pick a concrete method for `default` from the parameter and the
    /// output grid; other methods are returned unchanged.
    pub fn resolve(self, parameter: &Parameter, output: &Grid) -> InterpolationMethod {
        if self != InterpolationMethod::Default {
            return self;
        }
        if output.is_list() {
            return InterpolationMethod::Bilinear;
        }
        if parameter.conservation && output.has_cells() {
            return InterpolationMethod::FluxConserving;
        }
        if parameter.nearest {
            return InterpolationMethod::NearestNeighbour;
        }
        InterpolationMethod::Bilinear
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMethod {
    type Err = RegridError;

    /// Parse from string (case-insensitive, dashes optional).
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_ascii_lowercase().replace(['-', '_'], "");
        InterpolationMethod::ALL
            .iter()
            .find(|m| m.as_str().replace('-', "") == wanted)
            .copied()
            .ok_or_else(|| RegridError::invalid_configuration(format!("interpolation method '{}' is not supported", s)))
    }
}

/// What happens to targets beyond the first or last source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolePolicy {
    /// Clamp to the outermost row.
    Nearest,
    /// Extrapolate along the meridian from the two outermost rows.
    Linear,
    /// Use the mean of the outermost row at the pole itself.
    Average,
    /// `average` for fields without a bitmap, `nearest` otherwise.
    Default,
}

impl PolePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolePolicy::Nearest => "nearest",
            PolePolicy::Linear => "linear",
            PolePolicy::Average => "average",
            PolePolicy::Default => "default",
        }
    }

    /// Concrete policy for a field with or without a bitmap.
    pub fn resolve(self, bitmap: bool) -> Result<PolePolicy> {
        match (self, bitmap) {
            (PolePolicy::Default, false) => Ok(PolePolicy::Average),
            (PolePolicy::Default, true) => Ok(PolePolicy::Nearest),
            (PolePolicy::Average, true) => Err(RegridError::not_implemented(
                "average pole extrapolation of fields with a bitmap",
            )),
            (policy, _) => Ok(policy),
        }
    }
}

impl fmt::Display for PolePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolePolicy {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(PolePolicy::Nearest),
            "linear" => Ok(PolePolicy::Linear),
            "average" => Ok(PolePolicy::Average),
            "default" | "" => Ok(PolePolicy::Default),
            other => Err(RegridError::invalid_configuration(format!(
                "unknown pole extrapolation '{}'",
                other
            ))),
        }
    }
}
