//! Land-sea masks.
//!
//! Mask fields are supplied by the caller through loaders registered per
//! [`LsmMethod`]; reading mask files sits outside the engine. A mask on a
//! different grid is carried over by nearest neighbour.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use grid_geometry::{grid::same_as, Grid};
use regrid_common::{RegridError, Result};
use spectral_transform::ProcessCache;

use crate::field::GridField;

/// Land fraction at or above which a point counts as land.
pub const LAND_THRESHOLD: f64 = 0.5;

/// Where land-sea masks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LsmMethod {
    #[serde(rename = "predefined")]
    Predefined,
    #[serde(rename = "10min")]
    TenMinute,
    #[serde(rename = "ll1km")]
    OneKilometre,
    #[serde(rename = "gtopo")]
    Gtopo,
    #[serde(rename = "off")]
    Off,
}

impl LsmMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LsmMethod::Predefined => "predefined",
            LsmMethod::TenMinute => "10min",
            LsmMethod::OneKilometre => "ll1km",
            LsmMethod::Gtopo => "gtopo",
            LsmMethod::Off => "off",
        }
    }
}

impl fmt::Display for LsmMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LsmMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "predefined" => Ok(LsmMethod::Predefined),
            "10min" => Ok(LsmMethod::TenMinute),
            "ll1km" => Ok(LsmMethod::OneKilometre),
            "gtopo" => Ok(LsmMethod::Gtopo),
            "off" | "none" => Ok(LsmMethod::Off),
            other => Err(RegridError::invalid_configuration(format!("unknown Lsm method '{}'", other))),
        }
    }
}

/// Land/sea classification of the points of any grid.
pub trait LsmSource: Send + Sync {
    fn name(&self) -> &str;

    /// `true` for land, one entry per point of `grid` in storage order.
    fn mask(&self, grid: &Grid) -> Result<Vec<bool>>;
}

/// Mask taken from a land-fraction field.
#[derive(Debug, Clone)]
pub struct FieldLsm {
    name: String,
    field: GridField,
}

impl FieldLsm {
    pub fn new(name: impl Into<String>, field: GridField) -> Self {
        Self {
            name: name.into(),
            field,
        }
    }
}

impl LsmSource for FieldLsm {
    fn name(&self) -> &str {
        &self.name
    }

    fn mask(&self, grid: &Grid) -> Result<Vec<bool>> {
        let values = self.field.canonical_values()?;
        if same_as(self.field.grid(), grid) {
            return Ok(values.iter().map(|v| *v >= LAND_THRESHOLD).collect());
        }
        debug!(lsm = %self.name, from = %self.field.grid(), to = %grid, "Carrying mask over by nearest neighbour");
        let source = self.field.grid();
        grid.generate_grid_1d()
            .par_iter()
            .map(|p| {
                source
                    .nearest_stencil(p, 1)
                    .first()
                    .map(|n| values[n.index] >= LAND_THRESHOLD)
                    .ok_or_else(|| RegridError::geometry_mismatch("land-sea mask grid has no points"))
            })
            .collect()
    }
}

/// Masks of the source and destination grids of one interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct LandSeaMasks {
    input: Vec<bool>,
    output: Vec<bool>,
}

impl LandSeaMasks {
    pub fn new(source: &dyn LsmSource, input: &Grid, output: &Grid) -> Result<Self> {
        Ok(Self {
            input: source.mask(input)?,
            output: source.mask(output)?,
        })
    }

    pub fn from_masks(input: Vec<bool>, output: Vec<bool>) -> Self {
        Self { input, output }
    }

    pub fn input(&self, index: usize) -> bool {
        self.input.get(index).copied().unwrap_or(false)
    }

    pub fn output(&self, index: usize) -> bool {
        self.output.get(index).copied().unwrap_or(false)
    }

    pub fn check(&self, input: &Grid, output: &Grid) -> Result<()> {
        if self.input.len() != input.calculated_number_of_points()
            || self.output.len() != output.calculated_number_of_points()
        {
            return Err(RegridError::geometry_mismatch(format!(
                "land-sea masks of {} and {} points do not fit {} and {}",
                self.input.len(),
                self.output.len(),
                input,
                output
            )));
        }
        Ok(())
    }
}

/// Loader of a mask field.
pub type LsmLoader = Arc<dyn Fn() -> Result<GridField> + Send + Sync>;

/// Caller-registered mask loaders, each run at most once per process.
#[derive(Default)]
pub struct LsmRegistry {
    loaders: RwLock<HashMap<LsmMethod, LsmLoader>>,
    loaded: ProcessCache<LsmMethod, FieldLsm>,
}

impl LsmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, method: LsmMethod, loader: LsmLoader) -> Result<()> {
        if method == LsmMethod::Off {
            return Err(RegridError::invalid_configuration("cannot register a loader for Lsm 'off'"));
        }
        let mut loaders = self
            .loaders
            .write()
            .map_err(|_| RegridError::resource_unavailable("Lsm registry lock poisoned"))?;
        loaders.insert(method, loader);
        Ok(())
    }

    /// Mask source for `method`; `None` when Lsm is off.
    pub fn source(&self, method: LsmMethod) -> Result<Option<Arc<FieldLsm>>> {
        if method == LsmMethod::Off {
            return Ok(None);
        }
        let loader = {
            let loaders = self
                .loaders
                .read()
                .map_err(|_| RegridError::resource_unavailable("Lsm registry lock poisoned"))?;
            loaders.get(&method).cloned()
        };
        let loader = loader.ok_or_else(|| {
            RegridError::resource_unavailable(format!("no land-sea mask loader registered for '{}'", method))
        })?;
        self.loaded
            .get_or_try_insert(&method, || {
                debug!(lsm = %method, "Loading land-sea mask");
                Ok(FieldLsm::new(method.as_str(), loader()?))
            })
            .map(Some)
    }
}

impl fmt::Debug for LsmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<LsmMethod> = self
            .loaders
            .read()
            .map(|l| l.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("LsmRegistry").field("methods", &methods).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::{Area, ErrorKind, Parameter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Land west of 20E on a 10-degree band.
    fn mask_field() -> GridField {
        let grid = Grid::regular_ll(Area::new(10.0, 0.0, -10.0, 350.0).unwrap(), 10.0, 10.0).unwrap();
        let values = grid
            .generate_grid_1d()
            .iter()
            .map(|p| if p.longitude() < 20.0 { 1.0 } else { 0.0 })
            .collect();
        GridField::new(Parameter::scalar(172), grid, values).unwrap()
    }

    #[test]
    fn test_parse_lsm_method() {
        assert_eq!("10MIN".parse::<LsmMethod>().unwrap(), LsmMethod::TenMinute);
        assert_eq!("gtopo".parse::<LsmMethod>().unwrap(), LsmMethod::Gtopo);
        assert_eq!("off".parse::<LsmMethod>().unwrap(), LsmMethod::Off);
        let err = "glc2000".parse::<LsmMethod>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_field_mask_same_grid() {
        let field = mask_field();
        let lsm = FieldLsm::new("test", field.clone());
        let mask = lsm.mask(field.grid()).unwrap();
        assert_eq!(mask.len(), 108);
        assert!(mask[0] && mask[1]);
        assert!(!mask[2]);
    }

    #[test]
    fn test_field_mask_other_grid() {
        let lsm = FieldLsm::new("test", mask_field());
        let points = [2.0, 8.0, 22.0, 28.0, 352.0]
            .iter()
            .map(|lon| regrid_common::Point::new(1.0, *lon))
            .collect();
        let mask = lsm.mask(&Grid::list(points).unwrap()).unwrap();
        assert_eq!(mask, vec![true, true, false, false, false]);
    }

    #[test]
    fn test_registry_loads_once() {
        let registry = LsmRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry
            .register(
                LsmMethod::Predefined,
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(mask_field())
                }),
            )
            .unwrap();
        assert!(registry.source(LsmMethod::Predefined).unwrap().is_some());
        assert!(registry.source(LsmMethod::Predefined).unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.source(LsmMethod::Off).unwrap().is_none());
        let err = registry.source(LsmMethod::Gtopo).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }
}
