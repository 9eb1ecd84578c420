//! Factory for interpolators, transformers and Legendre tables with shared
//! caching.
//!
//! The `Factory` owns:
//! - the Legendre table caches of every strategy
//! - the weight matrix cache
//! - the land-sea mask registry
//! - the kernel and transformer registries, looked up by enum
//!
//! # Example
//!
//! ```rust,ignore
//! use regrid_engine::{EngineConfig, Factory, TransformRequest};
//!
//! let factory = Factory::new(EngineConfig::from_env())?;
//! let request = TransformRequest::to_grid(Grid::regular_ll(Area::empty(), 1.0, 1.0)?);
//! let output = factory.transform(&field, &request)?.or_input(field);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use grid_geometry::Grid;
use regrid_common::{RegridError, Result};
use spectral_transform::{CacheStats, LegendreMethod, LegendreTable, PolynomialCaches, SharedSegmentCache, SynthesisOptions};

use crate::config::EngineConfig;
use crate::field::{Field, GridField, TransformOutcome, Wind};
use crate::interpolation::{
    builtin_kernels, DerivedParameter, InterpolationMethod, Interpolator, InterpolatorOptions, KernelBuilder,
    PolePolicy,
};
use crate::lsm::{LandSeaMasks, LsmMethod, LsmRegistry};
use crate::transformer::{
    builtin_transformers, select_transformer, Target, TransformRequest, Transformer, TransformerBuilder,
    TransformerKind,
};
use crate::weights::WeightCache;

/// Hit and miss counts of the factory's caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactoryStats {
    pub polynomials: CacheStats,
    pub weights: CacheStats,
}

/// Central construction point of the engine. One factory is meant to live
/// for the whole process and be shared by reference.
pub struct Factory {
    config: EngineConfig,
    polynomials: PolynomialCaches,
    weights: WeightCache,
    lsm: LsmRegistry,
    kernels: HashMap<InterpolationMethod, KernelBuilder>,
    transformers: HashMap<TransformerKind, TransformerBuilder>,
}

impl Factory {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let polynomials = PolynomialCaches::new(
            config.legendre_dir.clone(),
            config.mapped_cache_dir.clone(),
            config.shared_cache_dir.clone(),
        );
        let weights = WeightCache::new(
            Arc::new(SharedSegmentCache::new(config.shared_cache_dir.clone())),
            config.weight_cache_entries,
        );
        info!(
            legendre = %config.legendre_method,
            shared = %config.shared_cache_dir.display(),
            weight_matrix = config.use_weight_matrix,
            "Created regrid factory"
        );
        Ok(Self {
            config,
            polynomials,
            weights,
            lsm: LsmRegistry::new(),
            kernels: builtin_kernels(),
            transformers: builtin_transformers(),
        })
    }

    /// Factory configured from `REGRID_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register mask loaders here before requesting Lsm interpolation.
    pub fn lsm_registry(&self) -> &LsmRegistry {
        &self.lsm
    }

    pub fn weight_cache(&self) -> &WeightCache {
        &self.weights
    }

    pub fn synthesis_options(&self, wind: bool) -> SynthesisOptions {
        SynthesisOptions {
            wind,
            fft_max_block_size: self.config.fft_max_block_size,
        }
    }

    /// Legendre table by the configured strategy.
    pub fn polynomials(&self, truncation: usize, grid: &Grid) -> Result<Arc<LegendreTable>> {
        self.polynomials.polynomials(self.config.legendre_method, truncation, grid)
    }

    /// Legendre table by a named strategy.
    pub fn polynomials_method(&self, name: &str, truncation: usize, grid: &Grid) -> Result<Arc<LegendreTable>> {
        let method: LegendreMethod = name.parse()?;
        self.polynomials.polynomials(method, truncation, grid)
    }

    /// Interpolator for `input` onto `output`. `default` is resolved from
    /// the parameter and output grid first.
    #[allow(clippy::too_many_arguments)]
    pub fn interpolator(
        &self,
        method: InterpolationMethod,
        points: usize,
        input: &GridField,
        output: &Grid,
        use_lsm: bool,
        lsm_method: LsmMethod,
        pole: PolePolicy,
    ) -> Result<Interpolator> {
        let resolved = method.resolve(input.parameter(), output);
        if resolved != method {
            debug!(requested = %method, method = %resolved, "Resolved interpolation method");
        }
        if use_lsm && !resolved.supports_lsm() {
            return Err(RegridError::invalid_configuration(format!(
                "method '{}' is not supported with Lsm",
                resolved
            )));
        }
        let build = self
            .kernels
            .get(&resolved)
            .ok_or_else(|| RegridError::invalid_configuration(format!("no kernel registered for '{}'", resolved)))?;
        let masks = if use_lsm {
            match self.lsm.source(lsm_method)? {
                Some(source) => Some(LandSeaMasks::new(source.as_ref(), input.grid(), output)?),
                None => {
                    debug!("Lsm requested with mask source off");
                    None
                }
            }
        } else {
            None
        };
        let options = InterpolatorOptions {
            pole,
            lsm_factor: self.config.lsm_factor,
        };
        Ok(Interpolator::new(build(resolved, points), options, masks))
    }

    /// [`Factory::interpolator`] from configuration strings.
    #[allow(clippy::too_many_arguments)]
    pub fn interpolation_method(
        &self,
        name: &str,
        points: usize,
        input: &GridField,
        output: &Grid,
        use_lsm: bool,
        lsm_method: &str,
        extrapolate: &str,
    ) -> Result<Interpolator> {
        self.interpolator(
            name.parse()?,
            points,
            input,
            output,
            use_lsm,
            lsm_method.parse()?,
            extrapolate.parse()?,
        )
    }

    pub fn derived_parameter(&self, name: &str) -> Result<DerivedParameter> {
        name.parse()
    }

    /// The pipeline taking `input` to `target`.
    pub fn get_transformer(&self, input: &Field, target: &Target) -> Result<Box<dyn Transformer>> {
        let kind = select_transformer(input.kind(), target.kind(), target.is_rotated(), target.is_list())?;
        let build = self
            .transformers
            .get(&kind)
            .ok_or_else(|| RegridError::invalid_configuration(format!("no transformer registered for {}", kind)))?;
        debug!(transformer = %kind, "Selected transformer");
        Ok(build())
    }

    pub fn transform(&self, input: &Field, request: &TransformRequest) -> Result<TransformOutcome<Field>> {
        self.get_transformer(input, &request.target)?.transform(self, input, request)
    }

    pub fn transform_vector(&self, wind: &Wind, request: &TransformRequest) -> Result<TransformOutcome<Wind>> {
        self.get_transformer(&wind.u, &request.target)?
            .transform_vector(self, wind, request)
    }

    pub fn cache_stats(&self) -> FactoryStats {
        FactoryStats {
            polynomials: self.polynomials.stats(),
            weights: self.weights.stats(),
        }
    }

    /// Forget in-process tables and matrices; published blobs stay.
    pub fn clear_caches(&self) {
        self.polynomials.clear();
        self.weights.clear();
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("config", &self.config)
            .field("stats", &self.cache_stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::{Area, ErrorKind, Parameter};

    fn factory(dir: &std::path::Path) -> Factory {
        let config = EngineConfig {
            legendre_method: LegendreMethod::OnFly,
            mapped_cache_dir: dir.join("mapped"),
            shared_cache_dir: dir.join("shared"),
            ..EngineConfig::default()
        };
        Factory::new(config).unwrap()
    }

    fn field() -> GridField {
        let grid = Grid::regular_ll(Area::empty(), 10.0, 10.0).unwrap();
        let n = grid.calculated_number_of_points();
        GridField::new(Parameter::scalar(167).with_lsm(true), grid, vec![1.0; n]).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            fft_max_block_size: 0,
            ..EngineConfig::default()
        };
        assert_eq!(Factory::new(config).unwrap_err().kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_interpolation_method_strings() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let input = field();
        let output = Grid::regular_ll(Area::empty(), 20.0, 20.0).unwrap();

        let i = factory
            .interpolation_method("default", 4, &input, &output, false, "off", "default")
            .unwrap();
        assert_eq!(i.method(), InterpolationMethod::Bilinear);

        let err = factory
            .interpolation_method("linear", 4, &input, &output, true, "predefined", "nearest")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = factory
            .interpolation_method("spline", 4, &input, &output, false, "off", "nearest")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_lsm_needs_registered_loader() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let input = field();
        let output = Grid::regular_ll(Area::empty(), 20.0, 20.0).unwrap();
        let err = factory
            .interpolation_method("bilinear", 4, &input, &output, true, "10min", "nearest")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);

        let mask = field();
        factory
            .lsm_registry()
            .register(LsmMethod::TenMinute, Arc::new(move || Ok(mask.clone())))
            .unwrap();
        let i = factory
            .interpolation_method("bilinear", 4, &input, &output, true, "10min", "nearest")
            .unwrap();
        assert!(i.uses_lsm());
    }

    #[test]
    fn test_polynomials_method_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let grid = Grid::regular_gg(16, Area::empty()).unwrap();
        let a = factory.polynomials_method("shared", 21, &grid).unwrap();
        let b = factory.polynomials_method("shared", 21, &grid).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = factory.polynomials_method("shared", 10, &grid).unwrap();
        assert_eq!(c.truncation(), 10);
        assert!(factory.polynomials_method("cached", 21, &grid).is_err());
    }

    #[test]
    fn test_get_transformer() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let input: Field = field().into();
        let t = factory.get_transformer(&input, &Target::Spectral { truncation: 21 }).unwrap();
        assert_eq!(t.kind(), TransformerKind::GridToSpectral);
        let list = Grid::list(vec![regrid_common::Point::new(0.0, 0.0)]).unwrap();
        let t = factory.get_transformer(&input, &Target::Grid(list)).unwrap();
        assert_eq!(t.kind(), TransformerKind::GridToGrid);
    }
}
