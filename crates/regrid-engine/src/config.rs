//! Configuration for the regrid engine.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use regrid_common::{RegridError, Result};
use spectral_transform::{LegendreMethod, SharedSegmentCache};

/// Configuration for the regrid engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How Legendre tables are obtained.
    pub legendre_method: LegendreMethod,

    /// Directory of precomputed tables read by `fileio`.
    pub legendre_dir: Option<PathBuf>,

    /// Backing directory of the `mapped` blob cache.
    pub mapped_cache_dir: PathBuf,

    /// Backing directory of the `shared` blob cache.
    pub shared_cache_dir: PathBuf,

    /// Maximum number of rows synthesised per Fourier batch.
    pub fft_max_block_size: usize,

    /// Lower the output truncation to match the output grid.
    pub auto_resolution: bool,

    /// Convert vorticity/divergence pairs to u/v winds.
    pub vd_conversion: bool,

    /// Weight multiplier applied to opposite land-sea class points.
    pub lsm_factor: f64,

    /// Regrid data without missing values through cached weight matrices.
    pub use_weight_matrix: bool,

    /// Number of weight matrices kept in process.
    pub weight_cache_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            legendre_method: LegendreMethod::Mapped,
            legendre_dir: None,
            mapped_cache_dir: std::env::temp_dir().join("regrid-mapped"),
            shared_cache_dir: SharedSegmentCache::default_dir(),
            fft_max_block_size: 64,
            auto_resolution: false,
            vd_conversion: true,
            lsm_factor: 0.0,
            use_weight_matrix: false,
            weight_cache_entries: 16,
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply `REGRID_<name>` when it is set and parses.
fn env_value<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let key = format!("REGRID_{}", name);
    let val = std::env::var(&key).ok()?;
    let parsed = parse(&val);
    if parsed.is_none() {
        warn!(variable = %key, value = %val, "Ignoring unparsable configuration value");
    }
    parsed
}

impl EngineConfig {
    /// Load configuration from `REGRID_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(method) = env_value("LEGENDRE_METHOD", |v| LegendreMethod::from_str(v).ok()) {
            config.legendre_method = method;
        }
        if let Some(dir) = env_value("LEGENDRE_DIR", |v| Some(PathBuf::from(v))) {
            config.legendre_dir = Some(dir);
        }
        if let Some(dir) = env_value("MAPPED_CACHE_DIR", |v| Some(PathBuf::from(v))) {
            config.mapped_cache_dir = dir;
        }
        if let Some(dir) = env_value("SHARED_CACHE_DIR", |v| Some(PathBuf::from(v))) {
            config.shared_cache_dir = dir;
        }
        if let Some(size) = env_value("FFT_MAX_BLOCK_SIZE", |v| v.parse().ok()) {
            config.fft_max_block_size = size;
        }
        if let Some(flag) = env_value("AUTO_RESOLUTION", parse_flag) {
            config.auto_resolution = flag;
        }
        if let Some(flag) = env_value("VD_CONVERSION", parse_flag) {
            config.vd_conversion = flag;
        }
        if let Some(factor) = env_value("LSM_FACTOR", |v| v.parse().ok()) {
            config.lsm_factor = factor;
        }
        if let Some(flag) = env_value("USE_WEIGHT_MATRIX", parse_flag) {
            config.use_weight_matrix = flag;
        }
        if let Some(entries) = env_value("WEIGHT_CACHE_ENTRIES", |v| v.parse().ok()) {
            config.weight_cache_entries = entries;
        }

        config
    }

    /// Parse a YAML document; absent keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fft_max_block_size == 0 {
            return Err(RegridError::invalid_configuration("fft_max_block_size must be > 0"));
        }

        if !(0.0..=1.0).contains(&self.lsm_factor) {
            return Err(RegridError::invalid_configuration(format!(
                "lsm_factor must be within [0, 1], got {}",
                self.lsm_factor
            )));
        }

        if self.use_weight_matrix && self.weight_cache_entries == 0 {
            return Err(RegridError::invalid_configuration(
                "weight_cache_entries must be > 0 when use_weight_matrix is set",
            ));
        }

        if self.legendre_method == LegendreMethod::FileIo && self.legendre_dir.is_none() {
            return Err(RegridError::invalid_configuration(
                "legendre_dir is required by the fileio Legendre method",
            ));
        }

        Ok(())
    }
}
