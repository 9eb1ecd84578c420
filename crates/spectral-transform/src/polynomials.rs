//! Legendre table strategies and the caches behind them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use grid_geometry::Grid;
use regrid_common::{RegridError, Result};

use crate::cache::{decode_legendre, encode_legendre, KeyedBlobCache, MappedFileCache, ProcessCache, SharedSegmentCache};
use crate::legendre::LegendreTable;
use crate::transform::window_latitudes;

/// How Legendre tables are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegendreMethod {
    /// Read a precomputed table file on every request.
    #[serde(rename = "fileio")]
    FileIo,
    /// Cache in a file directory and in process.
    #[serde(rename = "mapped")]
    Mapped,
    /// Cache in a host-wide shared segment and in process.
    #[serde(rename = "shared")]
    Shared,
    /// Recompute for the output rows on every request.
    #[serde(rename = "on_fly")]
    OnFly,
}

impl LegendreMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegendreMethod::FileIo => "fileio",
            LegendreMethod::Mapped => "mapped",
            LegendreMethod::Shared => "shared",
            LegendreMethod::OnFly => "on_fly",
        }
    }
}

impl fmt::Display for LegendreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegendreMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fileio" => Ok(LegendreMethod::FileIo),
            "mapped" => Ok(LegendreMethod::Mapped),
            "shared" => Ok(LegendreMethod::Shared),
            "on_fly" | "onfly" => Ok(LegendreMethod::OnFly),
            other => Err(RegridError::invalid_configuration(format!(
                "unknown Legendre method '{}'",
                other
            ))),
        }
    }
}

type TableKey = (LegendreMethod, usize, String);

/// Key of a cached table: truncation and the grid's latitude signature.
pub fn table_key(truncation: usize, grid: &Grid) -> Result<String> {
    Ok(format!("T{}_{}", truncation, grid.latitude_signature()?))
}

/// Path of a precomputed `fileio` table.
pub fn table_file(dir: &Path, truncation: usize, grid: &Grid) -> Result<PathBuf> {
    Ok(dir.join(format!("{}.leg", table_key(truncation, grid)?)))
}

/// Source of Legendre tables for every strategy.
///
/// One provider is meant to live for the whole process; tables built through
/// `mapped` and `shared` are kept until [`PolynomialCaches::clear`].
pub struct PolynomialCaches {
    legendre_dir: Option<PathBuf>,
    mapped: MappedFileCache,
    shared: SharedSegmentCache,
    tables: ProcessCache<TableKey, LegendreTable>,
}

impl PolynomialCaches {
    pub fn new(legendre_dir: Option<PathBuf>, mapped_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            legendre_dir,
            mapped: MappedFileCache::new(mapped_dir),
            shared: SharedSegmentCache::new(shared_dir),
            tables: ProcessCache::new(),
        }
    }

    pub fn shared_backend(&self) -> &SharedSegmentCache {
        &self.shared
    }

    /// Legendre table for synthesising or analysing T`truncation` on `grid`.
    pub fn polynomials(&self, method: LegendreMethod, truncation: usize, grid: &Grid) -> Result<Arc<LegendreTable>> {
        match method {
            LegendreMethod::FileIo => self.read_file(truncation, grid).map(Arc::new),
            LegendreMethod::OnFly => {
                let latitudes = match grid.row_layout() {
                    Some(layout) => window_latitudes(layout),
                    None => grid.abs_latitudes()?,
                };
                debug!(truncation, latitudes = latitudes.len(), "Computing Legendre table on the fly");
                Ok(Arc::new(LegendreTable::compute(truncation, &latitudes)))
            }
            LegendreMethod::Mapped => self.cached(method, &self.mapped, truncation, grid),
            LegendreMethod::Shared => self.cached(method, &self.shared, truncation, grid),
        }
    }

    fn read_file(&self, truncation: usize, grid: &Grid) -> Result<LegendreTable> {
        let dir = self
            .legendre_dir
            .as_deref()
            .ok_or_else(|| RegridError::resource_unavailable("no Legendre directory configured for fileio"))?;
        let path = table_file(dir, truncation, grid)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| RegridError::resource_unavailable(format!("cannot read {}: {}", path.display(), e)))?;
        let table = decode_legendre(&bytes)?;
        if table.truncation() != truncation {
            return Err(RegridError::resource_unavailable(format!(
                "{} holds T{}, expected T{}",
                path.display(),
                table.truncation(),
                truncation
            )));
        }
        debug!(path = %path.display(), truncation, "Read Legendre table");
        Ok(table)
    }

    fn cached(
        &self,
        method: LegendreMethod,
        backend: &dyn KeyedBlobCache,
        truncation: usize,
        grid: &Grid,
    ) -> Result<Arc<LegendreTable>> {
        let signature = grid.latitude_signature()?;
        let key = (method, truncation, signature);
        self.tables.get_or_try_insert(&key, || {
            let blob_key = format!("T{}_{}", truncation, key.2);
            let blob = backend.get_or_create(&blob_key, &|| {
                let latitudes = grid.abs_latitudes()?;
                debug!(backend = backend.name(), truncation, latitudes = latitudes.len(), "Building Legendre table");
                Ok(encode_legendre(&LegendreTable::compute(truncation, &latitudes)))
            })?;
            let table = decode_legendre(&blob)?;
            if table.truncation() != truncation {
                return Err(RegridError::resource_unavailable(format!(
                    "cached table {} holds T{}",
                    blob_key,
                    table.truncation()
                )));
            }
            Ok(table)
        })
    }

    pub fn stats(&self) -> crate::cache::CacheStats {
        self.tables.stats()
    }

    /// Forget every in-process table. Published blobs are kept.
    pub fn clear(&self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_common::Area;

    #[test]
    fn test_method_parse() {
        assert_eq!("on_fly".parse::<LegendreMethod>().unwrap(), LegendreMethod::OnFly);
        assert_eq!("Mapped".parse::<LegendreMethod>().unwrap(), LegendreMethod::Mapped);
        assert!("mmap".parse::<LegendreMethod>().is_err());
        assert_eq!(LegendreMethod::FileIo.to_string(), "fileio");
    }

    #[test]
    fn test_table_key_uses_signature() {
        let grid = Grid::regular_gg(32, Area::empty()).unwrap();
        assert_eq!(table_key(63, &grid).unwrap(), "T63_N32");
    }

    #[test]
    fn test_on_fly_uses_output_window() {
        let dir = tempfile::tempdir().unwrap();
        let caches = PolynomialCaches::new(None, dir.path().join("m"), dir.path().join("s"));
        let area = Area::new(40.0, 0.0, 20.0, 10.0).unwrap();
        let grid = Grid::regular_ll(area, 10.0, 10.0).unwrap();
        let table = caches.polynomials(LegendreMethod::OnFly, 5, &grid).unwrap();
        assert_eq!(table.latitudes(), &[40.0, 30.0, 20.0]);
    }
}
