//! Sparse interpolation weights cached per (method, source, destination).
//!
//! Matrices are published through a [`KeyedBlobCache`] in the triplet
//! segment layout so that other processes reuse them, and the most recent
//! ones are kept decoded in a bounded LRU.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::debug;

use grid_geometry::Grid;
use regrid_common::{RegridError, Result};
use spectral_transform::cache::{decode_triplets, encode_triplets, Triplet};
use spectral_transform::{CacheStats, KeyedBlobCache};

use crate::interpolation::{Interpolator, WeightedPoint};

/// Output-by-input matrix of interpolation weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    rows: usize,
    columns: usize,
    /// Sorted by row.
    triplets: Vec<Triplet>,
}

fn to_index(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| RegridError::geometry_mismatch(format!("index {} exceeds the matrix layout", value)))
}

impl WeightMatrix {
    /// One row per output point; zero weights are dropped.
    pub fn from_weights(columns: usize, weights: &[Vec<WeightedPoint>]) -> Result<Self> {
        let mut triplets = Vec::new();
        for (row, points) in weights.iter().enumerate() {
            let r = to_index(row)?;
            for p in points.iter().filter(|p| p.weight != 0.0) {
                if p.index >= columns {
                    return Err(RegridError::geometry_mismatch(format!(
                        "weight column {} outside {} source points",
                        p.index, columns
                    )));
                }
                triplets.push((r, to_index(p.index)?, p.weight));
            }
        }
        Ok(Self {
            rows: weights.len(),
            columns,
            triplets,
        })
    }

    /// Rebuild a matrix of known shape from its segment bytes.
    pub fn from_bytes(rows: usize, columns: usize, bytes: &[u8]) -> Result<Self> {
        let triplets = decode_triplets(bytes)?;
        for (r, c, _) in &triplets {
            if *r < 0 || *c < 0 || *r as usize >= rows || *c as usize >= columns {
                return Err(RegridError::geometry_mismatch(format!(
                    "cached triplet ({}, {}) outside a {}x{} matrix",
                    r, c, rows, columns
                )));
            }
        }
        Ok(Self { rows, columns, triplets })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_triplets(&self.triplets)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn non_zeros(&self) -> usize {
        self.triplets.len()
    }

    /// `W · values`.
    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.columns {
            return Err(RegridError::geometry_mismatch(format!(
                "weight matrix expects {} values, got {}",
                self.columns,
                values.len()
            )));
        }
        let mut out = vec![0.0; self.rows];
        for (r, c, w) in &self.triplets {
            out[*r as usize] += w * values[*c as usize];
        }
        Ok(out)
    }
}

/// Grid kind plus a checksum of its full definition.
pub fn grid_signature(grid: &Grid) -> String {
    format!("{}-{:08x}", grid.kind(), crc32fast::hash(&grid.definition_bytes()))
}

/// Bounded in-process LRU over a cross-process blob backend.
pub struct WeightCache {
    backend: Arc<dyn KeyedBlobCache>,
    matrices: Mutex<LruCache<String, Arc<WeightMatrix>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl WeightCache {
    pub fn new(backend: Arc<dyn KeyedBlobCache>, entries: usize) -> Self {
        Self {
            backend,
            matrices: Mutex::new(LruCache::new(NonZeroUsize::new(entries).unwrap_or(NonZeroUsize::MIN))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn key(interpolator: &Interpolator, source: &Grid, output: &Grid) -> String {
        format!(
            "W_{}_{}_{}_{}",
            interpolator.cache_tag(),
            interpolator.options().pole,
            grid_signature(source),
            grid_signature(output)
        )
    }

    /// The matrix of `interpolator` from `source` to `output`, computed at
    /// most once per key across the backend's users.
    pub fn matrix(&self, interpolator: &Interpolator, source: &Grid, output: &Grid) -> Result<Arc<WeightMatrix>> {
        if !interpolator.is_data_independent() {
            return Err(RegridError::invalid_configuration(format!(
                "{} weights depend on the data and cannot be cached",
                interpolator.method()
            )));
        }
        let key = Self::key(interpolator, source, output);
        {
            let mut matrices = self
                .matrices
                .lock()
                .map_err(|_| RegridError::resource_unavailable("weight cache lock poisoned"))?;
            if let Some(m) = matrices.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(m.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let rows = output.calculated_number_of_points();
        let columns = source.calculated_number_of_points();
        let bytes = self.backend.get_or_create(&key, &|| {
            debug!(backend = self.backend.name(), key = %key, "Computing weight matrix");
            let weights = interpolator.weights_for(source, output)?;
            Ok(WeightMatrix::from_weights(columns, &weights)?.to_bytes())
        })?;
        let matrix = Arc::new(WeightMatrix::from_bytes(rows, columns, &bytes)?);
        debug!(key = %key, non_zeros = matrix.non_zeros(), "Loaded weight matrix");

        let mut matrices = self
            .matrices
            .lock()
            .map_err(|_| RegridError::resource_unavailable("weight cache lock poisoned"))?;
        matrices.put(key, matrix.clone());
        Ok(matrix)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.matrices.lock().map(|m| m.len()).unwrap_or(0),
        }
    }

    /// Forget the in-process matrices; published segments stay.
    pub fn clear(&self) {
        if let Ok(mut m) = self.matrices.lock() {
            m.clear();
        }
    }
}

impl std::fmt::Debug for WeightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightCache")
            .field("backend", &self.backend.name())
            .field("stats", &self.stats())
            .finish()
    }
}
