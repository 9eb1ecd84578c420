//! Keyed blob caches shared between threads and processes.
//!
//! A [`KeyedBlobCache`] hands out the bytes stored under a key, building
//! and publishing them on first use. Two file-backed implementations exist:
//! [`MappedFileCache`] (plain files in a cache directory) and
//! [`SharedSegmentCache`] (named segments, under `/dev/shm` when present).
//! Decoded values are kept per process in a [`ProcessCache`].

mod codec;
mod file_store;
mod process;

pub use codec::{decode_legendre, decode_triplets, encode_legendre, encode_triplets, Triplet};
pub use file_store::{MappedFileCache, SharedSegmentCache};
pub use process::ProcessCache;

use std::sync::Arc;

use regrid_common::Result;

/// Builder invoked on a cache miss.
pub type BlobBuilder<'a> = &'a dyn Fn() -> Result<Vec<u8>>;

/// Atomic get-or-create over a keyed byte store.
///
/// The first caller to publish a key wins; every later caller, in this or
/// another process, reads the published bytes. A caller that finds a
/// publication in progress builds its own copy rather than wait.
pub trait KeyedBlobCache: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Bytes stored under `key`, running `build` if none are published.
    fn get_or_create(&self, key: &str, build: BlobBuilder<'_>) -> Result<Arc<Vec<u8>>>;

    /// Drop any published bytes for `key`.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
