//! LRU cache of decoded band rasters.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burnscan_core::Raster;

/// LRU cache storing full-grid band rasters keyed by file path.
///
/// Tiles of the same scene share one decode.
pub struct BandCache {
    inner: LruCache<PathBuf, Arc<Raster<f64>>>,
}

impl BandCache {
    /// Create a new cache with the given capacity (number of rasters).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    /// Get a cached raster, if present.
    pub fn get(&mut self, path: &Path) -> Option<Arc<Raster<f64>>> {
        self.inner.get(path).cloned()
    }

    /// Insert a raster into the cache.
    pub fn insert(&mut self, path: PathBuf, raster: Arc<Raster<f64>>) {
        self.inner.put(path, raster);
    }

    /// Number of rasters currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop all cached rasters.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
