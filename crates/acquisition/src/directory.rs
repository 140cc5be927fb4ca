//! Observation source backed by a directory of single-band GeoTIFFs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use burnscan_core::io::read_geotiff;
use burnscan_core::{Error, Observation, Raster, CRS};

use crate::cache::BandCache;
use crate::error::{AcquisitionError, Result};
use crate::manifest::{Manifest, SceneEntry};
use crate::request::{AcquisitionRequest, GridSpec};
use crate::source::ObservationSource;

/// Options for [`DirectorySource`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryOptions {
    /// Pixels whose quality score is below this are masked in every band.
    /// `None` leaves scenes unmasked.
    pub clear_threshold: Option<f64>,
    /// Number of decoded band rasters kept in memory.
    pub cache_capacity: usize,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            clear_threshold: Some(0.70),
            cache_capacity: 64,
        }
    }
}

impl DirectoryOptions {
    pub fn validate(&self) -> burnscan_core::Result<()> {
        if let Some(t) = self.clear_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(Error::invalid(
                    "source.clear_threshold",
                    t,
                    "must lie in [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

/// Scenes listed in a JSON manifest, read on demand.
pub struct DirectorySource {
    root: PathBuf,
    manifest: Manifest,
    options: DirectoryOptions,
    grid: GridSpec,
    cache: Mutex<BandCache>,
}

impl DirectorySource {
    /// Open a manifest and probe the grid from its first band file.
    pub fn open(manifest_path: impl AsRef<Path>, options: DirectoryOptions) -> Result<Self> {
        options.validate()?;
        let manifest_path = manifest_path.as_ref();
        let manifest = Manifest::from_path(manifest_path)?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let cache = Mutex::new(BandCache::new(options.cache_capacity));
        let mut source = Self {
            root,
            manifest,
            options,
            grid: GridSpec::new(0, 0, Default::default(), None),
            cache,
        };

        let first = source
            .manifest
            .ordered_scenes()
            .first()
            .and_then(|s| s.band_paths().ok())
            .and_then(|b| b.first().map(|(_, p)| p.to_path_buf()))
            .ok_or_else(|| AcquisitionError::Manifest("no band file to probe".into()))?;
        let probe = source.load(&first)?;

        let crs = source
            .manifest
            .crs_epsg
            .map(CRS::from_epsg)
            .or_else(|| probe.crs().cloned());
        source.grid = GridSpec::new(probe.rows(), probe.cols(), *probe.transform(), crs);

        info!(
            "Opened {} scene(s), grid {}x{}",
            source.manifest.scenes.len(),
            source.grid.rows,
            source.grid.cols
        );
        Ok(source)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn cache(&self) -> MutexGuard<'_, BandCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decode a band file, going through the cache.
    fn load(&self, path: &Path) -> Result<Arc<Raster<f64>>> {
        let full = self.resolve(path);
        if let Some(hit) = self.cache().get(&full) {
            return Ok(hit);
        }

        debug!("decoding {}", full.display());
        let raster: Raster<f64> = read_geotiff(&full).map_err(|e| match e {
            Error::Io(source) => AcquisitionError::Io {
                path: full.clone(),
                source,
            },
            other => AcquisitionError::Core(other),
        })?;

        if self.grid.rows > 0 && raster.shape() != (self.grid.rows, self.grid.cols) {
            return Err(AcquisitionError::Core(Error::SizeMismatch {
                er: self.grid.rows,
                ec: self.grid.cols,
                ar: raster.rows(),
                ac: raster.cols(),
            }));
        }

        let raster = Arc::new(raster);
        self.cache().insert(full, Arc::clone(&raster));
        Ok(raster)
    }

    fn scene_observation(&self, scene: &SceneEntry, request: &AcquisitionRequest) -> Result<Observation> {
        let w = request.window;
        let mut obs = Observation::new(scene.acquired);

        for (band, path) in scene.band_paths()? {
            let full = self.load(path)?;
            let mut block = full.window(w.row_off, w.col_off, w.rows, w.cols)?;
            block.set_crs(self.grid.crs.clone());
            obs = obs.with_band(band, block)?;
        }

        if let Some(path) = &scene.quality {
            let full = self.load(path)?;
            obs = obs.with_quality(full.window(w.row_off, w.col_off, w.rows, w.cols)?)?;
        }

        if let Some(threshold) = self.options.clear_threshold {
            let masked = obs.mask_clouds(threshold);
            if masked > 0 {
                debug!("scene {}: {} cloudy pixel(s) masked", scene.id, masked);
            }
        }

        Ok(obs)
    }
}

impl ObservationSource for DirectorySource {
    fn grid(&self) -> Result<GridSpec> {
        Ok(self.grid.clone())
    }

    fn fetch(&self, request: &AcquisitionRequest) -> Result<Vec<Observation>> {
        let w = request.window;
        if !w.fits(self.grid.rows, self.grid.cols) {
            return Err(AcquisitionError::Core(Error::IndexOutOfBounds {
                row: w.row_off + w.rows,
                col: w.col_off + w.cols,
                rows: self.grid.rows,
                cols: self.grid.cols,
            }));
        }

        self.manifest
            .ordered_scenes()
            .into_iter()
            .filter(|scene| request.covers(scene.acquired))
            .map(|scene| self.scene_observation(scene, request))
            .collect()
    }
}
