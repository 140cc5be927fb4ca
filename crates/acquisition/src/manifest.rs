//! Scene manifest for directory-backed sources.
//!
//! ```json
//! {
//!   "crs_epsg": 32735,
//!   "scenes": [
//!     {
//!       "id": "S2B_20210603",
//!       "acquired": "2021-06-03",
//!       "bands": { "B2": "20210603/B02.tif", "B11": "20210603/B11.tif" },
//!       "quality": "20210603/cs_cdf.tif"
//!     }
//!   ]
//! }
//! ```
//!
//! Paths are relative to the manifest's directory unless absolute.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use burnscan_core::SpectralBand;

use crate::error::{AcquisitionError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// EPSG code stamped on the delivered grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs_epsg: Option<u32>,
    pub scenes: Vec<SceneEntry>,
}

/// One acquisition: a date plus one single-band GeoTIFF per band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntry {
    pub id: String,
    pub acquired: NaiveDate,
    /// Sentinel-2 band code to file path.
    pub bands: BTreeMap<String, PathBuf>,
    /// Clear-sky score raster (0 = cloud, 1 = clear).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<PathBuf>,
}

impl SceneEntry {
    /// Bands with parsed codes, in storage order.
    pub fn band_paths(&self) -> Result<Vec<(SpectralBand, &Path)>> {
        let mut out = Vec::with_capacity(self.bands.len());
        for (code, path) in &self.bands {
            let band = SpectralBand::from_code(code).ok_or_else(|| {
                AcquisitionError::Manifest(format!("scene {}: unknown band code '{}'", self.id, code))
            })?;
            out.push((band, path.as_path()));
        }
        out.sort_by_key(|(band, _)| *band);
        Ok(out)
    }
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AcquisitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Every scene needs at least one known band; ids must be unique.
    pub fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(AcquisitionError::Manifest("no scenes listed".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for scene in &self.scenes {
            if !seen.insert(scene.id.as_str()) {
                return Err(AcquisitionError::Manifest(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            if scene.band_paths()?.is_empty() {
                return Err(AcquisitionError::Manifest(format!(
                    "scene {} lists no bands",
                    scene.id
                )));
            }
        }
        Ok(())
    }

    /// Scenes sorted by acquisition date; manifest order breaks ties.
    pub fn ordered_scenes(&self) -> Vec<&SceneEntry> {
        let mut scenes: Vec<&SceneEntry> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.acquired);
        scenes
    }
}
