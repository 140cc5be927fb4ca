//! Dated multispectral observations
//!
//! An [`Observation`] is one acquisition over the processing grid: six
//! surface-reflectance bands on the Sentinel-2 integer scale (0–10000) plus an
//! optional clear-sky quality score per pixel. Observations are immutable once
//! handed to the burn-date engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::raster::Raster;

/// Spectral bands consumed by the burn indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralBand {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl SpectralBand {
    /// All bands in storage order.
    pub const ALL: [SpectralBand; 6] = [
        SpectralBand::Blue,
        SpectralBand::Green,
        SpectralBand::Red,
        SpectralBand::Nir,
        SpectralBand::Swir1,
        SpectralBand::Swir2,
    ];

    /// Position in [`SpectralBand::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Sentinel-2 MSI band code.
    pub fn sentinel2_code(self) -> &'static str {
        match self {
            SpectralBand::Blue => "B2",
            SpectralBand::Green => "B3",
            SpectralBand::Red => "B4",
            SpectralBand::Nir => "B8",
            SpectralBand::Swir1 => "B11",
            SpectralBand::Swir2 => "B12",
        }
    }

    /// Parse a Sentinel-2 band code (`B2`, `B02`, `b11`, ...) or a band name.
    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        let normalized = match upper.strip_prefix("B0") {
            Some(rest) => format!("B{}", rest),
            None => upper,
        };
        match normalized.as_str() {
            "B2" | "BLUE" => Some(SpectralBand::Blue),
            "B3" | "GREEN" => Some(SpectralBand::Green),
            "B4" | "RED" => Some(SpectralBand::Red),
            "B8" | "NIR" => Some(SpectralBand::Nir),
            "B11" | "SWIR1" => Some(SpectralBand::Swir1),
            "B12" | "SWIR2" => Some(SpectralBand::Swir2),
            _ => None,
        }
    }
}

impl fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sentinel2_code())
    }
}

/// One time-stamped multispectral sample of the grid.
#[derive(Debug, Clone)]
pub struct Observation {
    acquired: NaiveDate,
    bands: [Option<Raster<f64>>; 6],
    quality: Option<Raster<f64>>,
}

impl Observation {
    /// Create an observation with no bands attached yet.
    pub fn new(acquired: NaiveDate) -> Self {
        Self {
            acquired,
            bands: Default::default(),
            quality: None,
        }
    }

    /// Attach a band, checking it matches the shape of bands already present.
    pub fn with_band(mut self, band: SpectralBand, raster: Raster<f64>) -> Result<Self> {
        if let Some(existing) = self.bands.iter().flatten().next() {
            existing.ensure_same_shape(&raster)?;
        }
        self.bands[band.index()] = Some(raster);
        Ok(self)
    }

    /// Attach the per-pixel clear-sky quality score (0 = cloud, 1 = clear).
    pub fn with_quality(mut self, quality: Raster<f64>) -> Result<Self> {
        if let Some(existing) = self.bands.iter().flatten().next() {
            existing.ensure_same_shape(&quality)?;
        }
        self.quality = Some(quality);
        Ok(self)
    }

    /// Acquisition date.
    pub fn acquired(&self) -> NaiveDate {
        self.acquired
    }

    /// Band raster, if the source delivered it.
    pub fn band(&self, band: SpectralBand) -> Option<&Raster<f64>> {
        self.bands[band.index()].as_ref()
    }

    /// Quality raster, if present.
    pub fn quality(&self) -> Option<&Raster<f64>> {
        self.quality.as_ref()
    }

    /// Any present band; used as the georeferencing template.
    pub fn template(&self) -> Result<&Raster<f64>> {
        self.bands
            .iter()
            .flatten()
            .next()
            .ok_or_else(|| Error::Algorithm(format!("observation {} carries no bands", self.acquired)))
    }

    /// Grid shape as (rows, cols).
    pub fn shape(&self) -> Result<(usize, usize)> {
        Ok(self.template()?.shape())
    }

    /// Whether the pixel carries usable data: at least one band is present and
    /// every present band is finite there.
    pub fn is_valid_at(&self, row: usize, col: usize) -> bool {
        let mut any = false;
        for raster in self.bands.iter().flatten() {
            match raster.get(row, col) {
                Ok(v) if v.is_finite() => any = true,
                _ => return false,
            }
        }
        any
    }

    /// Mask every band where the quality score is below `clear_threshold`.
    ///
    /// Observations without a quality raster are left untouched.
    pub fn mask_clouds(&mut self, clear_threshold: f64) -> usize {
        let Some(quality) = self.quality.as_ref() else {
            return 0;
        };

        let cloudy: Vec<(usize, usize)> = quality
            .data()
            .indexed_iter()
            .filter(|(_, q)| !(**q >= clear_threshold))
            .map(|(idx, _)| idx)
            .collect();

        for raster in self.bands.iter_mut().flatten() {
            let data = raster.data_mut();
            for &idx in &cloudy {
                data[idx] = f64::NAN;
            }
        }
        cloudy.len()
    }

    /// Crop every band (and the quality raster) to a pixel window.
    pub fn window(&self, row_off: usize, col_off: usize, rows: usize, cols: usize) -> Result<Self> {
        let mut out = Observation::new(self.acquired);
        for (slot, band) in out.bands.iter_mut().zip(self.bands.iter()) {
            if let Some(raster) = band {
                *slot = Some(raster.window(row_off, col_off, rows, cols)?);
            }
        }
        if let Some(q) = &self.quality {
            out.quality = Some(q.window(row_off, col_off, rows, cols)?);
        }
        Ok(out)
    }
}
