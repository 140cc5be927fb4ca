//! Spectral burn and vegetation indices
//!
//! Indices computed from Sentinel-2 surface reflectance on its integer scale
//! (0–10000). All indices operate on single-band rasters (one band per raster)
//! and write NaN wherever an input is no-data or a denominator vanishes.

use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use burnscan_core::raster::Raster;
use burnscan_core::{Error, Result};

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in the range [-1, 1] for non-negative inputs. Pixels where the
/// bands sum to zero or either is nodata are set to NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    ratio_of(band_a, band_b, band_b, band_a, |a, b, _, _| (a - b, a + b))
}

// ---------------------------------------------------------------------------
// NBR
// ---------------------------------------------------------------------------

/// Normalized Burn Ratio
///
/// `NBR = (NIR - SWIR1) / (NIR + SWIR1)`
///
/// Drops sharply after fire as NIR falls and SWIR rises.
pub fn nbr(nir: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, swir1)
}

/// Normalized Burn Ratio 2
///
/// `NBR2 = (SWIR1 - SWIR2) / (SWIR1 + SWIR2)`
///
/// Sensitive to post-fire moisture loss; less affected by vegetation regrowth
/// than NBR.
pub fn nbr2(swir1: &Raster<f64>, swir2: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, swir2)
}

// ---------------------------------------------------------------------------
// MIRBI
// ---------------------------------------------------------------------------

/// Parameters for MIRBI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirbiParams {
    /// Values below this are physically implausible and masked.
    /// Default: -15000
    pub floor: f64,
}

impl Default for MirbiParams {
    fn default() -> Self {
        Self { floor: -15_000.0 }
    }
}

/// Mid-Infrared Burn Index (Trigg & Flasse, 2001)
///
/// `MIRBI = 10 * SWIR2 - 9.8 * SWIR1 + 2`
///
/// Rises strongly over fresh char. Results below `params.floor` are masked.
pub fn mirbi(swir1: &Raster<f64>, swir2: &Raster<f64>, params: MirbiParams) -> Result<Raster<f64>> {
    check_dimensions(swir1, swir2)?;

    let (rows, cols) = swir1.shape();
    let nodata_s1 = swir1.nodata();
    let nodata_s2 = swir2.nodata();
    let floor = params.floor;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let s1 = unsafe { swir1.get_unchecked(row, col) };
                let s2 = unsafe { swir2.get_unchecked(row, col) };

                if is_nodata_f64(s1, nodata_s1) || is_nodata_f64(s2, nodata_s2) {
                    continue;
                }

                let value = 10.0 * s2 - 9.8 * s1 + 2.0;
                if value >= floor {
                    row_data[col] = value;
                }
            }
            row_data
        })
        .collect();

    swir1.with_data(data, Some(f64::NAN))
}

// ---------------------------------------------------------------------------
// NBI
// ---------------------------------------------------------------------------

/// Burn brightness / moisture index
///
/// `NBI = (SWIR2 - Blue) / (SWIR1 + Blue)`
pub fn nbi(swir1: &Raster<f64>, swir2: &Raster<f64>, blue: &Raster<f64>) -> Result<Raster<f64>> {
    ratio_of(swir2, blue, swir1, blue, |s2, b, s1, _| (s2 - b, s1 + b))
}

// ---------------------------------------------------------------------------
// Vegetation
// ---------------------------------------------------------------------------

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Green Normalized Difference Vegetation Index
///
/// `GNDVI = (NIR - Green) / (NIR + Green)`
pub fn gndvi(nir: &Raster<f64>, green: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, green)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Per-pixel `num / den` from up to four input bands, where `f` returns the
/// (numerator, denominator) pair.
fn ratio_of<F>(
    a: &Raster<f64>,
    b: &Raster<f64>,
    c: &Raster<f64>,
    d: &Raster<f64>,
    f: F,
) -> Result<Raster<f64>>
where
    F: Fn(f64, f64, f64, f64) -> (f64, f64) + Sync + Send,
{
    check_dimensions(a, b)?;
    check_dimensions(a, c)?;
    check_dimensions(a, d)?;

    let (rows, cols) = a.shape();
    let nodata = [a.nodata(), b.nodata(), c.nodata(), d.nodata()];

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let v = unsafe {
                    [
                        a.get_unchecked(row, col),
                        b.get_unchecked(row, col),
                        c.get_unchecked(row, col),
                        d.get_unchecked(row, col),
                    ]
                };

                if v.iter().zip(nodata.iter()).any(|(&x, &nd)| is_nodata_f64(x, nd)) {
                    continue;
                }

                let (num, den) = f(v[0], v[1], v[2], v[3]);
                if den.abs() < 1e-10 {
                    continue; // Avoid division by zero
                }

                row_data[col] = num / den;
            }
            row_data
        })
        .collect();

    a.with_data(data, Some(f64::NAN))
}

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
