//! Burn change detection between a before/after composite pair
//!
//! Two differences are formed per pixel:
//! - `diff_secondary = before.NBR2 - after.NBR2`
//! - `diff_brightness = after.MIRBI - before.MIRBI`
//!
//! Only `diff_brightness` decides the change mask. `diff_secondary` is kept as
//! a diagnostic output.

use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use burnscan_core::raster::Raster;
use burnscan_core::{Error, Result};

/// Mask value for a pixel that changed.
pub const MASK_CHANGED: u8 = 1;
/// Mask value for a pixel with data on both sides but no change.
pub const MASK_UNCHANGED: u8 = 0;
/// Mask value where either composite has no data.
pub const MASK_NODATA: u8 = 255;

/// Per-pixel change flags for one scan window.
pub type ChangeMask = Raster<u8>;

/// Largest magnitude MIRBI differences can reach on the 0–10000 scale.
pub const MAX_BRIGHTNESS_THRESHOLD: f64 = 200_000.0;

/// Parameters for burn change detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnChangeParams {
    /// Signed threshold on `diff_brightness`.
    ///
    /// Non-negative: changed where `diff >= threshold`.
    /// Negative (including `-0.0`): changed where `diff <= threshold`.
    /// Default: 4000
    pub brightness_threshold: f64,
}

impl Default for BurnChangeParams {
    fn default() -> Self {
        Self {
            brightness_threshold: 4000.0,
        }
    }
}

impl BurnChangeParams {
    pub fn validate(&self) -> Result<()> {
        let t = self.brightness_threshold;
        if !t.is_finite() || t.abs() > MAX_BRIGHTNESS_THRESHOLD {
            return Err(Error::invalid(
                "scan.brightness_threshold",
                t,
                format!("must be finite with magnitude at most {}", MAX_BRIGHTNESS_THRESHOLD),
            ));
        }
        Ok(())
    }

    /// Whether a brightness difference counts as a burn.
    #[inline]
    pub fn exceeds(&self, diff: f64) -> bool {
        let t = self.brightness_threshold;
        if t.is_sign_negative() {
            diff <= t
        } else {
            diff >= t
        }
    }
}

/// Output of [`burn_change`]
#[derive(Debug, Clone)]
pub struct BurnChange {
    pub diff_secondary: Raster<f64>,
    pub diff_brightness: Raster<f64>,
    pub mask: ChangeMask,
}

impl BurnChange {
    /// Number of pixels flagged as changed.
    pub fn changed_count(&self) -> usize {
        self.mask.data().iter().filter(|&&m| m == MASK_CHANGED).count()
    }
}

/// Compare a before/after composite pair.
///
/// # Arguments
/// * `before_nbr2`, `after_nbr2` - Secondary burn ratio on each side
/// * `before_mirbi`, `after_mirbi` - Brightness index on each side
/// * `params` - Threshold parameters
pub fn burn_change(
    before_nbr2: &Raster<f64>,
    after_nbr2: &Raster<f64>,
    before_mirbi: &Raster<f64>,
    after_mirbi: &Raster<f64>,
    params: &BurnChangeParams,
) -> Result<BurnChange> {
    let (rows, cols) = before_mirbi.shape();
    for (name, r) in [
        ("before_nbr2", before_nbr2),
        ("after_nbr2", after_nbr2),
        ("after_mirbi", after_mirbi),
    ] {
        if r.shape() != (rows, cols) {
            return Err(Error::Algorithm(format!(
                "{} dimensions {}x{} don't match {}x{}",
                name,
                r.rows(),
                r.cols(),
                rows,
                cols
            )));
        }
    }

    let cells: Vec<(f64, f64, u8)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let (nb, na, mb, ma) = unsafe {
                    (
                        before_nbr2.get_unchecked(row, col),
                        after_nbr2.get_unchecked(row, col),
                        before_mirbi.get_unchecked(row, col),
                        after_mirbi.get_unchecked(row, col),
                    )
                };

                let secondary = if nb.is_nan() || na.is_nan() { f64::NAN } else { nb - na };

                if mb.is_nan() || ma.is_nan() {
                    out.push((secondary, f64::NAN, MASK_NODATA));
                    continue;
                }

                let brightness = ma - mb;
                let flag = if params.exceeds(brightness) {
                    MASK_CHANGED
                } else {
                    MASK_UNCHANGED
                };
                out.push((secondary, brightness, flag));
            }
            out
        })
        .collect();

    let mut secondary = Vec::with_capacity(cells.len());
    let mut brightness = Vec::with_capacity(cells.len());
    let mut mask = Vec::with_capacity(cells.len());
    for (s, b, m) in cells {
        secondary.push(s);
        brightness.push(b);
        mask.push(m);
    }

    Ok(BurnChange {
        diff_secondary: before_mirbi.with_data(secondary, Some(f64::NAN))?,
        diff_brightness: before_mirbi.with_data(brightness, Some(f64::NAN))?,
        mask: before_mirbi.with_data(mask, Some(MASK_NODATA))?,
    })
}
