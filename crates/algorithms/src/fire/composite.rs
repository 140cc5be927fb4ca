//! Windowed dual compositing
//!
//! A composite takes, independently per pixel, every band of the one index
//! stack whose selection band is largest there. Selecting on `DOY` gives the
//! latest observation (the "before" side); selecting on `DOY_INV` gives the
//! earliest (the "after" side).
//!
//! Ties on the selection key go to the stack ingested first. Pixels with no
//! eligible stack stay NaN in every band.

use crate::maybe_rayon::*;
use burnscan_core::{Raster, Result};

use super::derive::{IndexBand, IndexStack};
use super::schedule::ScanWindow;

/// No-data value of [`Composite::source`].
pub const NO_SOURCE: i32 = -1;

/// Per-pixel selection of index stack values.
#[derive(Debug, Clone)]
pub struct Composite {
    bands: Vec<Raster<f64>>,
    source: Raster<i32>,
}

impl Composite {
    pub fn band(&self, band: IndexBand) -> &Raster<f64> {
        &self.bands[band.index()]
    }

    /// Ingestion sequence of the stack each pixel came from, or [`NO_SOURCE`].
    pub fn source(&self) -> &Raster<i32> {
        &self.source
    }

    /// Number of pixels that found a stack.
    pub fn filled_count(&self) -> usize {
        self.source.data().iter().filter(|&&s| s != NO_SOURCE).count()
    }
}

/// Per-pixel argmax over `candidates` of the `key` band.
///
/// `template` fixes the output grid; every candidate must share its shape.
pub fn quality_mosaic(
    template: &Raster<f64>,
    candidates: &[&IndexStack],
    key: IndexBand,
) -> Result<Composite> {
    let (rows, cols) = template.shape();
    for stack in candidates {
        template.ensure_same_shape(stack.band(key))?;
    }

    // Ingestion order, so the first maximum seen is the tie winner.
    let mut ordered: Vec<&IndexStack> = candidates.to_vec();
    ordered.sort_by_key(|s| s.sequence());

    let choice: Vec<Option<usize>> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_choice = vec![None; cols];
            for (col, slot) in row_choice.iter_mut().enumerate() {
                let mut best: Option<(usize, f64)> = None;
                for (i, stack) in ordered.iter().enumerate() {
                    let k = unsafe { stack.band(key).get_unchecked(row, col) };
                    if k.is_nan() {
                        continue;
                    }
                    if best.map_or(true, |(_, bk)| k > bk) {
                        best = Some((i, k));
                    }
                }
                *slot = best.map(|(i, _)| i);
            }
            row_choice
        })
        .collect();

    let mut bands = Vec::with_capacity(IndexBand::ALL.len());
    for band in IndexBand::ALL {
        let data: Vec<f64> = choice
            .iter()
            .enumerate()
            .map(|(idx, c)| match c {
                Some(i) => unsafe { ordered[*i].band(band).get_unchecked(idx / cols, idx % cols) },
                None => f64::NAN,
            })
            .collect();
        bands.push(template.with_data(data, Some(f64::NAN))?);
    }

    let source: Vec<i32> = choice
        .iter()
        .map(|c| c.map_or(NO_SOURCE, |i| ordered[i].sequence() as i32))
        .collect();

    Ok(Composite {
        bands,
        source: template.with_data(source, Some(NO_SOURCE))?,
    })
}

/// Before composite: latest observation in `[before_start, anchor)`.
pub fn before_composite(template: &Raster<f64>, stacks: &[IndexStack], window: &ScanWindow) -> Result<Composite> {
    let candidates: Vec<&IndexStack> = stacks.iter().filter(|s| window.in_before(s.acquired())).collect();
    quality_mosaic(template, &candidates, IndexBand::Doy)
}

/// After composite: earliest observation in `[anchor, after_end]`.
pub fn after_composite(template: &Raster<f64>, stacks: &[IndexStack], window: &ScanWindow) -> Result<Composite> {
    let candidates: Vec<&IndexStack> = stacks.iter().filter(|s| window.in_after(s.acquired())).collect();
    quality_mosaic(template, &candidates, IndexBand::DoyInv)
}

/// Both composites of a window.
pub fn dual_composite(
    template: &Raster<f64>,
    stacks: &[IndexStack],
    window: &ScanWindow,
) -> Result<(Composite, Composite)> {
    Ok((
        before_composite(template, stacks, window)?,
        after_composite(template, stacks, window)?,
    ))
}
