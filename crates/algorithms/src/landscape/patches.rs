//! Connected patches of burned pixels
//!
//! The sieve is the only neighbour-aware step of the pipeline. It runs once
//! on a fully assembled event raster, never per tile or per window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use burnscan_core::{Error, Raster, Result};

use crate::fire::EventRaster;

/// Pixel adjacency used when growing patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and corner neighbours
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1), (-1, 0), (-1, 1),
            (0, -1), (0, 1),
            (1, -1), (1, 0), (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Parameters for the minimum-patch sieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchParams {
    /// Patches with fewer pixels are cleared. `None` disables the sieve.
    pub min_size_pixels: Option<usize>,
    pub connectivity: Connectivity,
}

impl PatchParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_size_pixels == Some(0) {
            return Err(Error::invalid(
                "patch.min_size_pixels",
                0,
                "must be at least 1; omit it to disable the filter",
            ));
        }
        Ok(())
    }
}

/// Patch labels of an event raster
#[derive(Debug, Clone)]
pub struct PatchLabels {
    /// 1-based patch id per pixel, 0 where unset
    pub labels: Raster<i32>,
    /// Pixel count per patch; index `id - 1`
    pub sizes: Vec<usize>,
}

/// Label connected patches of set pixels with an iterative flood fill.
pub fn label_patches(events: &EventRaster, connectivity: Connectivity) -> PatchLabels {
    let doy = events.doy();
    let (rows, cols) = doy.shape();
    let set: Vec<bool> = doy.data().iter().map(|&d| !doy.is_nodata(d)).collect();

    let mut labels = vec![0i32; rows * cols];
    let mut sizes = Vec::new();
    let mut stack = Vec::new();

    for start in 0..rows * cols {
        if !set[start] || labels[start] != 0 {
            continue;
        }

        let id = sizes.len() as i32 + 1;
        let mut size = 0usize;
        labels[start] = id;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            size += 1;
            let (r, c) = ((idx / cols) as isize, (idx % cols) as isize);
            for &(dr, dc) in connectivity.offsets() {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                let n = nr as usize * cols + nc as usize;
                if set[n] && labels[n] == 0 {
                    labels[n] = id;
                    stack.push(n);
                }
            }
        }
        sizes.push(size);
    }

    let mut label_raster = doy.like_as(0i32, Some(0));
    for (slot, &l) in label_raster.data_mut().iter_mut().zip(labels.iter()) {
        *slot = l;
    }

    PatchLabels {
        labels: label_raster,
        sizes,
    }
}

/// Clear every patch smaller than `params.min_size_pixels` in both bands.
///
/// Returns the number of pixels cleared; a disabled sieve clears nothing.
pub fn sieve_events(events: &mut EventRaster, params: &PatchParams) -> Result<usize> {
    params.validate()?;
    let Some(min_size) = params.min_size_pixels else {
        return Ok(0);
    };

    let patches = label_patches(events, params.connectivity);
    let mut cleared = 0;
    for ((row, col), &id) in patches.labels.data().indexed_iter() {
        if id > 0 && patches.sizes[(id - 1) as usize] < min_size {
            events.clear(row, col)?;
            cleared += 1;
        }
    }

    debug!(
        "sieve: {} of {} patch(es) below {} px, {} pixel(s) cleared",
        patches.sizes.iter().filter(|&&s| s < min_size).count(),
        patches.sizes.len(),
        min_size,
        cleared
    );
    Ok(cleared)
}
