//! Imagery analysis algorithms
//!
//! - Spectral indices: NBR, NBR2, MIRBI, NBI, NDVI, GNDVI
//! - Normalized difference: generic two-band index
//! - Burn change detection between composite pairs

mod change_detection;
mod indices;

pub use change_detection::{
    burn_change, BurnChange, BurnChangeParams, ChangeMask, MASK_CHANGED, MASK_NODATA,
    MASK_UNCHANGED, MAX_BRIGHTNESS_THRESHOLD,
};
pub use indices::{gndvi, mirbi, nbi, nbr, nbr2, ndvi, normalized_difference, MirbiParams};
