//! Landscape algorithms over event rasters
//!
//! - **Patches**: connected-component labelling and the minimum-patch sieve

mod patches;

pub use patches::{label_patches, sieve_events, Connectivity, PatchLabels, PatchParams};
