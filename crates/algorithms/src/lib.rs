//! # Burnscan Algorithms
//!
//! Burn detection over a time series of multispectral observations.
//!
//! ## Modules
//!
//! - **imagery**: Spectral indices (MIRBI, NBR2, NBI, ...) and change detection
//! - **fire**: Index stacks, scan windows, dual compositing, earliest burn date, tiled driver
//! - **landscape**: Connected patches and the minimum-patch sieve
//! - **statistics**: Years since fire, season frequency, burned area

pub(crate) mod maybe_rayon;

pub mod fire;
pub mod imagery;
pub mod landscape;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::fire::{
        burn_date, scan_year_tiled, scan_years, BurnDate, BurnDateInput, BurnDateParams,
        EventRaster, EventTag, EventTagPolicy, ScanParams, ScanWindow, TilingParams,
        YearOutcome, YearRange, EVENT_NODATA,
    };
    pub use crate::imagery::{burn_change, mirbi, nbr2, BurnChangeParams, MirbiParams};
    pub use crate::landscape::{sieve_events, Connectivity, PatchParams};
    pub use crate::statistics::{BurnHistory, BurnedArea, PixelArea, SeasonFrequency};
    pub use burnscan_core::prelude::*;
}
