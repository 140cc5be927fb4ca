//! Per-pixel burn-date detection
//!
//! Stages, run once per scanned year:
//! 1. **derive**: index stack (NBR, NBR2, MIRBI, NBI, NDVI, GNDVI, DOY, DOY_INV)
//!    per observation
//! 2. **composite**: before/after quality mosaics for every scan window
//! 3. **scan**: MIRBI change test per window, folded into the earliest event
//!    per pixel
//!
//! [`tiled`] runs the stages over a tiled AOI with retrying acquisition.

pub mod composite;
pub mod derive;
pub mod event;
pub mod scan;
pub mod schedule;
pub mod tiled;

pub use composite::{after_composite, before_composite, dual_composite, quality_mosaic, Composite, NO_SOURCE};
pub use derive::{day_offset, derive_indices, DeriveParams, IndexBand, IndexStack};
pub use event::{EventRaster, EventTag, EVENT_NODATA};
pub use scan::{
    burn_date, derive_year, detect_window, scan_stacks, BurnDate, BurnDateInput, BurnDateParams, EventTagPolicy,
    WindowDetection,
};
pub use schedule::{acquisition_span, scan_windows, AnchorSpan, ScanParams, ScanWindow, YearRange};
pub use tiled::{scan_year_tiled, scan_year_whole, scan_years, TilingParams, YearOutcome};
