//! Tiled per-year driver
//!
//! The AOI is split into non-overlapping tiles. Each worker fetches its
//! tile's observations (with retry), runs the full per-pixel scan and hands
//! back a finished event slice. Slices are pasted in tile order, then the
//! optional patch sieve runs once over the assembled raster.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use burnscan_acquisition::{fetch_with_retry, AcquisitionRequest, ObservationSource, PixelWindow, RetryPolicy};
use burnscan_core::{Error, Raster, Result};
use burnscan_parallel::{ProcessingMode, Tile, TiledProcessor};

use super::event::EventRaster;
use super::scan::{burn_date, derive_year, scan_stacks, BurnDateParams};
use super::schedule::{acquisition_span, YearRange};
use crate::landscape::sieve_events;

/// Tiling and acquisition settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingParams {
    /// Tile edge in pixels. Default: 256
    pub tile_size: usize,
    /// Worker pool; set from a thread count by the caller.
    #[serde(skip)]
    pub mode: ProcessingMode,
    pub retry: RetryPolicy,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            tile_size: 256,
            mode: ProcessingMode::Parallel,
            retry: RetryPolicy::default(),
        }
    }
}

impl TilingParams {
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(Error::invalid("tiling.tile_size", 0, "must be positive"));
        }
        self.retry.validate()
    }
}

/// One year's result; failures stay with their year.
#[derive(Debug)]
pub struct YearOutcome {
    pub range: YearRange,
    pub result: Result<EventRaster>,
}

impl YearOutcome {
    pub fn year(&self) -> i32 {
        self.range.year()
    }
}

/// Grid-aligned template for a window of the source grid.
fn window_template<S: ObservationSource + ?Sized>(source: &S, window: &PixelWindow) -> Result<Raster<f64>> {
    let grid = source.grid()?;
    if !window.fits(grid.rows, grid.cols) || window.is_empty() {
        return Err(Error::invalid(
            "aoi",
            format!("{:?}", window),
            format!("must be a non-empty window inside the {}x{} source grid", grid.rows, grid.cols),
        ));
    }
    let mut template = Raster::filled(window.rows, window.cols, f64::NAN);
    template.set_nodata(Some(f64::NAN));
    template.set_transform(grid.window_transform(window));
    template.set_crs(grid.crs);
    Ok(template)
}

fn scan_tile<S: ObservationSource + ?Sized>(
    source: &S,
    aoi: &PixelWindow,
    aoi_template: &Raster<f64>,
    tile: &Tile,
    range: &YearRange,
    params: &BurnDateParams,
    tiling: &TilingParams,
) -> Result<EventRaster> {
    let (from, to) = acquisition_span(range, &params.scan)?;
    let window = aoi.sub_window(tile.row_offset, tile.col_offset, tile.rows, tile.cols);
    let request = AcquisitionRequest::new(tile.label(), window, from, to);

    let observations = fetch_with_retry(source, &request, &tiling.retry)?;
    debug!("{} {}: {} observation(s)", range.year(), tile, observations.len());

    let template = aoi_template.window(tile.row_offset, tile.col_offset, tile.rows, tile.cols)?;
    for obs in &observations {
        template.ensure_same_shape(obs.template()?)?;
    }
    let stacks = derive_year(&observations, range, params)?;
    scan_stacks(&template, &stacks, range, params)
}

/// Scan one year over `aoi`, tile by tile.
pub fn scan_year_tiled<S: ObservationSource + ?Sized>(
    source: &S,
    aoi: &PixelWindow,
    range: &YearRange,
    params: &BurnDateParams,
    tiling: &TilingParams,
) -> Result<EventRaster> {
    params.validate()?;
    tiling.validate()?;
    range.validate()?;

    let template = window_template(source, aoi)?;
    let processor = TiledProcessor::new(tiling.tile_size, tiling.mode);
    info!(
        "Scanning {} ({}) over {}x{} pixels in {} tile(s)",
        range.year(),
        range,
        aoi.rows,
        aoi.cols,
        processor.tiles(aoi.rows, aoi.cols).len()
    );

    let slices = processor.try_map(aoi.rows, aoi.cols, |tile| {
        scan_tile(source, aoi, &template, tile, range, params, tiling)
    })?;

    let mut events = EventRaster::unset(range.year(), &template);
    for (tile, slice) in &slices {
        events.paste(slice, tile.row_offset, tile.col_offset)?;
    }

    let cleared = sieve_events(&mut events, &params.patch)?;
    if cleared > 0 {
        debug!("{}: sieve cleared {} pixel(s)", range.year(), cleared);
    }

    info!("{}: {} burned pixel(s)", range.year(), events.set_count());
    Ok(events)
}

/// Scan several years. Configuration is checked for every year before any
/// work starts; after that each year succeeds or fails on its own.
pub fn scan_years<S: ObservationSource + ?Sized>(
    source: &S,
    aoi: &PixelWindow,
    ranges: &[YearRange],
    params: &BurnDateParams,
    tiling: &TilingParams,
) -> Result<Vec<YearOutcome>> {
    params.validate()?;
    tiling.validate()?;
    for range in ranges {
        range.validate()?;
        acquisition_span(range, &params.scan)?;
    }

    let mut outcomes = Vec::with_capacity(ranges.len());
    for range in ranges {
        let result = scan_year_tiled(source, aoi, range, params, tiling);
        if let Err(e) = &result {
            warn!("{}: scan failed: {}", range.year(), e);
        }
        outcomes.push(YearOutcome {
            range: *range,
            result,
        });
    }
    Ok(outcomes)
}

/// Untiled scan of a whole window; used to cross-check the tiled driver.
pub fn scan_year_whole<S: ObservationSource + ?Sized>(
    source: &S,
    aoi: &PixelWindow,
    range: &YearRange,
    params: &BurnDateParams,
    retry: &RetryPolicy,
) -> Result<EventRaster> {
    params.validate()?;
    let template = window_template(source, aoi)?;
    let (from, to) = acquisition_span(range, &params.scan)?;
    let request = AcquisitionRequest::new("whole", *aoi, from, to);
    let observations = fetch_with_retry(source, &request, retry)?;
    burn_date(&template, &observations, range, params)
}
