//! Earliest burn date for one year over one block of pixels.
//!
//! For every scan window the before/after composites are compared; pixels
//! whose brightness jump crosses the threshold become candidates tagged with
//! a date, and the year's event raster keeps the earliest candidate per pixel.
//! Windows are evaluated in parallel batches and folded in anchor order; the
//! fold is a per-pixel minimum, so the batch size never changes the result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;
use burnscan_core::{Algorithm, Error, Observation, Raster, Result};

use super::composite::{dual_composite, Composite};
use super::derive::{date_from_offset, derive_indices, DeriveParams, IndexBand, IndexStack};
use super::event::{EventRaster, EventTag};
use super::schedule::{acquisition_span, scan_windows, ScanParams, ScanWindow, YearRange};
use crate::imagery::{burn_change, BurnChange, BurnChangeParams, MASK_CHANGED};
use crate::landscape::{sieve_events, PatchParams};

/// Which date a detected window reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTagPolicy {
    /// The window's anchor date.
    #[default]
    Anchor,
    /// Acquisition date of the after-side observation at that pixel, i.e.
    /// the first image in which the scar is visible.
    AfterObservation,
}

/// Parameters for the burn-date scan
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnDateParams {
    pub scan: ScanParams,
    pub derive: DeriveParams,
    pub change: BurnChangeParams,
    pub tag_policy: EventTagPolicy,
    /// Minimum-patch post-filter; disabled by default.
    pub patch: PatchParams,
}

impl BurnDateParams {
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        self.derive.validate()?;
        self.change.validate()?;
        self.patch.validate()
    }
}

/// Outcome of one scan window.
#[derive(Debug, Clone)]
pub struct WindowDetection {
    pub window: ScanWindow,
    pub change: BurnChange,
    /// Changed pixels tagged per the tag policy; everything else unset.
    /// Tags outside the scanned range are never set.
    pub candidates: EventRaster,
}

/// Derive index stacks for the observations a year's windows can use.
///
/// Sequence numbers follow the slice order.
pub fn derive_year(observations: &[Observation], range: &YearRange, params: &BurnDateParams) -> Result<Vec<IndexStack>> {
    let (from, to) = acquisition_span(range, &params.scan)?;
    observations
        .iter()
        .enumerate()
        .filter(|(_, o)| o.acquired() >= from && o.acquired() <= to)
        .map(|(seq, o)| derive_indices(o, range.year(), seq, &params.derive))
        .collect()
}

/// Evaluate one window.
///
/// Only tags dated inside `range` become candidates; a window anchored in the
/// buffer around the year can still report an in-range after-observation.
pub fn detect_window(
    template: &Raster<f64>,
    stacks: &[IndexStack],
    window: &ScanWindow,
    range: &YearRange,
    params: &BurnDateParams,
) -> Result<WindowDetection> {
    let (before, after) = dual_composite(template, stacks, window)?;
    let change = burn_change(
        before.band(IndexBand::Nbr2),
        after.band(IndexBand::Nbr2),
        before.band(IndexBand::Mirbi),
        after.band(IndexBand::Mirbi),
        &params.change,
    )?;

    let mut candidates = EventRaster::unset(range.year(), template);
    match params.tag_policy {
        EventTagPolicy::Anchor => {
            if range.contains(window.anchor) {
                candidates.absorb(&change.mask, window.tag())?;
            }
        }
        EventTagPolicy::AfterObservation => {
            tag_after_observation(&mut candidates, &change, &after, range)?;
        }
    }

    Ok(WindowDetection {
        window: *window,
        change,
        candidates,
    })
}

fn tag_after_observation(
    candidates: &mut EventRaster,
    change: &BurnChange,
    after: &Composite,
    range: &YearRange,
) -> Result<()> {
    let offsets = after.band(IndexBand::Doy);
    for ((row, col), &m) in change.mask.data().indexed_iter() {
        if m != MASK_CHANGED {
            continue;
        }
        let offset = offsets.get(row, col)?;
        if offset.is_nan() {
            continue;
        }
        let date = date_from_offset(offset as i64, range.year())
            .ok_or_else(|| Error::Algorithm(format!("day offset {} out of range", offset)))?;
        if range.contains(date) {
            candidates.offer(row, col, EventTag::from_date(date))?;
        }
    }
    Ok(())
}

/// Earliest burn per pixel over pre-derived stacks, without the patch filter.
///
/// `template` fixes the grid of the output.
pub fn scan_stacks(
    template: &Raster<f64>,
    stacks: &[IndexStack],
    range: &YearRange,
    params: &BurnDateParams,
) -> Result<EventRaster> {
    let windows = scan_windows(range, &params.scan)?;
    let mut events = EventRaster::unset(range.year(), template);
    if stacks.is_empty() {
        return Ok(events);
    }

    let batch = (current_num_threads() * 2).max(1);
    let mut detected = 0usize;
    for chunk in windows.chunks(batch) {
        let results: Vec<Result<WindowDetection>> = chunk
            .par_iter()
            .map(|w| detect_window(template, stacks, w, range, params))
            .collect();
        for result in results {
            let detection = result?;
            if detection.change.changed_count() > 0 {
                detected += 1;
            }
            events.merge(&detection.candidates)?;
        }
    }

    debug!(
        "{} of {} window(s) flagged change, {} pixel(s) set",
        detected,
        windows.len(),
        events.set_count()
    );
    Ok(events)
}

/// Earliest burn date per pixel for one year.
///
/// Runs derivation, compositing, change detection and the reduction over the
/// whole block, then the optional patch filter. `template` fixes the grid; it
/// is needed because a block may have no observations at all.
pub fn burn_date(
    template: &Raster<f64>,
    observations: &[Observation],
    range: &YearRange,
    params: &BurnDateParams,
) -> Result<EventRaster> {
    params.validate()?;
    range.validate()?;
    for obs in observations {
        template.ensure_same_shape(obs.template()?)?;
    }

    let stacks = derive_year(observations, range, params)?;
    let mut events = scan_stacks(template, &stacks, range, params)?;
    sieve_events(&mut events, &params.patch)?;
    Ok(events)
}

/// Input to the [`BurnDate`] algorithm
#[derive(Debug, Clone)]
pub struct BurnDateInput {
    /// Output grid
    pub template: Raster<f64>,
    /// Observations in ingestion order
    pub observations: Vec<Observation>,
    pub range: YearRange,
}

/// Earliest burn date detection as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct BurnDate;

impl Algorithm for BurnDate {
    type Input = BurnDateInput;
    type Output = EventRaster;
    type Params = BurnDateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BurnDate"
    }

    fn description(&self) -> &'static str {
        "Earliest per-pixel burn date from a before/after MIRBI scan"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        burn_date(&input.template, &input.observations, &input.range, &params)
    }
}
