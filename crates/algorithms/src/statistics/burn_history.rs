//! Cross-year burn history
//!
//! Read-only reductions over a stack of finished per-year event rasters:
//! years since the last fire, early/late season frequency and burned area per
//! year. Nothing here mutates a year's raster.

use serde::{Deserialize, Serialize};

use burnscan_core::{Error, Raster, Result};

use crate::fire::{EventRaster, EVENT_NODATA};

/// Day of year separating early-season (below) from late-season fires.
pub const DEFAULT_SEASON_CUTOFF: i32 = 214;

/// Mean earth radius (m) for cell areas on geographic grids.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// How to weight a pixel when summing area
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelArea {
    /// From the raster's geotransform: `|pixel_width * pixel_height|` on
    /// projected grids, a spherical cell area per row on geographic grids.
    FromGrid,
    /// Fixed area in square metres.
    Fixed(f64),
}

impl PixelArea {
    /// Cell area in m² for each row of `raster`.
    pub fn row_areas<T: burnscan_core::RasterElement>(&self, raster: &Raster<T>) -> Vec<f64> {
        let rows = raster.rows();
        match *self {
            PixelArea::Fixed(a) => vec![a; rows],
            PixelArea::FromGrid => {
                let gt = raster.transform();
                let geographic = raster.crs().map_or(false, |c| c.is_geographic());
                if !geographic {
                    return vec![gt.cell_area(); rows];
                }
                let dlon = gt.pixel_width.abs().to_radians();
                (0..rows)
                    .map(|r| {
                        let lat_a = (gt.origin_y + r as f64 * gt.pixel_height).to_radians();
                        let lat_b = (gt.origin_y + (r + 1) as f64 * gt.pixel_height).to_radians();
                        EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * (lat_a.sin() - lat_b.sin()).abs()
                    })
                    .collect()
            }
        }
    }
}

/// Per-pixel season counts across the stack
#[derive(Debug, Clone)]
pub struct SeasonFrequency {
    /// Years burned before the cutoff
    pub early: Raster<i32>,
    /// Years burned on or after the cutoff
    pub late: Raster<i32>,
    /// Years with no burn
    pub unburned: Raster<i32>,
}

/// Burned area of one year, split by season
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnedArea {
    pub year: i32,
    pub early_m2: f64,
    pub late_m2: f64,
    pub total_m2: f64,
}

impl BurnedArea {
    pub fn early_ha(&self) -> f64 {
        hectares(self.early_m2)
    }

    pub fn late_ha(&self) -> f64 {
        hectares(self.late_m2)
    }

    pub fn total_ha(&self) -> f64 {
        hectares(self.total_m2)
    }
}

/// Square metres to hectares.
pub fn hectares(m2: f64) -> f64 {
    m2 / 10_000.0
}

fn check_stack(stack: &[EventRaster]) -> Result<&EventRaster> {
    let first = stack
        .first()
        .ok_or_else(|| Error::Algorithm("burn history needs at least one year".into()))?;
    for ev in &stack[1..] {
        first.doy().ensure_same_shape(ev.doy())?;
    }
    Ok(first)
}

/// `current_year - latest burn year` per pixel; no-data where never burned.
pub fn years_since_fire(stack: &[EventRaster], current_year: i32) -> Result<Raster<i32>> {
    let first = check_stack(stack)?;
    let mut out = first.doy().like_as(EVENT_NODATA, Some(EVENT_NODATA));

    for ev in stack {
        let years = ev.year().data();
        for (slot, &y) in out.data_mut().iter_mut().zip(years.iter()) {
            if y == EVENT_NODATA {
                continue;
            }
            let since = current_year - y;
            if *slot == EVENT_NODATA || since < *slot {
                *slot = since;
            }
        }
    }
    Ok(out)
}

/// Early/late/unburned year counts per pixel.
pub fn season_frequency(stack: &[EventRaster], cutoff: i32) -> Result<SeasonFrequency> {
    let first = check_stack(stack)?;
    let mut early = first.doy().like_as(0i32, None);
    let mut late = first.doy().like_as(0i32, None);
    let mut unburned = first.doy().like_as(0i32, None);

    for ev in stack {
        let cells = early
            .data_mut()
            .iter_mut()
            .zip(late.data_mut().iter_mut())
            .zip(unburned.data_mut().iter_mut())
            .zip(ev.doy().data().iter());
        for (((e, l), u), &doy) in cells {
            if doy == EVENT_NODATA {
                *u += 1;
            } else if doy < cutoff {
                *e += 1;
            } else {
                *l += 1;
            }
        }
    }

    Ok(SeasonFrequency { early, late, unburned })
}

/// Area-weighted burned totals of one year.
///
/// Only pixels with DOY ≥ 1 count; early is DOY below `cutoff`, late is DOY
/// at or above it, so `early + late == total`.
pub fn burned_area(event: &EventRaster, cutoff: i32, pixel_area: PixelArea) -> Result<BurnedArea> {
    let doy = event.doy();
    let row_areas = pixel_area.row_areas(doy);

    let (mut early, mut late) = (0.0, 0.0);
    for ((row, _), &d) in doy.data().indexed_iter() {
        if d == EVENT_NODATA || d < 1 {
            continue;
        }
        if d < cutoff {
            early += row_areas[row];
        } else {
            late += row_areas[row];
        }
    }

    Ok(BurnedArea {
        year: event.scan_year(),
        early_m2: early,
        late_m2: late,
        total_m2: early + late,
    })
}

/// Read-only view over finished per-year event rasters
#[derive(Debug, Clone)]
pub struct BurnHistory {
    stack: Vec<EventRaster>,
}

impl BurnHistory {
    /// Stack must be non-empty and share one grid; it is ordered by scan year.
    pub fn new(mut stack: Vec<EventRaster>) -> Result<Self> {
        check_stack(&stack)?;
        stack.sort_by_key(|ev| ev.scan_year());
        Ok(Self { stack })
    }

    pub fn years(&self) -> Vec<i32> {
        self.stack.iter().map(|ev| ev.scan_year()).collect()
    }

    pub fn events(&self) -> &[EventRaster] {
        &self.stack
    }

    pub fn years_since_fire(&self, current_year: i32) -> Result<Raster<i32>> {
        years_since_fire(&self.stack, current_year)
    }

    pub fn season_frequency(&self, cutoff: i32) -> Result<SeasonFrequency> {
        season_frequency(&self.stack, cutoff)
    }

    pub fn burned_area(&self, cutoff: i32, pixel_area: PixelArea) -> Result<Vec<BurnedArea>> {
        self.stack
            .iter()
            .map(|ev| burned_area(ev, cutoff, pixel_area))
            .collect()
    }
}
