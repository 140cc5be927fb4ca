//! Event raster: earliest burn tag per pixel.
//!
//! Every pixel is either unset or holds an [`EventTag`]. The only way to
//! change a set pixel is to offer it an earlier tag, so combining rasters is a
//! per-pixel minimum and the result does not depend on combination order.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use burnscan_core::{Error, Raster, Result};

use crate::imagery::{ChangeMask, MASK_CHANGED};

/// No-data value of both event bands.
pub const EVENT_NODATA: i32 = i32::MIN;

/// Calendar date of a burn, as (year, 0-based day of year).
///
/// Ordered by year, then day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventTag {
    pub year: i32,
    pub doy: i32,
}

impl EventTag {
    pub fn new(year: i32, doy: i32) -> Self {
        Self { year, doy }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            doy: date.ordinal0() as i32,
        }
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_yo_opt(self.year, u32::try_from(self.doy).ok()? + 1)
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:03}", self.year, self.doy)
    }
}

/// `Burn_DOY` and `Burn_Year` bands for one scanned year.
#[derive(Debug, Clone)]
pub struct EventRaster {
    scan_year: i32,
    doy: Raster<i32>,
    year: Raster<i32>,
}

impl EventRaster {
    /// All-unset raster on the grid of `template`.
    pub fn unset<T: burnscan_core::RasterElement>(scan_year: i32, template: &Raster<T>) -> Self {
        Self {
            scan_year,
            doy: template.like_as(EVENT_NODATA, Some(EVENT_NODATA)),
            year: template.like_as(EVENT_NODATA, Some(EVENT_NODATA)),
        }
    }

    /// Rebuild from previously written bands. A pixel counts as set only when
    /// both bands carry data there.
    pub fn from_bands(scan_year: i32, mut doy: Raster<i32>, mut year: Raster<i32>) -> Result<Self> {
        doy.ensure_same_shape(&year)?;
        let doy_nd = doy.nodata();
        let year_nd = year.nodata();
        let normalize = |v: i32, nd: Option<i32>| if nd == Some(v) { EVENT_NODATA } else { v };

        let (d, y) = (doy.data_mut(), year.data_mut());
        ndarray::Zip::from(d).and(y).for_each(|dv, yv| {
            let a = normalize(*dv, doy_nd);
            let b = normalize(*yv, year_nd);
            if a == EVENT_NODATA || b == EVENT_NODATA {
                *dv = EVENT_NODATA;
                *yv = EVENT_NODATA;
            } else {
                *dv = a;
                *yv = b;
            }
        });
        doy.set_nodata(Some(EVENT_NODATA));
        year.set_nodata(Some(EVENT_NODATA));

        Ok(Self { scan_year, doy, year })
    }

    /// Year this raster was scanned for.
    pub fn scan_year(&self) -> i32 {
        self.scan_year
    }

    pub fn shape(&self) -> (usize, usize) {
        self.doy.shape()
    }

    /// `Burn_DOY` band
    pub fn doy(&self) -> &Raster<i32> {
        &self.doy
    }

    /// `Burn_Year` band
    pub fn year(&self) -> &Raster<i32> {
        &self.year
    }

    pub fn into_bands(self) -> (Raster<i32>, Raster<i32>) {
        (self.doy, self.year)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Option<EventTag>> {
        let doy = self.doy.get(row, col)?;
        let year = self.year.get(row, col)?;
        Ok(tag_of(doy, year))
    }

    /// Offer a tag to one pixel; keeps the earlier of the two.
    /// Returns whether the pixel changed.
    pub fn offer(&mut self, row: usize, col: usize, tag: EventTag) -> Result<bool> {
        let current = self.get(row, col)?;
        if current.map_or(true, |c| tag < c) {
            self.doy.set(row, col, tag.doy)?;
            self.year.set(row, col, tag.year)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Clear one pixel.
    pub fn clear(&mut self, row: usize, col: usize) -> Result<()> {
        self.doy.set(row, col, EVENT_NODATA)?;
        self.year.set(row, col, EVENT_NODATA)
    }

    /// Offer `tag` to every changed pixel of `mask`.
    pub fn absorb(&mut self, mask: &ChangeMask, tag: EventTag) -> Result<usize> {
        self.doy.ensure_same_shape(mask)?;
        let mut updated = 0;
        let doy = self.doy.data_mut();
        let year = self.year.data_mut();
        for ((idx, &m), d) in mask.data().indexed_iter().zip(doy.iter_mut()) {
            if m != MASK_CHANGED {
                continue;
            }
            let current = tag_of(*d, year[idx]);
            if current.map_or(true, |c| tag < c) {
                *d = tag.doy;
                year[idx] = tag.year;
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Per-pixel minimum with another raster of the same shape.
    pub fn merge(&mut self, other: &EventRaster) -> Result<usize> {
        self.doy.ensure_same_shape(&other.doy)?;
        let mut updated = 0;
        let (doy, year) = (self.doy.data_mut(), self.year.data_mut());
        ndarray::Zip::from(doy)
            .and(year)
            .and(other.doy.data())
            .and(other.year.data())
            .for_each(|d, y, &od, &oy| {
                if let Some(offered) = tag_of(od, oy) {
                    if tag_of(*d, *y).map_or(true, |c| offered < c) {
                        *d = offered.doy;
                        *y = offered.year;
                        updated += 1;
                    }
                }
            });
        Ok(updated)
    }

    /// Write a tile's raster into this one at the given offset.
    pub fn paste(&mut self, block: &EventRaster, row_off: usize, col_off: usize) -> Result<()> {
        if block.scan_year != self.scan_year {
            return Err(Error::Algorithm(format!(
                "cannot paste {} events into {} raster",
                block.scan_year, self.scan_year
            )));
        }
        self.doy.paste(&block.doy, row_off, col_off)?;
        self.year.paste(&block.year, row_off, col_off)
    }

    /// Whether a pixel holds a tag. Out-of-range pixels are unset.
    pub fn is_set(&self, row: usize, col: usize) -> bool {
        matches!(self.get(row, col), Ok(Some(_)))
    }

    /// Number of set pixels.
    pub fn set_count(&self) -> usize {
        self.doy.data().iter().filter(|&&d| d != EVENT_NODATA).count()
    }

    /// Whether two rasters hold identical tags on the same grid.
    pub fn same_events(&self, other: &EventRaster) -> bool {
        self.scan_year == other.scan_year
            && self.doy.transform() == other.doy.transform()
            && self.doy.data() == other.doy.data()
            && self.year.data() == other.year.data()
    }
}

fn tag_of(doy: i32, year: i32) -> Option<EventTag> {
    if doy == EVENT_NODATA || year == EVENT_NODATA {
        None
    } else {
        Some(EventTag { year, doy })
    }
}
