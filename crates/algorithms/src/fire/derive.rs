//! Index derivation: one observation in, one index stack out.
//!
//! Every observation yields six spectral indices plus two selection bands:
//! `DOY`, the day offset from 1 January of the year being scanned, and
//! `DOY_INV = -DOY`. Offsets are taken against the scan year rather than the
//! observation's own year so the selection key stays monotonic for buffer
//! observations on either side of the year boundary.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use burnscan_core::{Error, Observation, Raster, Result, SpectralBand};

use crate::imagery::{gndvi, mirbi, nbi, nbr, nbr2, ndvi, MirbiParams};

/// Bands of an [`IndexStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexBand {
    Nbr,
    Nbr2,
    Mirbi,
    Nbi,
    Ndvi,
    Gndvi,
    Doy,
    DoyInv,
}

impl IndexBand {
    pub const ALL: [IndexBand; 8] = [
        IndexBand::Nbr,
        IndexBand::Nbr2,
        IndexBand::Mirbi,
        IndexBand::Nbi,
        IndexBand::Ndvi,
        IndexBand::Gndvi,
        IndexBand::Doy,
        IndexBand::DoyInv,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexBand::Nbr => "NBR",
            IndexBand::Nbr2 => "NBR2",
            IndexBand::Mirbi => "MIRBI",
            IndexBand::Nbi => "NBI",
            IndexBand::Ndvi => "NDVI",
            IndexBand::Gndvi => "GNDVI",
            IndexBand::Doy => "DOY",
            IndexBand::DoyInv => "DOY_INV",
        }
    }
}

impl fmt::Display for IndexBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for index derivation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriveParams {
    pub mirbi: MirbiParams,
}

impl DeriveParams {
    pub fn validate(&self) -> Result<()> {
        if !self.mirbi.floor.is_finite() {
            return Err(Error::invalid("scan.mirbi_floor", self.mirbi.floor, "must be finite"));
        }
        Ok(())
    }
}

/// Derived bands of one observation, plus where it came from.
#[derive(Debug, Clone)]
pub struct IndexStack {
    acquired: NaiveDate,
    sequence: usize,
    bands: Vec<Raster<f64>>,
}

impl IndexStack {
    pub fn acquired(&self) -> NaiveDate {
        self.acquired
    }

    /// Ingestion position; lower wins composite ties.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn band(&self, band: IndexBand) -> &Raster<f64> {
        &self.bands[band.index()]
    }

    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }
}

/// Days from 1 January of `reference_year` to `date`.
pub fn day_offset(date: NaiveDate, reference_year: i32) -> i64 {
    match NaiveDate::from_ymd_opt(reference_year, 1, 1) {
        Some(jan1) => (date - jan1).num_days(),
        None => i64::from(date.ordinal0()),
    }
}

/// Date `offset` days after 1 January of `reference_year`.
pub fn date_from_offset(offset: i64, reference_year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(reference_year, 1, 1)?
        .checked_add_signed(chrono::Duration::days(offset))
}

/// Derive the index stack of one observation.
///
/// Indices whose input bands are missing come out all-NaN. The selection
/// bands are NaN wherever the observation has no valid data, which makes the
/// pixel ineligible for compositing.
pub fn derive_indices(
    obs: &Observation,
    reference_year: i32,
    sequence: usize,
    params: &DeriveParams,
) -> Result<IndexStack> {
    let template = obs.template()?;
    let (rows, cols) = template.shape();
    let blank = || template.like_as(f64::NAN, Some(f64::NAN));

    let band = |b: SpectralBand| obs.band(b);
    let (blue, green, red) = (band(SpectralBand::Blue), band(SpectralBand::Green), band(SpectralBand::Red));
    let (nir, swir1, swir2) = (band(SpectralBand::Nir), band(SpectralBand::Swir1), band(SpectralBand::Swir2));

    let nbr_r = match (nir, swir1) {
        (Some(n), Some(s1)) => nbr(n, s1)?,
        _ => blank(),
    };
    let nbr2_r = match (swir1, swir2) {
        (Some(s1), Some(s2)) => nbr2(s1, s2)?,
        _ => blank(),
    };
    let mirbi_r = match (swir1, swir2) {
        (Some(s1), Some(s2)) => mirbi(s1, s2, params.mirbi)?,
        _ => blank(),
    };
    let nbi_r = match (swir1, swir2, blue) {
        (Some(s1), Some(s2), Some(b)) => nbi(s1, s2, b)?,
        _ => blank(),
    };
    let ndvi_r = match (nir, red) {
        (Some(n), Some(r)) => ndvi(n, r)?,
        _ => blank(),
    };
    let gndvi_r = match (nir, green) {
        (Some(n), Some(g)) => gndvi(n, g)?,
        _ => blank(),
    };

    let offset = day_offset(obs.acquired(), reference_year) as f64;
    let mut doy = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            doy.push(if obs.is_valid_at(row, col) { offset } else { f64::NAN });
        }
    }
    let doy_inv: Vec<f64> = doy.iter().map(|&d| -d).collect();

    Ok(IndexStack {
        acquired: obs.acquired(),
        sequence,
        bands: vec![
            nbr_r,
            nbr2_r,
            mirbi_r,
            nbi_r,
            ndvi_r,
            gndvi_r,
            template.with_data(doy, Some(f64::NAN))?,
            template.with_data(doy_inv, Some(f64::NAN))?,
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn observation(acquired: NaiveDate) -> Observation {
        let mut swir1 = Raster::filled(2, 2, 2000.0);
        swir1.set(1, 1, f64::NAN).unwrap();
        Observation::new(acquired)
            .with_band(SpectralBand::Nir, Raster::filled(2, 2, 3000.0))
            .unwrap()
            .with_band(SpectralBand::Swir1, swir1)
            .unwrap()
            .with_band(SpectralBand::Swir2, Raster::filled(2, 2, 1500.0))
            .unwrap()
    }

    #[test]
    fn test_day_offset_across_year_boundary() {
        assert_eq!(day_offset(date(2021, 1, 1), 2021), 0);
        assert_eq!(day_offset(date(2021, 5, 11), 2021), 130);
        assert_eq!(day_offset(date(2020, 12, 17), 2021), -15);
        assert_eq!(day_offset(date(2022, 1, 10), 2021), 374);
        assert_eq!(date_from_offset(-15, 2021), Some(date(2020, 12, 17)));
    }

    #[test]
    fn test_derive_bands() {
        let stack = derive_indices(&observation(date(2021, 4, 11)), 2021, 7, &DeriveParams::default()).unwrap();

        assert_eq!(stack.sequence(), 7);
        assert_relative_eq!(stack.band(IndexBand::Nbr).get(0, 0).unwrap(), 1000.0 / 5000.0, epsilon = 1e-12);
        assert_relative_eq!(stack.band(IndexBand::Mirbi).get(0, 0).unwrap(), -4598.0, epsilon = 1e-9);
        assert_eq!(stack.band(IndexBand::Doy).get(0, 0).unwrap(), 100.0);
        assert_eq!(stack.band(IndexBand::DoyInv).get(0, 0).unwrap(), -100.0);
    }

    #[test]
    fn test_missing_bands_and_invalid_pixels() {
        let stack = derive_indices(&observation(date(2021, 4, 11)), 2021, 0, &DeriveParams::default()).unwrap();

        // No blue, red or green band.
        assert!(stack.band(IndexBand::Nbi).get(0, 0).unwrap().is_nan());
        assert!(stack.band(IndexBand::Ndvi).get(0, 0).unwrap().is_nan());
        assert!(stack.band(IndexBand::Gndvi).get(0, 0).unwrap().is_nan());

        // A masked band invalidates the whole pixel for selection.
        assert!(stack.band(IndexBand::Doy).get(1, 1).unwrap().is_nan());
        assert!(stack.band(IndexBand::DoyInv).get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_names() {
        assert_eq!(IndexBand::DoyInv.to_string(), "DOY_INV");
        assert_eq!(IndexBand::ALL.len(), 8);
    }
}
