//! The observation source trait and an in-memory implementation.

use burnscan_core::{Error, Observation};

use crate::error::Result;
use crate::request::{AcquisitionRequest, GridSpec};

/// Anything that can deliver cloud-screened observations for a tile.
///
/// Observations come back in ingestion order, which the compositor uses to
/// break ties between equal selection keys. Every observation covers exactly
/// the requested window.
pub trait ObservationSource: Send + Sync {
    /// Geometry of the full grid this source delivers.
    fn grid(&self) -> Result<GridSpec>;

    /// Observations acquired within `request.start..=request.end`, cropped to
    /// `request.window`.
    fn fetch(&self, request: &AcquisitionRequest) -> Result<Vec<Observation>>;
}

/// Full-grid observations held in memory.
pub struct MemorySource {
    grid: GridSpec,
    observations: Vec<Observation>,
}

impl MemorySource {
    /// Build from observations sharing one grid; the first one sets the grid.
    pub fn new(observations: Vec<Observation>) -> burnscan_core::Result<Self> {
        let first = observations
            .first()
            .ok_or_else(|| Error::Algorithm("memory source needs at least one observation".into()))?;
        let template = first.template()?;
        let grid = GridSpec::new(
            template.rows(),
            template.cols(),
            *template.transform(),
            template.crs().cloned(),
        );
        Self::with_grid(grid, observations)
    }

    /// Build with an explicit grid, which may hold no observations at all.
    pub fn with_grid(grid: GridSpec, observations: Vec<Observation>) -> burnscan_core::Result<Self> {
        for obs in &observations {
            let (rows, cols) = obs.shape()?;
            if (rows, cols) != (grid.rows, grid.cols) {
                return Err(Error::SizeMismatch {
                    er: grid.rows,
                    ec: grid.cols,
                    ar: rows,
                    ac: cols,
                });
            }
        }
        Ok(Self { grid, observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl ObservationSource for MemorySource {
    fn grid(&self) -> Result<GridSpec> {
        Ok(self.grid.clone())
    }

    fn fetch(&self, request: &AcquisitionRequest) -> Result<Vec<Observation>> {
        let w = request.window;
        if !w.fits(self.grid.rows, self.grid.cols) {
            return Err(Error::IndexOutOfBounds {
                row: w.row_off + w.rows,
                col: w.col_off + w.cols,
                rows: self.grid.rows,
                cols: self.grid.cols,
            }
            .into());
        }

        let mut out = Vec::new();
        for obs in self.observations.iter().filter(|o| request.covers(o.acquired())) {
            out.push(obs.window(w.row_off, w.col_off, w.rows, w.cols)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PixelWindow;
    use burnscan_core::{Raster, SpectralBand};
    use chrono::NaiveDate;

    fn obs(day: u32, value: f64) -> Observation {
        Observation::new(NaiveDate::from_ymd_opt(2021, 5, day).unwrap())
            .with_band(SpectralBand::Swir1, Raster::filled(4, 6, value))
            .unwrap()
    }

    #[test]
    fn test_fetch_filters_dates_and_crops() {
        let source = MemorySource::new(vec![obs(1, 1.0), obs(10, 2.0), obs(20, 3.0)]).unwrap();
        let request = AcquisitionRequest::new(
            "t0_0",
            PixelWindow::new(1, 2, 2, 3),
            NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 5, 10).unwrap(),
        );

        let got = source.fetch(&request).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].shape().unwrap(), (2, 3));
        assert_eq!(got[1].band(SpectralBand::Swir1).unwrap().get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_fetch_outside_grid_fails() {
        let source = MemorySource::new(vec![obs(1, 1.0)]).unwrap();
        let request = AcquisitionRequest::new(
            "t9_9",
            PixelWindow::new(3, 0, 4, 6),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
        );
        assert!(source.fetch(&request).is_err());
    }

    #[test]
    fn test_mixed_shapes_rejected() {
        let other = Observation::new(NaiveDate::from_ymd_opt(2021, 5, 2).unwrap())
            .with_band(SpectralBand::Swir1, Raster::filled(5, 6, 1.0))
            .unwrap();
        assert!(MemorySource::new(vec![obs(1, 1.0), other]).is_err());
    }
}
