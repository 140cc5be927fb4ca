//! Pixel windows, AOI boxes and acquisition requests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use burnscan_core::{Error, GeoTransform, CRS};

/// Geometry of the grid a source delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    /// Window covering the whole grid.
    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.rows, self.cols)
    }

    /// Transform of the top-left pixel of `window`.
    pub fn window_transform(&self, window: &PixelWindow) -> GeoTransform {
        self.transform.shifted(window.col_off, window.row_off)
    }
}

/// A rectangular block of pixels on the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl PixelWindow {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_off,
            col_off,
            rows,
            cols,
        }
    }

    /// A window expressed relative to this one, moved into grid coordinates.
    pub fn sub_window(&self, row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self::new(self.row_off + row_off, self.col_off + col_off, rows, cols)
    }

    /// Whether the window lies completely inside a `rows x cols` grid.
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.row_off + self.rows <= rows && self.col_off + self.cols <= cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Area of interest as a box in grid CRS coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check if two bboxes intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Pixel window of `grid` touched by this box, clamped to the grid.
    ///
    /// A box that misses the grid entirely is a configuration error.
    pub fn to_window(&self, grid: &GridSpec) -> burnscan_core::Result<PixelWindow> {
        if !(self.min_x < self.max_x && self.min_y < self.max_y) {
            return Err(Error::invalid("aoi", self, "min corner must be below max corner"));
        }

        // North-up: min_y maps to the bottom row, max_y to the top row.
        let (col_a, row_a) = grid.transform.geo_to_pixel(self.min_x, self.max_y);
        let (col_b, row_b) = grid.transform.geo_to_pixel(self.max_x, self.min_y);

        let clamp = |v: f64, hi: usize| -> usize {
            if v <= 0.0 {
                0
            } else {
                (v as usize).min(hi)
            }
        };

        let min_col = clamp(col_a.min(col_b).floor(), grid.cols);
        let max_col = clamp(col_a.max(col_b).ceil(), grid.cols);
        let min_row = clamp(row_a.min(row_b).floor(), grid.rows);
        let max_row = clamp(row_a.max(row_b).ceil(), grid.rows);

        if min_col >= max_col || min_row >= max_row {
            return Err(Error::invalid("aoi", self, "does not intersect the source grid"));
        }

        Ok(PixelWindow::new(
            min_row,
            min_col,
            max_row - min_row,
            max_col - min_col,
        ))
    }
}

impl std::fmt::Display for BBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// One request to a source: a tile of the grid over an inclusive date range.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    /// Tile identity, carried into errors.
    pub tile: String,
    pub window: PixelWindow,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AcquisitionRequest {
    pub fn new(tile: impl Into<String>, window: PixelWindow, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            tile: tile.into(),
            window,
            start,
            end,
        }
    }

    /// Whether `date` falls inside the requested range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
