//! Tiled processing over a pixel grid
//!
//! The burn-date scan never looks at neighbouring pixels, so tiles do not
//! overlap: each worker owns one tile's intermediates and hands back a
//! finished slice that the caller pastes into the output.

use std::fmt;

use crate::strategy::{ParallelStrategy, ProcessingMode};

/// A tile representing a subset of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Tile row in the tile grid
    pub grid_row: usize,
    /// Tile column in the tile grid
    pub grid_col: usize,
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this tile
    pub rows: usize,
    /// Number of columns in this tile
    pub cols: usize,
}

impl Tile {
    /// Convert tile-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }

    /// Short identity such as `t2_5`, used in logs and errors
    pub fn label(&self) -> String {
        format!("t{}_{}", self.grid_row, self.grid_col)
    }

    /// Number of cells in the tile
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the tile has no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [rows {}..{}, cols {}..{}]",
            self.label(),
            self.row_offset,
            self.row_offset + self.rows,
            self.col_offset,
            self.col_offset + self.cols
        )
    }
}

/// Iterator over non-overlapping tiles covering a raster, row-major
pub struct TileIterator {
    total_rows: usize,
    total_cols: usize,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    /// Create a new tile iterator. A zero tile size is treated as 1.
    pub fn new(total_rows: usize, total_cols: usize, tile_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            tile_size: tile_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let row_end = (self.current_row + self.tile_size).min(self.total_rows);
        let col_end = (self.current_col + self.tile_size).min(self.total_cols);

        let tile = Tile {
            grid_row: self.current_row / self.tile_size,
            grid_col: self.current_col / self.tile_size,
            row_offset: self.current_row,
            col_offset: self.current_col,
            rows: row_end - self.current_row,
            cols: col_end - self.current_col,
        };

        self.current_col += self.tile_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}

/// Processor for tiled raster operations
#[derive(Debug, Clone, Copy)]
pub struct TiledProcessor {
    tile_size: usize,
    mode: ProcessingMode,
}

impl TiledProcessor {
    /// Create a new tiled processor
    pub fn new(tile_size: usize, mode: ProcessingMode) -> Self {
        Self {
            tile_size: tile_size.max(1),
            mode,
        }
    }

    /// Tiles covering a `rows x cols` grid
    pub fn tiles(&self, rows: usize, cols: usize) -> Vec<Tile> {
        TileIterator::new(rows, cols, self.tile_size).collect()
    }

    /// Run `f` on every tile and return the results in tile order.
    ///
    /// All tiles are attempted; the first error in tile order is returned.
    pub fn try_map<R, E, F>(&self, rows: usize, cols: usize, f: F) -> Result<Vec<(Tile, R)>, E>
    where
        R: Send,
        E: Send,
        F: Fn(&Tile) -> Result<R, E> + Sync + Send,
    {
        let tiles = self.tiles(rows, cols);
        self.mode
            .par_map(tiles, |tile| f(&tile).map(|r| (tile, r)))
            .into_iter()
            .collect()
    }
}
