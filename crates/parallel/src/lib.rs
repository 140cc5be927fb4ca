//! # burnscan parallel
//!
//! Parallel processing strategies for the burn-date engine.
//!
//! This crate provides:
//! - Non-overlapping tiling of the processing grid
//! - Ordered fan-out / fan-in over a Rayon worker pool

pub mod strategy;
pub mod tiled;

pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator, TiledProcessor};
