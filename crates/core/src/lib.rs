//! # burnscan core
//!
//! Core types, traits and I/O for the burnscan burn-date engine.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type with no-data handling
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System identification
//! - `Observation`: One dated multispectral acquisition over the grid
//! - Native GeoTIFF I/O for band inputs and event raster outputs

pub mod crs;
pub mod error;
pub mod io;
pub mod observation;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use observation::{Observation, SpectralBand};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::observation::{Observation, SpectralBand};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in burnscan.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
