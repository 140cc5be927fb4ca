//! # burnscan acquisition
//!
//! The boundary between the burn-date engine and whatever delivers imagery.
//!
//! A source hands out cloud-screened [`Observation`](burnscan_core::Observation)s
//! for one pixel window and date range at a time. The engine never talks to a
//! source directly: it goes through [`fetch_with_retry`], which retries
//! transient failures with exponential backoff and reports the failing tile
//! once the budget is spent.
//!
//! Two sources ship with the crate:
//! - [`MemorySource`]: observations already held in memory
//! - [`DirectorySource`]: a JSON manifest of single-band GeoTIFF scenes, with
//!   an LRU cache of decoded bands

pub mod cache;
pub mod directory;
pub mod error;
pub mod manifest;
pub mod request;
pub mod retry;
pub mod source;

pub use directory::{DirectoryOptions, DirectorySource};
pub use error::{AcquisitionError, Result};
pub use manifest::{Manifest, SceneEntry};
pub use request::{AcquisitionRequest, BBox, GridSpec, PixelWindow};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use source::{MemorySource, ObservationSource};
