//! Error types for observation acquisition.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while acquiring observations.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// A failure worth retrying (busy store, interrupted read, timeout).
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] burnscan_core::Error),

    /// The retry budget for a tile is spent.
    #[error("tile {tile}: gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        tile: String,
        attempts: u32,
        last: Box<AcquisitionError>,
    },
}

impl AcquisitionError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AcquisitionError::Transient(_) => true,
            AcquisitionError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl From<AcquisitionError> for burnscan_core::Error {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::Exhausted {
                tile,
                attempts,
                last,
            } => burnscan_core::Error::Acquisition {
                tile,
                attempts,
                reason: last.to_string(),
            },
            AcquisitionError::Core(inner) => inner,
            other => burnscan_core::Error::Other(other.to_string()),
        }
    }
}

/// Result alias for acquisition operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;
