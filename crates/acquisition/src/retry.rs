//! Bounded retry with exponential backoff around a source fetch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use burnscan_core::{Error, Observation};

use crate::error::{AcquisitionError, Result};
use crate::request::AcquisitionRequest;
use crate::source::ObservationSource;

/// Retry budget for one tile fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// No retries, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> burnscan_core::Result<()> {
        if self.max_retries > 16 {
            return Err(Error::invalid(
                "tiling.retry.max_retries",
                self.max_retries,
                "at most 16 retries",
            ));
        }
        if self.base_backoff_ms > 60_000 {
            return Err(Error::invalid(
                "tiling.retry.base_backoff_ms",
                self.base_backoff_ms,
                "backoff must not exceed one minute",
            ));
        }
        Ok(())
    }
}

/// Fetch a tile's observations, retrying transient failures.
///
/// A non-transient failure stops immediately. Either way the error that ends
/// the loop is wrapped in [`AcquisitionError::Exhausted`] with the tile
/// identity and the number of attempts made.
pub fn fetch_with_retry<S>(
    source: &S,
    request: &AcquisitionRequest,
    policy: &RetryPolicy,
) -> Result<Vec<Observation>>
where
    S: ObservationSource + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            debug!("tile {}: retry {} in {:?}", request.tile, attempt, delay);
            std::thread::sleep(delay);
        }

        match source.fetch(request) {
            Ok(observations) => {
                debug!(
                    "tile {}: {} observation(s) after {} attempt(s)",
                    request.tile,
                    observations.len(),
                    attempt + 1
                );
                return Ok(observations);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                warn!(
                    "tile {}: attempt {} failed ({}), retrying",
                    request.tile,
                    attempt + 1,
                    err
                );
                attempt += 1;
            }
            Err(err) => {
                return Err(AcquisitionError::Exhausted {
                    tile: request.tile.clone(),
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{GridSpec, PixelWindow};
    use burnscan_core::GeoTransform;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails transiently `failures` times, then succeeds with no observations.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        transient: bool,
    }

    impl ObservationSource for Flaky {
        fn grid(&self) -> Result<GridSpec> {
            Ok(GridSpec::new(1, 1, GeoTransform::default(), None))
        }

        fn fetch(&self, _request: &AcquisitionRequest) -> Result<Vec<Observation>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.transient {
                    Err(AcquisitionError::Transient(format!("busy #{}", n)))
                } else {
                    Err(AcquisitionError::Manifest("broken".into()))
                }
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn request() -> AcquisitionRequest {
        AcquisitionRequest::new(
            "t1_2",
            PixelWindow::new(0, 0, 1, 1),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
        )
    }

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff_ms: 0,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(0), Duration::ZERO);
    }

    #[test]
    fn test_recovers_within_budget() {
        let source = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            transient: true,
        };
        assert!(fetch_with_retry(&source, &request(), &quick(3)).is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_reports_tile_and_attempts() {
        let source = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            transient: true,
        };
        match fetch_with_retry(&source, &request(), &quick(3)) {
            Err(AcquisitionError::Exhausted { tile, attempts, .. }) => {
                assert_eq!(tile, "t1_2");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let source = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            transient: false,
        };
        assert!(fetch_with_retry(&source, &request(), &quick(3)).is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(quick(17).validate().is_err());
    }
}
