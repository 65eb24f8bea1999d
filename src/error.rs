//! Configuration errors.

use std::time::Duration;

use thiserror::Error;

/// Reasons a [RateSpec](crate::RateSpec) is rejected before any worker starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The number of calls per period was zero.
    #[error("frequency must be greater than zero")]
    ZeroFrequency,

    /// The period was zero.
    #[error("period must be greater than zero")]
    ZeroPeriod,

    /// The error band was negative, not finite, or at least 1.
    #[error("error band must be within [0, 1), got {0}")]
    ErrorBand(f64),

    /// The period is too short to fit `frequency` calls at nanosecond resolution.
    #[error("{frequency} calls per {period:?} leaves no time between calls")]
    IntervalTooShort {
        /// Requested calls per period.
        frequency: u64,
        /// Requested period.
        period: Duration,
    },
}

/// Result type for fallible pacer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
