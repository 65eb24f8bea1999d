use std::time::Duration;

use crate::{defaults, Error, Result};

/// A target rate: `frequency` calls every `period`.
///
/// The error band is the fraction either side of the target within which the achieved rate is
/// considered on target. E.g. a band of 0.1 at 10 calls per second accepts anything in `[9, 11)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSpec {
    frequency: u64,
    period: Duration,
    error_band: f64,
}

impl RateSpec {
    /// `frequency` calls every `period`, with the default error band of 10%.
    ///
    /// Not validated until passed to [Pacer::new()](crate::Pacer::new()).
    pub fn new(frequency: u64, period: Duration) -> Self {
        Self {
            frequency,
            period,
            error_band: defaults::ERROR_BAND,
        }
    }

    /// `frequency` calls every second.
    pub fn per_second(frequency: u64) -> Self {
        Self::new(frequency, Duration::from_secs(1))
    }

    /// Fraction of the target rate tolerated either side of it. Must be in `[0, 1)`.
    pub fn with_error_band(self, error_band: f64) -> Self {
        Self { error_band, ..self }
    }

    /// Calls per period.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// The period `frequency` calls are spread over.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tolerated deviation from the target, as a fraction of it.
    pub fn error_band(&self) -> f64 {
        self.error_band
    }

    /// Target throughput in calls per second.
    pub fn target_rate(&self) -> f64 {
        self.frequency as f64 / self.period.as_secs_f64()
    }

    /// Time between consecutive pacing slots, truncated to whole nanoseconds.
    pub fn interval(&self) -> Duration {
        let nanos = self.period.as_nanos() / u128::from(self.frequency.max(1));

        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Check this describes a rate that can actually be paced.
    pub fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(Error::ZeroFrequency);
        }
        if self.period.is_zero() {
            return Err(Error::ZeroPeriod);
        }
        if !(0.0..1.0).contains(&self.error_band) {
            // Also catches NaN
            return Err(Error::ErrorBand(self.error_band));
        }
        if self.interval().is_zero() {
            return Err(Error::IntervalTooShort {
                frequency: self.frequency,
                period: self.period,
            });
        }
        Ok(())
    }
}
