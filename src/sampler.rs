//! Throughput measurement.

use std::time::Duration;

use crate::RateSpec;

/// Achieved and target throughput at a point in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    invocations: u64,
    elapsed: Duration,
    measured_rate: f64,
    target_rate: f64,
}

impl Sample {
    /// Throughput after `invocations` completed calls in `elapsed` time, against the target rate
    /// of `spec`.
    ///
    /// Both rates are in calls per second. Nothing has been achieved yet when no time has
    /// elapsed, so the measured rate is zero.
    pub fn measure(invocations: u64, elapsed: Duration, spec: &RateSpec) -> Self {
        let measured_rate = if elapsed.is_zero() {
            0.0
        } else {
            invocations as f64 / elapsed.as_secs_f64()
        };

        Self {
            invocations,
            elapsed,
            measured_rate,
            target_rate: spec.target_rate(),
        }
    }

    /// Completed invocations.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Achieved calls per second.
    pub fn measured_rate(&self) -> f64 {
        self.measured_rate
    }

    /// Target calls per second.
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }
}
