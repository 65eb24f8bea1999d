//! Worker pool sizing.

use crate::{defaults, sampler::Sample, RateSpec};

/// Loss-free congestion control for a pool of pacing workers.
///
/// Slow start, multiplicative decrease, additive increase.
///
/// Starts with no workers and doubles the pool every sample that falls short of the target
/// (slow start). The first time the achieved rate overshoots, the pool is halved and the
/// controller moves to fast recovery for good: from then on, shortfalls grow the pool by a fixed
/// number of workers, and overshoots keep halving it.
///
/// Samples within the error band leave the pool alone.
///
/// Inspired by TCP Reno.
#[derive(Debug, Clone)]
pub struct ScalingController {
    error_band: f64,
    increase_by: usize,
    max_workers: usize,

    state: ControllerState,
}

/// Growth regime of a [ScalingController].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Exponential growth, before any overshoot has been seen.
    #[default]
    SlowStart,
    /// Additive growth, after the pool has been halved at least once.
    FastRecovery,
}

/// What to do to the worker pool after a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start this many workers.
    Grow(usize),
    /// Stop this many workers. May be zero when halving a single worker.
    Shrink(usize),
    /// Leave the pool as it is.
    Hold,
}

/// A snapshot of the state of a [ScalingController].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    phase: Phase,
    workers: usize,
    measured_rate: f64,
    target_rate: f64,
}

impl ScalingController {
    /// A controller holding the achieved rate within the rate's error band.
    pub fn new(spec: &RateSpec) -> Self {
        Self {
            error_band: spec.error_band(),
            increase_by: defaults::RECOVERY_INCREASE,
            max_workers: defaults::MAX_WORKERS,

            state: ControllerState {
                phase: Phase::SlowStart,
                workers: 0,
                measured_rate: 0.0,
                target_rate: spec.target_rate(),
            },
        }
    }

    /// Workers added per short sample during fast recovery. Defaults to 1.
    pub fn increase_by(self, increase: usize) -> Self {
        assert!(increase > 0);
        Self {
            increase_by: increase,
            ..self
        }
    }

    /// Never grow the pool beyond this many workers. Defaults to 10,000.
    pub fn with_max_workers(self, max: usize) -> Self {
        assert!(max > 0);
        Self {
            max_workers: max,
            ..self
        }
    }

    /// The current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Update the pool size in response to a new sample.
    pub fn update(&mut self, sample: &Sample) -> Decision {
        self.state.measured_rate = sample.measured_rate();
        self.state.target_rate = sample.target_rate();

        let measured = sample.measured_rate();
        let target = sample.target_rate();

        if measured < target * (1.0 - self.error_band) {
            let workers = self.state.workers;
            let grown = match self.state.phase {
                Phase::SlowStart => workers.saturating_mul(2).max(1),
                Phase::FastRecovery => workers.saturating_add(self.increase_by),
            };
            let grown = grown.min(self.max_workers.max(workers));

            if grown == workers {
                return Decision::Hold;
            }
            self.state.workers = grown;

            Decision::Grow(grown - workers)
        } else if measured >= target * (1.0 + self.error_band) {
            let delta = self.state.workers / 2;
            self.state.workers -= delta;
            self.state.phase = Phase::FastRecovery;

            Decision::Shrink(delta)
        } else {
            Decision::Hold
        }
    }

    /// Record the final sample of a run, taken once every worker has exited.
    pub(crate) fn finish(&mut self, sample: &Sample) {
        self.state.measured_rate = sample.measured_rate();
        self.state.target_rate = sample.target_rate();
        self.state.workers = 0;
    }

    /// Bring the worker count back in line with the workers actually running.
    ///
    /// Workers can only disappear unannounced (e.g. a panicking operation), so this never raises
    /// the count.
    pub(crate) fn reconcile(&mut self, running: usize) -> usize {
        let lost = self.state.workers.saturating_sub(running);
        self.state.workers -= lost;
        lost
    }
}

impl ControllerState {
    /// The current growth regime.
    pub fn phase(&self) -> Phase {
        self.phase
    }
    /// Workers the controller expects to be running.
    pub fn workers(&self) -> usize {
        self.workers
    }
    /// Achieved calls per second at the last sample.
    pub fn measured_rate(&self) -> f64 {
        self.measured_rate
    }
    /// Target calls per second.
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }
}
