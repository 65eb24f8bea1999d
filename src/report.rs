use tokio::sync::watch;

use crate::{
    controller::{ControllerState, Phase},
    sampler::Sample,
    RateSpec,
};

/// A snapshot of a run, taken at the most recent sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    rps: f64,
    target_rps: f64,
    num_workers: usize,
    phase: Phase,
    invocations: u64,
}

/// Read access to the latest [Report] of a [Pacer](crate::Pacer).
///
/// Cheaply cloneable. Remains usable after the run has finished, holding the final report.
#[derive(Debug, Clone)]
pub struct Reporter {
    reports: watch::Receiver<Report>,
}

impl Report {
    /// Before the first sample: nothing achieved, no workers.
    pub(crate) fn initial(spec: &RateSpec) -> Self {
        Self {
            rps: 0.0,
            target_rps: spec.target_rate(),
            num_workers: 0,
            phase: Phase::SlowStart,
            invocations: 0,
        }
    }

    pub(crate) fn new(state: &ControllerState, sample: &Sample) -> Self {
        Self {
            rps: state.measured_rate(),
            target_rps: state.target_rate(),
            num_workers: state.workers(),
            phase: state.phase(),
            invocations: sample.invocations(),
        }
    }

    /// Achieved calls per second, averaged over the whole run so far.
    pub fn rps(&self) -> f64 {
        self.rps
    }
    /// Target calls per second.
    pub fn target_rps(&self) -> f64 {
        self.target_rps
    }
    /// Workers running.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
    /// The controller's growth regime.
    pub fn phase(&self) -> Phase {
        self.phase
    }
    /// Completed invocations.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}

impl Reporter {
    pub(crate) fn new(reports: watch::Receiver<Report>) -> Self {
        Self { reports }
    }

    /// The latest report. Never blocks.
    pub fn snapshot(&self) -> Report {
        *self.reports.borrow()
    }

    /// Wait for the next report.
    ///
    /// Reports published while nobody was waiting are skipped, apart from the latest. Returns
    /// `None` once the run has finished and its final report has been seen.
    pub async fn changed(&mut self) -> Option<Report> {
        self.reports.changed().await.ok()?;
        Some(*self.reports.borrow_and_update())
    }
}
