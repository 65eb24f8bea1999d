use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    controller::{Decision, Phase, ScalingController},
    defaults,
    operation::Operation,
    pool::WorkerPool,
    report::{Report, Reporter},
    schedule::Schedule,
    RateSpec, Result,
};

/// Runs an [Operation] at a target rate.
///
/// A pool of pacing workers invokes the operation at evenly spaced slots. Once per sample
/// interval the achieved rate is measured and a [ScalingController] decides whether to add or
/// stop workers, so the target can be met even when one call takes longer than the gap between
/// calls.
///
/// Must be run within a Tokio runtime. Workers are spawned as tasks, so a multi-threaded runtime
/// lets them run in parallel.
#[derive(Debug)]
pub struct Pacer {
    spec: RateSpec,
    controller: ScalingController,
    sample_interval: Duration,

    reports: watch::Sender<Report>,
}

impl Pacer {
    /// Create a pacer, rejecting a rate that can't be paced.
    pub fn new(spec: RateSpec) -> Result<Self> {
        spec.validate()?;

        let (reports, _) = watch::channel(Report::initial(&spec));

        Ok(Self {
            spec,
            controller: ScalingController::new(&spec),
            sample_interval: defaults::SAMPLE_INTERVAL,
            reports,
        })
    }

    /// How often to measure the rate and resize the pool. Defaults to one second.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "sample interval must be non-zero");
        self.sample_interval = interval;
        self
    }

    /// Workers added per short sample after the first overshoot. Defaults to 1.
    ///
    /// See [ScalingController::increase_by()].
    pub fn increase_by(mut self, increase: usize) -> Self {
        self.controller = self.controller.increase_by(increase);
        self
    }

    /// Never run more than this many workers. Defaults to 10,000.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.controller = self.controller.with_max_workers(max);
        self
    }

    /// The rate being paced.
    pub fn spec(&self) -> &RateSpec {
        &self.spec
    }

    /// A handle for reading reports, during or after the run.
    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.reports.subscribe())
    }

    /// Invoke `operation` at the target rate until `cancellation` completes.
    ///
    /// On cancellation every worker is told to stop, and this waits for all of them to finish
    /// their current invocation and exit. Nothing is invoked after this returns.
    ///
    /// Returns the final report, measured once all workers have exited.
    pub async fn run<O, C>(mut self, operation: O, cancellation: C) -> Report
    where
        O: Operation + 'static,
        C: Future<Output = ()>,
    {
        let schedule = Arc::new(Schedule::new(self.spec.interval()));
        let mut pool = WorkerPool::new(Arc::clone(&schedule), Arc::new(operation));

        let mut ticker = time::interval_at(
            schedule.start() + self.sample_interval,
            self.sample_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            target_rps = self.spec.target_rate(),
            interval = ?self.spec.interval(),
            error_band = self.spec.error_band(),
            "pacing started"
        );

        tokio::pin!(cancellation);
        loop {
            tokio::select! {
                biased;
                () = &mut cancellation => break,
                _ = ticker.tick() => self.tick(&mut pool, &schedule),
            }
        }

        debug!(
            workers = pool.running(),
            invocations = schedule.invocations(),
            "cancelled, stopping workers"
        );
        pool.stop_all();
        pool.await_all().await;

        let sample = schedule.sample(&self.spec);
        self.controller.finish(&sample);
        let report = Report::new(&self.controller.state(), &sample);
        self.reports.send_replace(report);

        debug!(
            rps = report.rps(),
            invocations = report.invocations(),
            "pacing stopped"
        );

        report
    }

    fn tick(&mut self, pool: &mut WorkerPool, schedule: &Schedule) {
        let lost = self.controller.reconcile(pool.running());
        if lost > 0 {
            warn!(lost, "workers exited without being stopped");
        }

        let before = self.controller.state();
        let sample = schedule.sample(&self.spec);
        let decision = self.controller.update(&sample);
        let after = self.controller.state();

        debug!(
            rps = sample.measured_rate(),
            target_rps = sample.target_rate(),
            invocations = sample.invocations(),
            workers = after.workers(),
            phase = ?after.phase(),
            "sampled"
        );

        match decision {
            Decision::Grow(n) => {
                info!(from = before.workers(), to = after.workers(), "adding workers");
                pool.grow(n);
            }
            Decision::Shrink(0) => {
                debug!(workers = after.workers(), "overshot, but too few workers to remove any");
            }
            Decision::Shrink(n) => {
                info!(from = before.workers(), to = after.workers(), "removing workers");
                pool.shrink(n);
            }
            Decision::Hold => {}
        }

        if before.phase() == Phase::SlowStart && after.phase() == Phase::FastRecovery {
            info!(workers = after.workers(), "overshot target, entering fast recovery");
        }

        self.reports.send_replace(Report::new(&after, &sample));
    }
}

/// Invoke `operation` at the rate given by `spec` until `cancellation` completes.
///
/// Shorthand for [Pacer::new()] followed by [Pacer::run()], for when reports aren't needed
/// until the end.
pub async fn run<O, C>(spec: RateSpec, operation: O, cancellation: C) -> Result<Report>
where
    O: Operation + 'static,
    C: Future<Output = ()>,
{
    Ok(Pacer::new(spec)?.run(operation, cancellation).await)
}
