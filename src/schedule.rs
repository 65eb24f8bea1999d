use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::time::Instant;

use crate::sampler::Sample;
use crate::RateSpec;

/// Pacing slots shared by every worker in a run.
///
/// Slot `n` is due at `start + n * interval`. The next slot is derived from the number of
/// completed invocations, so whichever worker gets there first claims it.
#[derive(Debug)]
pub(crate) struct Schedule {
    start: Instant,
    interval: Duration,
    invocations: AtomicU64,
}

impl Schedule {
    /// Slots far enough out that they are never reached.
    const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub(crate) fn starting_at(start: Instant, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "pacing interval must be non-zero");
        Self {
            start,
            interval,
            invocations: AtomicU64::new(0),
        }
    }

    pub(crate) fn start(&self) -> Instant {
        self.start
    }

    pub(crate) fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Acquire)
    }

    /// Record a completed invocation, moving the next slot on by one interval.
    pub(crate) fn record(&self) {
        self.invocations.fetch_add(1, Ordering::AcqRel);
    }

    /// When the next invocation is due.
    pub(crate) fn next_slot(&self) -> Instant {
        self.slot(self.invocations())
    }

    fn slot(&self, n: u64) -> Instant {
        let offset = self.interval.as_nanos().saturating_mul(u128::from(n));

        u64::try_from(offset)
            .ok()
            .and_then(|nanos| self.start.checked_add(Duration::from_nanos(nanos)))
            .unwrap_or_else(|| self.start + Self::FAR_FUTURE)
    }

    /// Measure throughput since the start of the run.
    pub(crate) fn sample(&self, spec: &RateSpec) -> Sample {
        Sample::measure(self.invocations(), self.start.elapsed(), spec)
    }
}
