//! The pool of pacing workers.

use std::{collections::VecDeque, sync::Arc};

use tracing::{debug, debug_span, Instrument};

use crate::{operation::Operation, schedule::Schedule};

use handle::{ExitTracker, WorkerHandle, WorkerId};

mod handle;
mod worker;

/// Pacing workers sharing one schedule.
///
/// Only the owner of the pool starts and signals workers. Workers deregister themselves simply by
/// exiting: their stop receiver closes, and their exit guard drops.
pub(crate) struct WorkerPool {
    schedule: Arc<Schedule>,
    operation: Arc<dyn Operation>,

    /// Running workers which haven't been signalled, oldest first.
    running: VecDeque<WorkerHandle>,
    exits: Arc<ExitTracker>,

    next_id: u64,
}

impl WorkerPool {
    pub(crate) fn new(schedule: Arc<Schedule>, operation: Arc<dyn Operation>) -> Self {
        Self {
            schedule,
            operation,
            running: VecDeque::new(),
            exits: Arc::default(),
            next_id: 0,
        }
    }

    /// Workers running and not yet told to stop.
    pub(crate) fn running(&mut self) -> usize {
        self.prune();
        self.running.len()
    }

    /// Workers which haven't exited yet, whether or not they've been told to stop.
    pub(crate) fn live(&self) -> usize {
        self.exits.live()
    }

    /// Start `n` more workers.
    pub(crate) fn grow(&mut self, n: usize) {
        self.prune();
        self.running.reserve(n);

        for _ in 0..n {
            let id = WorkerId(self.next_id);
            self.next_id += 1;

            let (handle, stop) = WorkerHandle::new(id);
            let exit = self.exits.guard();

            tokio::spawn(
                worker::pace(
                    Arc::clone(&self.schedule),
                    Arc::clone(&self.operation),
                    stop,
                    exit,
                )
                .instrument(debug_span!("worker", id = %id)),
            );

            self.running.push_back(handle);
        }
    }

    /// Signal up to `n` of the longest-running workers to stop. Doesn't wait for them.
    pub(crate) fn shrink(&mut self, n: usize) {
        self.prune();

        let n = n.min(self.running.len());
        for handle in self.running.drain(..n) {
            debug!(worker = %handle.id(), "signalling worker to stop");
            handle.stop();
        }
    }

    /// Signal every running worker to stop. Never blocks.
    pub(crate) fn stop_all(&mut self) {
        for handle in self.running.drain(..) {
            handle.stop();
        }
    }

    /// Wait until every worker ever started by this pool has exited.
    pub(crate) async fn await_all(&self) {
        self.exits.all_exited().await;
    }

    /// Forget workers which exited without being asked to.
    fn prune(&mut self) {
        self.running.retain(WorkerHandle::is_running);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("schedule", &self.schedule)
            .field("running", &self.running.len())
            .field("live", &self.live())
            .finish()
    }
}
