use std::{
    fmt,
    sync::{
        atomic::{self, AtomicUsize},
        Arc,
    },
};

use tokio::sync::{oneshot, Notify};

/// Identifies a worker within a run, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct WorkerId(pub(crate) u64);

/// The pool's end of a running worker: its stop signal.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    id: WorkerId,
    stop: oneshot::Sender<()>,
}

/// Counts workers which have not yet exited, across the whole run.
///
/// Kept apart from the stop signals: a worker is counted from spawn until its task finishes,
/// whether or not it was ever signalled.
#[derive(Debug, Default)]
pub(crate) struct ExitTracker {
    live: AtomicUsize,
    exited: Notify,
}

/// Held by a worker task for as long as it runs.
///
/// Dropped however the task ends, including by panic or by the runtime shutting down.
#[derive(Debug)]
pub(crate) struct ExitGuard {
    tracker: Arc<ExitTracker>,
}

impl WorkerHandle {
    pub(crate) fn new(id: WorkerId) -> (Self, oneshot::Receiver<()>) {
        let (stop, stopped) = oneshot::channel();
        (Self { id, stop }, stopped)
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    /// False once the worker has exited and dropped its end of the stop signal.
    pub(crate) fn is_running(&self) -> bool {
        !self.stop.is_closed()
    }

    /// Ask the worker to stop at its next opportunity. Doesn't wait for it.
    pub(crate) fn stop(self) {
        // Err if the worker has already gone, which is just as good
        let _ = self.stop.send(());
    }
}

impl ExitTracker {
    /// Workers spawned but not yet exited.
    pub(crate) fn live(&self) -> usize {
        self.live.load(atomic::Ordering::Acquire)
    }

    pub(crate) fn guard(self: &Arc<Self>) -> ExitGuard {
        self.live.fetch_add(1, atomic::Ordering::SeqCst);
        ExitGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Wait until every worker has exited.
    pub(crate) async fn all_exited(&self) {
        loop {
            let exited = self.exited.notified();
            tokio::pin!(exited);
            // Register before checking, so an exit in between isn't missed
            exited.as_mut().enable();

            if self.live() == 0 {
                return;
            }
            exited.await;
        }
    }
}

impl Drop for ExitGuard {
    /// Deregisters the worker and wakes anything waiting for workers to exit.
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, atomic::Ordering::SeqCst);
        self.tracker.exited.notify_waiters();
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
