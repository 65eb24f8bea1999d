use std::sync::Arc;

use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    time,
};
use tracing::trace;

use crate::{operation::Operation, schedule::Schedule};

use super::handle::ExitGuard;

/// Invoke the operation once per free slot on the shared schedule, until told to stop.
///
/// The stop signal is checked before each slot and raced against the wait for it. An invocation
/// that has started always runs to completion and is counted.
pub(super) async fn pace(
    schedule: Arc<Schedule>,
    operation: Arc<dyn Operation>,
    mut stop: oneshot::Receiver<()>,
    _exit: ExitGuard,
) {
    loop {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            // Signalled, or the pool has gone away
            Ok(()) | Err(TryRecvError::Closed) => break,
        }

        let slot = schedule.next_slot();

        tokio::select! {
            biased;
            _ = &mut stop => break,
            () = time::sleep_until(slot) => {}
        }

        operation.invoke().await;
        schedule.record();
    }

    trace!("stopped");
}
