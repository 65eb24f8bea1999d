//! The work being paced.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

/// An operation invoked once per pacing slot.
///
/// Implemented for any `Fn() -> impl Future<Output = ()>`. Use [blocking()] for synchronous
/// closures.
///
/// Failures are the operation's own business: nothing is caught or retried. A panic ends the
/// worker which invoked it.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Perform the operation once.
    async fn invoke(&self);
}

#[async_trait]
impl<F, Fut> Operation for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn invoke(&self) {
        (self)().await
    }
}

/// A synchronous operation, run on the runtime's blocking thread pool.
#[derive(Debug)]
pub struct Blocking<F>(Arc<F>);

/// Adapt a synchronous closure into an [Operation].
///
/// Each invocation runs on [spawn_blocking](tokio::task::spawn_blocking), so long-running calls
/// don't stall the runtime. Panics are resumed on the invoking worker.
pub fn blocking<F>(f: F) -> Blocking<F>
where
    F: Fn() + Send + Sync + 'static,
{
    Blocking(Arc::new(f))
}

#[async_trait]
impl<F> Operation for Blocking<F>
where
    F: Fn() + Send + Sync + 'static,
{
    async fn invoke(&self) {
        let f = Arc::clone(&self.0);

        if let Err(err) = tokio::task::spawn_blocking(move || f()).await {
            // Otherwise cancelled by runtime shutdown
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}
