//! Non-blocking wrapper around [`GuardPipeline`].
//!
//! Ported from the reference implementation's `async_guard.py`, which
//! dispatches onto `asyncio.to_thread`. The Rust equivalent dispatches
//! onto [`tokio::task::spawn_blocking`] — it adds no synchronization,
//! timeout, or cancellation behavior of its own; see `spec.md` §5's
//! "MAY dispatch onto a worker pool without altering semantics."

use std::sync::Arc;

use crate::pipeline::model::{GuardRequest, GuardResponse};
use crate::pipeline::orchestrator::GuardPipeline;

/// An async-friendly handle to a [`GuardPipeline`]. Cheap to clone — the
/// inner pipeline is reference-counted.
#[derive(Clone)]
pub struct AsyncGuardPipeline {
    inner: Arc<GuardPipeline>,
}

impl AsyncGuardPipeline {
    /// Wraps an existing [`GuardPipeline`].
    #[must_use]
    pub fn new(inner: GuardPipeline) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Evaluates `request` on a blocking worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the underlying blocking task itself panics (propagated
    /// by [`tokio::task::JoinHandle::await`]'s `Result::unwrap`), which
    /// would indicate a bug in [`GuardPipeline::evaluate`], not caller
    /// error.
    pub async fn evaluate(&self, request: GuardRequest) -> GuardResponse {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.evaluate(&request))
            .await
            .expect("guard pipeline evaluation task panicked")
    }
}
