//! Observable progress handle and cancellation
//!
//! [`StepProgress`] wraps a [`StepRun`] behind shared async state and
//! broadcasts every change on a watch channel, which is the whole rendering
//! contract: a dialog subscribes and redraws from snapshots. One handle is
//! scoped to one flow invocation; there is no process-wide singleton, so
//! independent runs can coexist.
//!
//! [`CancelToken`] is threaded through every external call so that closing
//! the dialog aborts in-flight work at the next suspension point instead of
//! merely hiding it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify, RwLock};
use tracing::debug;

use crate::errors::EngineError;
use crate::steps::{StepRun, StepSpec};

/// Cooperative cancellation signal shared between a dialog and its flow
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; wakes every pending `guard`.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless cancelled first; a cancellation arriving mid-flight
    /// resolves to `EngineError::Cancelled` and drops the future.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        tokio::select! {
            _ = self.cancelled() => Err(EngineError::Cancelled),
            out = fut => out,
        }
    }
}

/// Shared, observable handle over one [`StepRun`]
#[derive(Clone)]
pub struct StepProgress {
    inner: Arc<RwLock<StepRun>>,
    watch_tx: Arc<watch::Sender<StepRun>>,
}

impl StepProgress {
    pub fn new(title: impl Into<String>) -> Self {
        let run = StepRun::new(title);
        let (watch_tx, _watch_rx) = watch::channel(run.clone());
        Self {
            inner: Arc::new(RwLock::new(run)),
            watch_tx: Arc::new(watch_tx),
        }
    }

    /// Subscribe to run snapshots. The initial value is the current state.
    pub fn subscribe(&self) -> watch::Receiver<StepRun> {
        self.watch_tx.subscribe()
    }

    /// Broadcast the current state. `send_replace` so that publishing with
    /// zero subscribers still records the latest snapshot.
    fn publish(&self, run: &StepRun) {
        self.watch_tx.send_replace(run.clone());
    }

    /// Current state of the run
    pub async fn snapshot(&self) -> StepRun {
        self.inner.read().await.clone()
    }

    /// Declare a fresh run; prior step state is discarded wholesale.
    pub async fn set_steps(&self, specs: Vec<StepSpec>) {
        let mut run = self.inner.write().await;
        run.set_steps(specs);
        self.publish(&run);
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        let mut run = self.inner.write().await;
        run.set_title(title);
        self.publish(&run);
    }

    pub async fn set_open(&self, open: bool) {
        let mut run = self.inner.write().await;
        run.set_open(open);
        self.publish(&run);
    }

    pub async fn advance(&self, id: &str) -> Result<(), EngineError> {
        let mut run = self.inner.write().await;
        run.advance(id)?;
        debug!(step = id, run_id = %run.run_id, "step active");
        self.publish(&run);
        Ok(())
    }

    pub async fn complete(&self, id: &str) -> Result<(), EngineError> {
        let mut run = self.inner.write().await;
        run.complete(id)?;
        debug!(step = id, run_id = %run.run_id, "step completed");
        self.publish(&run);
        Ok(())
    }

    pub async fn fail(&self, id: &str, message: impl Into<String>) -> Result<(), EngineError> {
        let mut run = self.inner.write().await;
        let message = message.into();
        run.fail(id, message.clone())?;
        debug!(step = id, run_id = %run.run_id, error = %message, "step failed");
        self.publish(&run);
        Ok(())
    }

    /// Record `error` against `id` and hand the error back for propagation.
    /// The dialog stays open so the user can inspect the failing step.
    pub async fn fail_with(&self, id: &str, error: EngineError) -> EngineError {
        // A broken transition here must not mask the original failure.
        if let Err(transition_err) = self.fail(id, error.user_message()).await {
            debug!(step = id, error = %transition_err, "could not record step failure");
        }
        error
    }

    /// Leave the success state visible briefly, then close the dialog.
    pub async fn close_after(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.set_open(false).await;
    }
}

/// Activate `id`, run its external-call sequence under the cancel token,
/// and on failure record the decoded message against the step before
/// re-throwing. No later step runs after a failure.
pub async fn run_step<T, F>(
    progress: &StepProgress,
    cancel: &CancelToken,
    ctx: &crate::observability::FlowContext,
    id: &str,
    fut: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    progress.advance(id).await?;
    ctx.log_step(id);
    match cancel.guard(fut).await {
        Ok(value) => Ok(value),
        Err(error) => {
            ctx.log_step_failed(id, &error.user_message());
            Err(progress.fail_with(id, error).await)
        }
    }
}
