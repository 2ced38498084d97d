//! Deferred actions tied to the service lifetime
//!
//! [`Scheduler`] runs delayed work that is dropped when the service shuts
//! down. [`Debounce`] folds a burst of triggers into one firing after a
//! quiet period.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spawns delayed tasks that share one cancellation token
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    token: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless cancelled first
    pub fn schedule<F>(&self, delay: Duration, action: F) -> DeferredTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.child_token();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    tracing::trace!("Deferred action cancelled");
                }
                _ = tokio::time::sleep(delay) => action.await,
            }
        });
        DeferredTask { token, handle }
    }

    /// Cancel every pending and future action
    pub fn cancel_all(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled together with this scheduler
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Handle to one scheduled action
#[derive(Debug)]
pub struct DeferredTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DeferredTask {
    /// Cancel this action only
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the action ran or was cancelled
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!("Deferred action failed: {}", e);
        }
    }
}

/// Trailing-edge debounce for use inside a `select!` loop
#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Start or restart the quiet period
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve once the quiet period after the last trigger has passed.
    /// Never resolves while nothing is pending.
    pub async fn elapsed(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
