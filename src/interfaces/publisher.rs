//! Live, ordered, gap-free commit feed with historical catch-up.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tracing::error;

use crate::commit::Commit;
use crate::interfaces::{Result, StoreError};
use crate::revision::StoreRevision;

/// Receives commits from a subscription.
///
/// Called from the subscription's background task, one commit at a time,
/// in strictly increasing store revision. An error terminates the
/// subscription.
#[async_trait]
pub trait CommitListener<E>: Send + Sync {
    async fn on_commit(&self, commit: Arc<Commit<E>>) -> Result<()>;
}

/// Interface for subscribing to committed records.
#[async_trait]
pub trait CommitPublisher<E>: Send + Sync {
    /// Deliver every commit after `since` to `listener`: first the history
    /// already in the log, then live commits, each exactly once and in order.
    async fn subscribe(
        &self,
        since: StoreRevision,
        listener: Arc<dyn CommitListener<E>>,
    ) -> Result<Subscription>;
}

/// Level-triggered stop signal observed by background loops.
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// Create a signal and the sender that raises it.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised.
    ///
    /// A dropped sender never raises the signal, so this stays pending.
    pub async fn cancelled(&mut self) {
        let raised = self.rx.wait_for(|c| *c).await.is_ok();
        if !raised {
            std::future::pending::<()>().await;
        }
    }
}

/// Handle on one listener's position in the feed.
///
/// Dropping the handle detaches it; the subscription keeps running until
/// `cancel` is called or the store closes.
#[derive(Debug)]
pub struct Subscription {
    token: String,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(token: String, cancel: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            token,
            cancel,
            task,
        }
    }

    /// Unique token identifying this subscription on the backing store.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stop delivery. Observed on the next loop iteration; a delivery
    /// already in flight completes.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// True once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the background task to exit.
    ///
    /// A task that panicked, typically inside its listener, is reported as
    /// `StoreError::Listener`.
    pub async fn join(self) -> Result<()> {
        self.task.await.map_err(|e| {
            error!(token = %self.token, error = %e, "Subscription task failed");
            StoreError::Listener(e.to_string())
        })
    }
}
