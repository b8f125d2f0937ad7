//! Memory image: domain state kept current by folding the commit feed.
//!
//! One subscription callback is the only writer. It folds each commit into
//! a copy of the current state and publishes the result through a
//! `tokio::sync::watch` channel, so readers always see a complete snapshot
//! and never wait on a fold in progress.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::commit::{Commit, CommitResult};
use crate::interfaces::{
    CommitListener, EventCommitter, EventStore, Result, StoreError, Subscription,
};
use crate::revision::{StoreRevision, StreamRevision};

/// State as of a given store revision.
#[derive(Debug)]
pub struct Snapshot<S> {
    pub state: Arc<S>,
    /// Revision of the last commit folded into `state`.
    pub revision: StoreRevision,
}

impl<S> Clone for Snapshot<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            revision: self.revision,
        }
    }
}

type Fold<S, E> = dyn Fn(&S, &Commit<E>) -> S + Send + Sync;

struct Projection<S, E> {
    fold: Box<Fold<S, E>>,
    update: Mutex<()>,
    snapshots: watch::Sender<Snapshot<S>>,
}

#[async_trait]
impl<S, E> CommitListener<E> for Projection<S, E>
where
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn on_commit(&self, commit: Arc<Commit<E>>) -> Result<()> {
        let _guard = self.update.lock().await;
        let current = self.snapshots.borrow().clone();
        let state = (self.fold)(&current.state, &commit);
        self.snapshots.send_replace(Snapshot {
            state: Arc::new(state),
            revision: commit.store_revision,
        });
        debug!(
            revision = %commit.store_revision,
            stream_id = %commit.stream_id,
            "Memory image updated"
        );
        Ok(())
    }
}

/// Continuously updated projection of a store.
///
/// Commits go straight through to the store; the image only changes once
/// the store delivers the resulting commit back through its subscription.
pub struct MemoryImage<S, E> {
    store: Arc<dyn EventStore<E>>,
    snapshots: watch::Receiver<Snapshot<S>>,
    subscription: Subscription,
}

impl<S, E> MemoryImage<S, E>
where
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Subscribe to `store` from the beginning of its log and fold every
    /// commit into `initial` with `fold`.
    pub async fn new<F>(store: Arc<dyn EventStore<E>>, initial: S, fold: F) -> Result<Self>
    where
        F: Fn(&S, &Commit<E>) -> S + Send + Sync + 'static,
    {
        let (sender, snapshots) = watch::channel(Snapshot {
            state: Arc::new(initial),
            revision: StoreRevision::INITIAL,
        });
        let projection = Arc::new(Projection {
            fold: Box::new(fold),
            update: Mutex::new(()),
            snapshots: sender,
        });

        let subscription = store.subscribe(StoreRevision::INITIAL, projection).await?;
        info!(token = %subscription.token(), "Memory image subscribed");

        Ok(Self {
            store,
            snapshots,
            subscription,
        })
    }

    /// The latest published state.
    pub fn get(&self) -> Arc<S> {
        self.snapshots.borrow().state.clone()
    }

    pub fn snapshot(&self) -> Snapshot<S> {
        self.snapshots.borrow().clone()
    }

    pub fn revision(&self) -> StoreRevision {
        self.snapshots.borrow().revision
    }

    /// Wait until the image reflects at least `revision`.
    ///
    /// Fails with `StoreError::Closed` if the feed ends first.
    pub async fn wait_for(&self, revision: StoreRevision) -> Result<Snapshot<S>> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.revision >= revision)
            .await
            .map_err(|_| StoreError::Closed)?
            .clone();
        Ok(snapshot)
    }

    /// A receiver notified on every published snapshot.
    pub fn changes(&self) -> watch::Receiver<Snapshot<S>> {
        self.snapshots.clone()
    }

    pub fn store(&self) -> &Arc<dyn EventStore<E>> {
        &self.store
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

#[async_trait]
impl<S, E> EventCommitter<E> for MemoryImage<S, E>
where
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    async fn try_commit(
        &self,
        stream_id: &str,
        expected: StreamRevision,
        event: E,
    ) -> Result<CommitResult<E>> {
        self.store.try_commit(stream_id, expected, event).await
    }
}

impl<S, E> Drop for MemoryImage<S, E> {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
