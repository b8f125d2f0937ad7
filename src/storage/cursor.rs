//! Ordered delivery shared by every subscription.
//!
//! A cursor remembers the last store revision handed to its listener. Both
//! history replay and live notifications go through `offer`/`catch_up`, so a
//! commit is delivered exactly once and in order whichever path it took:
//!
//! - revision == last + 1: delivered directly
//! - revision >  last + 1: a notification was missed; the gap is read back
//!   from the log and delivered as a range
//! - revision <= last: stale or duplicate, dropped

use std::sync::Arc;

use tracing::{debug, warn};

use crate::commit::Commit;
use crate::interfaces::{Cancellation, CommitListener, CommitReader, Result};
use crate::revision::StoreRevision;

pub(crate) struct Cursor<E> {
    last: StoreRevision,
    reader: Arc<dyn CommitReader<E>>,
    listener: Arc<dyn CommitListener<E>>,
    cancellation: Cancellation,
}

impl<E> Cursor<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) fn new(
        since: StoreRevision,
        reader: Arc<dyn CommitReader<E>>,
        listener: Arc<dyn CommitListener<E>>,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            last: since,
            reader,
            listener,
            cancellation,
        }
    }

    pub(crate) fn last(&self) -> StoreRevision {
        self.last
    }

    /// Bring the cursor up to the log's current revision.
    ///
    /// A position beyond the log is clamped down to it.
    pub(crate) async fn sync(&mut self) -> Result<()> {
        let current = self.reader.store_revision().await?;
        if self.last > current {
            warn!(
                last = %self.last,
                current = %current,
                "Subscription position is in the future, resetting it to current"
            );
            self.last = current;
            return Ok(());
        }
        self.catch_up(current).await
    }

    /// Read and deliver every commit in `(last, to]`.
    pub(crate) async fn catch_up(&mut self, to: StoreRevision) -> Result<()> {
        if self.last >= to {
            return Ok(());
        }
        let commits = self.reader.read_commits(self.last, to).await?;
        debug!(from = %self.last, to = %to, count = commits.len(), "Catching up");

        for commit in commits {
            if self.cancellation.is_cancelled() {
                break;
            }
            if commit.store_revision != self.last.next() {
                warn!(
                    expected = %self.last.next(),
                    actual = %commit.store_revision,
                    "Catch-up read returned out-of-order commit, skipping"
                );
                continue;
            }
            self.deliver(Arc::new(commit)).await?;
        }
        Ok(())
    }

    /// Offer a live commit.
    pub(crate) async fn offer(&mut self, commit: Arc<Commit<E>>) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Ok(());
        }
        let expected = self.last.next();
        if commit.store_revision == expected {
            self.deliver(commit).await
        } else if commit.store_revision > expected {
            self.catch_up(commit.store_revision).await
        } else {
            debug!(
                revision = %commit.store_revision,
                last = %self.last,
                "Dropping stale commit"
            );
            Ok(())
        }
    }

    async fn deliver(&mut self, commit: Arc<Commit<E>>) -> Result<()> {
        let revision = commit.store_revision;
        self.listener.on_commit(commit).await?;
        self.last = revision;
        Ok(())
    }
}
