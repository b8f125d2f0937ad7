//! In-process commit log.
//!
//! One `RwLock` guards the whole log, so appends are serialized and reads see
//! a consistent prefix. Live commits fan out through a tokio broadcast
//! channel; a subscriber that lags behind the channel re-reads the gap from
//! the log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commit::{Commit, CommitResult, Conflict};
use crate::interfaces::{
    Cancellation, CommitListener, CommitPublisher, CommitReader, EventCommitter, EventStore,
    Result, StoreError, Subscription,
};
use crate::revision::{StoreRevision, StreamRevision};
use crate::storage::cursor::Cursor;
use crate::storage::now_millis;

/// Live commits buffered per subscriber before it is considered lagging.
const CHANNEL_CAPACITY: usize = 1024;

struct Log<E> {
    commits: Vec<Commit<E>>,
    /// Indexes into `commits`, per stream, in stream revision order.
    streams: HashMap<String, Vec<usize>>,
}

impl<E: Clone> Log<E> {
    fn store_revision(&self) -> StoreRevision {
        StoreRevision::new(self.commits.len() as u64)
    }

    fn stream_revision(&self, stream_id: &str) -> StreamRevision {
        StreamRevision::new(self.streams.get(stream_id).map_or(0, |s| s.len() as u64))
    }

    fn read_commits(&self, since: StoreRevision, to: StoreRevision) -> Vec<Commit<E>> {
        let (from, until) = bounds(since.value(), to.value(), self.commits.len());
        self.commits[from..until].to_vec()
    }

    fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Vec<Commit<E>> {
        let Some(indexes) = self.streams.get(stream_id) else {
            return Vec::new();
        };
        let (from, until) = bounds(since.value(), to.value(), indexes.len());
        indexes[from..until]
            .iter()
            .map(|&i| self.commits[i].clone())
            .collect()
    }

    fn append(&mut self, stream_id: &str, event: E) -> Commit<E> {
        let commit = Commit::new(
            self.store_revision().next(),
            now_millis(),
            stream_id,
            self.stream_revision(stream_id).next(),
            vec![event],
        );
        self.streams
            .entry(stream_id.to_string())
            .or_default()
            .push(self.commits.len());
        self.commits.push(commit.clone());
        commit
    }
}

/// Slice bounds for revisions in `(since, to]` over `len` one-based entries.
fn bounds(since: u64, to: u64, len: usize) -> (usize, usize) {
    let until = usize::try_from(to).unwrap_or(usize::MAX).min(len);
    let from = usize::try_from(since).unwrap_or(usize::MAX).min(until);
    (from, until)
}

struct Shared<E> {
    log: RwLock<Log<E>>,
    sender: broadcast::Sender<Arc<Commit<E>>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

#[async_trait]
impl<E> CommitReader<E> for Shared<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn store_revision(&self) -> Result<StoreRevision> {
        Ok(self.log.read().await.store_revision())
    }

    async fn read_commits(

        &self,

        since: StoreRevision,

        to: StoreRevision,

    ) -> Result<Vec<Commit<E>>> {
        Ok(self.log.read().await.read_commits(since, to))
    }

    async fn stream_revision(&self, stream_id: &str) -> Result<StreamRevision> {
        Ok(self.log.read().await.stream_revision(stream_id))
    }

    async fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>> {
        Ok(self.log.read().await.read_stream(stream_id, since, to))
    }
}

/// Event store that keeps its log in process memory.
///
/// Cloning is cheap and every clone shares the same log.
pub struct InMemoryEventStore<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for InMemoryEventStore<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E> Default for InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_log(Log {
            commits: Vec::new(),
            streams: HashMap::new(),
        })
    }

    /// Build a store whose log already holds one commit per `(stream_id, event)`,
    /// each appended at its stream's current revision.
    pub fn from_history<I, S>(history: I) -> Self
    where
        I: IntoIterator<Item = (S, E)>,
        S: AsRef<str>,
    {
        let mut log = Log {
            commits: Vec::new(),
            streams: HashMap::new(),
        };
        for (stream_id, event) in history {
            log.append(stream_id.as_ref(), event);
        }
        info!(commits = log.commits.len(), "In-memory event store seeded");
        Self::with_log(log)
    }

    fn with_log(log: Log<E>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                log: RwLock::new(log),
                sender,
                shutdown,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A reader over this store's log.
    pub fn reader(&self) -> Arc<dyn CommitReader<E>> {
        self.shared.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl<E> CommitReader<E> for InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn store_revision(&self) -> Result<StoreRevision> {
        self.shared.store_revision().await
    }

    async fn read_commits(

        &self,

        since: StoreRevision,

        to: StoreRevision,

    ) -> Result<Vec<Commit<E>>> {
        self.shared.read_commits(since, to).await
    }

    async fn stream_revision(&self, stream_id: &str) -> Result<StreamRevision> {
        self.shared.stream_revision(stream_id).await
    }

    async fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>> {
        self.shared.read_stream(stream_id, since, to).await
    }
}

#[async_trait]
impl<E> EventCommitter<E> for InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn try_commit(
        &self,
        stream_id: &str,
        expected: StreamRevision,
        event: E,
    ) -> Result<CommitResult<E>> {
        self.ensure_open()?;

        let mut log = self.shared.log.write().await;
        let actual = log.stream_revision(stream_id);

        if expected > actual {
            return Err(StoreError::InvalidRevision {
                stream_id: stream_id.to_string(),
                expected,
                actual,
            });
        }

        if expected < actual {
            let conflicting = log.read_stream(stream_id, expected, actual);
            info!(
                stream_id = %stream_id,
                expected = %expected,
                actual = %actual,
                "Commit conflict"
            );
            return Ok(CommitResult::Conflict(Conflict {
                stream_id: stream_id.to_string(),
                actual,
                expected,
                conflicting,
            }));
        }

        let commit = log.append(stream_id, event);
        // Sent under the write lock so the channel order matches the log order.
        let receivers = self.shared.sender.send(Arc::new(commit.clone())).unwrap_or(0);
        info!(
            stream_id = %stream_id,
            revision = %commit.store_revision,
            stream_revision = %commit.stream_revision,
            receivers,
            "Committed"
        );
        Ok(CommitResult::Commit(commit))
    }
}

#[async_trait]
impl<E> CommitPublisher<E> for InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        since: StoreRevision,
        listener: Arc<dyn CommitListener<E>>,
    ) -> Result<Subscription> {
        self.ensure_open()?;

        // Attach to the live feed before reading history so nothing falls
        // between the two.
        let mut receiver = self.shared.sender.subscribe();
        let mut shutdown = Cancellation::from_receiver(self.shared.shutdown.subscribe());
        let (cancel, cancellation) = Cancellation::channel();
        let token = Uuid::new_v4().to_string();
        let mut cursor = Cursor::new(since, self.reader(), listener, cancellation.clone());

        info!(token = %token, since = %since, "Subscription started");

        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut cancellation = cancellation;
            if let Err(e) = cursor.sync().await {
                error!(token = %task_token, error = %e, "Subscription catch-up failed");
                return;
            }

            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(commit) => {
                            if let Err(e) = cursor.offer(commit).await {
                                error!(
                                    token = %task_token,
                                    error = %e,
                                    "Subscription delivery failed"
                                );
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(
                                token = %task_token,
                                skipped,
                                "Subscriber lagged, reading gap from log"
                            );
                            if let Err(e) = cursor.sync().await {
                                error!(
                                    token = %task_token,
                                    error = %e,
                                    "Subscription catch-up failed"
                                );
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }

            info!(token = %task_token, last = %cursor.last(), "Subscription stopped");
        });

        Ok(Subscription::new(token, cancel, task))
    }
}

#[async_trait]
impl<E> EventStore<E> for InMemoryEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            debug!("In-memory event store already closed");
            return Ok(());
        }
        self.shared.shutdown.send_replace(true);
        info!("In-memory event store closed");
        Ok(())
    }
}
