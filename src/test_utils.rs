//! Test utilities.
//!
//! Listeners that record deliveries and builders for post events, shared by
//! unit tests and the backend contract tests under `tests/`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::commit::Commit;
use crate::interfaces::{CommitListener, Result, StoreError};
use crate::posts::{PostContent, PostEvent, PostId};

/// How long `collect` waits for each delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards every delivered commit to an unbounded channel.
pub struct ChannelListener<E> {
    sender: mpsc::UnboundedSender<Arc<Commit<E>>>,
}

impl<E> ChannelListener<E>
where
    E: Send + Sync + 'static,
{
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Arc<Commit<E>>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl<E> CommitListener<E> for ChannelListener<E>
where
    E: Send + Sync + 'static,
{
    async fn on_commit(&self, commit: Arc<Commit<E>>) -> Result<()> {
        // A dropped receiver just means the test stopped listening.
        let _ = self.sender.send(commit);
        Ok(())
    }
}

/// Fails on the `fail_at`-th delivery (1-based) and counts every call.
pub struct FailingListener {
    fail_at: usize,
    calls: AtomicUsize,
}

impl FailingListener {
    pub fn new(fail_at: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_at,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E> CommitListener<E> for FailingListener
where
    E: Send + Sync + 'static,
{
    async fn on_commit(&self, commit: Arc<Commit<E>>) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_at {
            return Err(StoreError::Listener(format!(
                "refused commit {}",
                commit.store_revision
            )));
        }
        Ok(())
    }
}

/// Receive exactly `n` commits, panicking if any takes longer than
/// `DELIVERY_TIMEOUT`.
pub async fn collect<E>(
    receiver: &mut mpsc::UnboundedReceiver<Arc<Commit<E>>>,
    n: usize,
) -> Vec<Arc<Commit<E>>> {
    let mut received = Vec::with_capacity(n);
    for i in 0..n {
        match tokio::time::timeout(DELIVERY_TIMEOUT, receiver.recv()).await {
            Ok(Some(commit)) => received.push(commit),
            Ok(None) => panic!("listener channel closed after {} of {} commits", i, n),
            Err(_) => panic!("timed out waiting for commit {} of {}", i + 1, n),
        }
    }
    received
}

/// Assert that nothing arrives within `wait`.
pub async fn assert_quiet<E>(receiver: &mut mpsc::UnboundedReceiver<Arc<Commit<E>>>, wait: Duration)
where
    E: std::fmt::Debug,
{
    if let Ok(Some(commit)) = tokio::time::timeout(wait, receiver.recv()).await {
        panic!("unexpected delivery: {:?}", commit);
    }
}

pub fn post_added(author: &str, title: &str, body: &str) -> PostEvent {
    post_added_with_id(PostId::generate(), author, title, body)
}

pub fn post_added_with_id(id: PostId, author: &str, title: &str, body: &str) -> PostEvent {
    PostEvent::PostAdded {
        post_id: id,
        content: PostContent::new(author, title, body),
    }
}

pub fn post_edited(id: PostId, author: &str, title: &str, body: &str) -> PostEvent {
    PostEvent::PostEdited {
        post_id: id,
        content: PostContent::new(author, title, body),
    }
}

pub fn post_deleted(id: PostId) -> PostEvent {
    PostEvent::PostDeleted { post_id: id }
}
