//! Event store interface and the errors shared by every contract.

use async_trait::async_trait;

use crate::codec::CodecError;
use crate::interfaces::{CommitPublisher, CommitReader, EventCommitter};
use crate::revision::StreamRevision;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// A stale expected revision is not an error: it comes back as
/// `CommitResult::Conflict`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(
        "expected revision {expected} greater than actual revision {actual} for stream {stream_id}"
    )]
    InvalidRevision {
        stream_id: String,
        expected: StreamRevision,
        actual: StreamRevision,
    },

    #[error("Gave up committing to stream {stream_id} after {attempts} contended attempts")]
    Contention { stream_id: String, attempts: u32 },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Commit {0} is referenced but missing from the log")]
    MissingCommit(String),

    #[error("Subscription lost its connection")]
    Disconnected,

    #[error("Event store is closed")]
    Closed,

    #[error("Listener failed: {0}")]
    Listener(String),
}

/// An append-only commit log: reader, committer and publisher over one
/// backing store.
///
/// Implementations:
/// - `InMemoryEventStore`: process-local log for tests and default startup
/// - `RedisEventStore`: durable log using WATCH/MULTI/EXEC and pub/sub
#[async_trait]
pub trait EventStore<E>: CommitReader<E> + EventCommitter<E> + CommitPublisher<E> {
    /// Stop every subscription and release pooled connections.
    ///
    /// Later commits and subscriptions fail with `StoreError::Closed`.
    async fn close(&self) -> Result<()>;
}
