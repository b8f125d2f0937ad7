//! Read-only queries over the commit log.

use async_trait::async_trait;

use crate::commit::Commit;
use crate::interfaces::Result;
use crate::revision::{StoreRevision, StreamRevision};

/// Snapshot-consistent reads over the log and per-stream slices.
#[async_trait]
pub trait CommitReader<E>: Send + Sync {
    /// Current global length of the log.
    async fn store_revision(&self) -> Result<StoreRevision>;

    /// Commits with `since < store_revision <= to`, ascending.
    async fn read_commits(&self, since: StoreRevision, to: StoreRevision)
        -> Result<Vec<Commit<E>>>;

    /// Current length of a stream; zero if it never existed.
    async fn stream_revision(&self, stream_id: &str) -> Result<StreamRevision>;

    /// Commits of one stream with `since < stream_revision <= to`, ascending.
    async fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>>;
}

/// Read a whole stream.
pub async fn read_stream_all<E, R>(reader: &R, stream_id: &str) -> Result<Vec<Commit<E>>>
where
    R: CommitReader<E> + ?Sized,
{
    reader
        .read_stream(stream_id, StreamRevision::INITIAL, StreamRevision::MAXIMUM)
        .await
}
