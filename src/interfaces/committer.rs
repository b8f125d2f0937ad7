//! Conditional append.

use async_trait::async_trait;

use crate::commit::CommitResult;
use crate::interfaces::Result;
use crate::revision::StreamRevision;

/// The single mutating operation on a log.
#[async_trait]
pub trait EventCommitter<E>: Send + Sync {
    /// Append `event` to `stream_id` only if the stream is at `expected`.
    ///
    /// - `expected == actual`: returns `CommitResult::Commit` at `actual.next()`.
    /// - `expected < actual`: returns `CommitResult::Conflict` carrying every
    ///   commit after `expected`. The log is untouched.
    /// - `expected > actual`: fails with `StoreError::InvalidRevision`.
    async fn try_commit(
        &self,
        stream_id: &str,
        expected: StreamRevision,
        event: E,
    ) -> Result<CommitResult<E>>;
}
