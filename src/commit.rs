//! Commit and conflict records.

use crate::revision::{StoreRevision, StreamRevision};

/// One successfully appended batch of events.
///
/// `stream_revision` is the stream's revision after this commit was applied.
/// Commits are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit<E> {
    pub store_revision: StoreRevision,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub stream_id: String,
    pub stream_revision: StreamRevision,
    pub events: Vec<E>,
}

impl<E> Commit<E> {
    pub fn new(
        store_revision: StoreRevision,
        timestamp: i64,
        stream_id: impl Into<String>,
        stream_revision: StreamRevision,
        events: Vec<E>,
    ) -> Self {
        Self {
            store_revision,
            timestamp,
            stream_id: stream_id.into(),
            stream_revision,
            events,
        }
    }

    /// Pair every event with the stream revision of this commit.
    pub fn events_with_revision(&self) -> impl Iterator<Item = (&E, StreamRevision)> + '_ {
        self.events.iter().map(move |e| (e, self.stream_revision))
    }
}

/// Outcome of a conditional append whose expected revision was stale.
///
/// `conflicting` holds every commit on the stream after `expected`, so the
/// caller can diff against what it knew before deciding to retry or merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict<E> {
    pub stream_id: String,
    pub actual: StreamRevision,
    pub expected: StreamRevision,
    pub conflicting: Vec<Commit<E>>,
}

/// Exactly one outcome per append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult<E> {
    Conflict(Conflict<E>),
    Commit(Commit<E>),
}

impl<E> CommitResult<E> {
    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn commit(&self) -> Option<&Commit<E>> {
        match self {
            Self::Commit(c) => Some(c),
            Self::Conflict(_) => None,
        }
    }

    pub fn conflict(&self) -> Option<&Conflict<E>> {
        match self {
            Self::Conflict(c) => Some(c),
            Self::Commit(_) => None,
        }
    }

    pub fn into_commit(self) -> Option<Commit<E>> {
        match self {
            Self::Commit(c) => Some(c),
            Self::Conflict(_) => None,
        }
    }

    pub fn into_conflict(self) -> Option<Conflict<E>> {
        match self {
            Self::Conflict(c) => Some(c),
            Self::Commit(_) => None,
        }
    }
}

impl<E> From<Commit<E>> for CommitResult<E> {
    fn from(commit: Commit<E>) -> Self {
        Self::Commit(commit)
    }
}

impl<E> From<Conflict<E>> for CommitResult<E> {
    fn from(conflict: Conflict<E>) -> Self {
        Self::Conflict(conflict)
    }
}
