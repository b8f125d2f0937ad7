//! memimage - event-sourced commit log with a live in-memory image
//!
//! An append-only log of commits with per-stream optimistic concurrency,
//! an ordered gap-free subscription feed, and a memory image that folds
//! the feed into domain state readers can take without locking.
//!
//! Two backends implement the same contracts: a process-local log and a
//! Redis log shared by every process using the same namespace.

pub mod codec;
pub mod commit;
pub mod config;
pub mod image;
pub mod interfaces;
pub mod posts;
pub mod revision;
pub mod storage;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use commit::{Commit, CommitResult, Conflict};
pub use image::{MemoryImage, Snapshot};
pub use interfaces::{
    CommitListener, CommitPublisher, CommitReader, EventCommitter, EventStore, StoreError,
    Subscription,
};
pub use revision::{StoreRevision, StreamRevision};
