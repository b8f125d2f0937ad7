//! Contracts over the commit log.
//!
//! These traits define:
//! - Reading the log and per-stream slices (`CommitReader`)
//! - Conditional append with optimistic concurrency (`EventCommitter`)
//! - Ordered live delivery with catch-up (`CommitPublisher`)
//! - The combination of all three over one backing store (`EventStore`)

pub mod committer;
pub mod event_store;
pub mod publisher;
pub mod reader;

pub use committer::EventCommitter;
pub use event_store::{EventStore, Result, StoreError};
pub use publisher::{Cancellation, CommitListener, CommitPublisher, Subscription};
pub use reader::{read_stream_all, CommitReader};
