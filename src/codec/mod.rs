//! Wire codec for commits.
//!
//! A commit is persisted and published as a JSON object:
//!
//! ```text
//! {"storeRevision": 3, "timestamp": 1700000000000, "streamId": "...",
//!  "streamRevision": 1, "events": [{"@type": "events.PostAdded", ...}]}
//! ```
//!
//! Events carry their own `"@type"` discriminator through their serde
//! representation, so the codec stays generic over the event type.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::revision::{StoreRevision, StreamRevision};

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while encoding or decoding a commit record.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Commit record has no events")]
    EmptyEvents,

    #[error("Commit record has zero {field}")]
    InvalidRevision { field: &'static str },
}

/// Bidirectional mapping between a commit and its wire form.
pub trait CommitCodec<E>: Send + Sync {
    fn encode(&self, commit: &Commit<E>) -> Result<String>;
    fn decode(&self, data: &str) -> Result<Commit<E>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRecordRef<'a, E> {
    store_revision: StoreRevision,
    timestamp: i64,
    stream_id: &'a str,
    stream_revision: StreamRevision,
    events: &'a [E],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRecord<E> {
    store_revision: StoreRevision,
    timestamp: i64,
    stream_id: String,
    stream_revision: StreamRevision,
    events: Vec<E>,
}

/// JSON codec for any serde-representable event type.
pub struct JsonCodec<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E> JsonCodec<E> {
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for JsonCodec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> CommitCodec<E> for JsonCodec<E>
where
    E: Serialize + DeserializeOwned,
{
    fn encode(&self, commit: &Commit<E>) -> Result<String> {
        let record = CommitRecordRef {
            store_revision: commit.store_revision,
            timestamp: commit.timestamp,
            stream_id: &commit.stream_id,
            stream_revision: commit.stream_revision,
            events: &commit.events,
        };
        Ok(serde_json::to_string(&record)?)
    }

    fn decode(&self, data: &str) -> Result<Commit<E>> {
        let record: CommitRecord<E> = serde_json::from_str(data)?;

        if record.events.is_empty() {
            return Err(CodecError::EmptyEvents);
        }
        if record.store_revision == StoreRevision::INITIAL {
            return Err(CodecError::InvalidRevision {
                field: "storeRevision",
            });
        }
        if record.stream_revision == StreamRevision::INITIAL {
            return Err(CodecError::InvalidRevision {
                field: "streamRevision",
            });
        }

        Ok(Commit {
            store_revision: record.store_revision,
            timestamp: record.timestamp,
            stream_id: record.stream_id,
            stream_revision: record.stream_revision,
            events: record.events,
        })
    }
}
