//! Optimistic commits with WATCH/MULTI/EXEC.

use async_trait::async_trait;
use deadpool_redis::Connection;
use tracing::{debug, info, warn};

use super::{RedisEventStore, RedisInner};
use crate::commit::{Commit, CommitResult, Conflict};
use crate::interfaces::{EventCommitter, Result, StoreError};
use crate::revision::{StoreRevision, StreamRevision};
use crate::storage::now_millis;

enum Attempt<E> {
    Done(CommitResult<E>),
    /// Another writer touched a watched key between WATCH and EXEC.
    Lost,
}

impl<E> RedisInner<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn attempt(
        &self,
        conn: &mut Connection,
        stream_id: &str,
        expected: StreamRevision,
        event: &E,
    ) -> Result<Attempt<E>> {
        let commits_key = self.keys.commits();
        let stream_key = self.keys.stream(stream_id);

        let _: () = redis::cmd("WATCH")
            .arg(commits_key)
            .arg(&stream_key)
            .query_async(&mut *conn)
            .await?;

        let (store_len, stream_len): (u64, u64) = redis::pipe()
            .cmd("HLEN")
            .arg(commits_key)
            .cmd("LLEN")
            .arg(&stream_key)
            .query_async(&mut *conn)
            .await?;
        let actual = StreamRevision::new(stream_len);

        if expected != actual {
            let _: () = redis::cmd("UNWATCH").query_async(&mut *conn).await?;

            if expected > actual {
                return Err(StoreError::InvalidRevision {
                    stream_id: stream_id.to_string(),
                    expected,
                    actual,
                });
            }

            let conflicting = self.read_stream_on(conn, stream_id, expected, actual).await?;
            info!(
                stream_id = %stream_id,
                expected = %expected,
                actual = %actual,
                "Commit conflict"
            );
            return Ok(Attempt::Done(CommitResult::Conflict(Conflict {
                stream_id: stream_id.to_string(),
                actual,
                expected,
                conflicting,
            })));
        }

        let commit = Commit::new(
            StoreRevision::new(store_len).next(),
            now_millis(),
            stream_id,
            actual.next(),
            vec![event.clone()],
        );
        let id = commit.store_revision.to_string();
        let payload = self.codec.encode(&commit)?;

        // Nil when a watched key changed and EXEC was aborted.
        let executed: Option<(i64, i64, i64)> = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(commits_key)
            .arg(&id)
            .arg(&payload)
            .cmd("RPUSH")
            .arg(&stream_key)
            .arg(&id)
            .cmd("PUBLISH")
            .arg(commits_key)
            .arg(&payload)
            .query_async(&mut *conn)
            .await?;

        match executed {
            Some(_) => {
                info!(
                    stream_id = %stream_id,
                    revision = %commit.store_revision,
                    stream_revision = %commit.stream_revision,
                    "Committed"
                );
                Ok(Attempt::Done(CommitResult::Commit(commit)))
            }
            None => Ok(Attempt::Lost),
        }
    }
}

#[async_trait]
impl<E> EventCommitter<E> for RedisEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn try_commit(
        &self,
        stream_id: &str,
        expected: StreamRevision,
        event: E,
    ) -> Result<CommitResult<E>> {
        let inner = &self.inner;
        inner.ensure_open()?;
        let mut conn = inner.connection().await?;
        let mut lost: u32 = 0;

        loop {
            let outcome = inner.attempt(&mut conn, stream_id, expected, &event).await;
            match outcome {
                Ok(Attempt::Done(result)) => return Ok(result),
                Ok(Attempt::Lost) => {
                    lost += 1;
                    if !inner.retry.should_retry(lost) {
                        warn!(
                            stream_id = %stream_id,
                            attempts = lost,
                            "Giving up on contended commit"
                        );
                        return Err(StoreError::Contention {
                            stream_id: stream_id.to_string(),
                            attempts: lost,
                        });
                    }
                    let delay = inner.retry.delay_for_attempt(lost);
                    debug!(
                        stream_id = %stream_id,
                        attempt = lost,
                        delay_ms = delay.as_millis() as u64,
                        "Lost commit race, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    // The pooled connection must not go back with keys still watched.
                    let _: redis::RedisResult<()> =
                        redis::cmd("UNWATCH").query_async(&mut conn).await;
                    return Err(e);
                }
            }
        }
    }
}
