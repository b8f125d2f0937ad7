//! Reads over the Redis log.

use async_trait::async_trait;
use deadpool_redis::Connection;

use super::keys::FETCH_CHUNK;
use super::{RedisEventStore, RedisInner};
use crate::commit::Commit;
use crate::interfaces::{CommitReader, Result, StoreError};
use crate::revision::{StoreRevision, StreamRevision};

impl<E> RedisInner<E> {
    /// Fetch and decode commits by id, preserving the order of `ids`.
    pub(super) async fn fetch(
        &self,
        conn: &mut Connection,
        ids: &[String],
    ) -> Result<Vec<Commit<E>>> {
        let mut commits = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(FETCH_CHUNK) {
            let payloads: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(self.keys.commits())
                .arg(chunk)
                .query_async(conn)
                .await?;
            for (id, payload) in chunk.iter().zip(payloads) {
                let payload = payload.ok_or_else(|| StoreError::MissingCommit(id.clone()))?;
                commits.push(self.codec.decode(&payload)?);
            }
        }
        Ok(commits)
    }

    pub(super) async fn stream_revision_on(
        &self,
        conn: &mut Connection,
        stream_id: &str,
    ) -> Result<StreamRevision> {
        let len: u64 = redis::cmd("LLEN")
            .arg(self.keys.stream(stream_id))
            .query_async(conn)
            .await?;
        Ok(StreamRevision::new(len))
    }

    pub(super) async fn read_stream_on(
        &self,
        conn: &mut Connection,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>> {
        if since >= to {
            return Ok(Vec::new());
        }
        // LRANGE bounds are zero-based and inclusive.
        let start = i64::try_from(since.value()).unwrap_or(i64::MAX);
        let stop = i64::try_from(to.value() - 1).unwrap_or(-1);
        let ids: Vec<String> = redis::cmd("LRANGE")
            .arg(self.keys.stream(stream_id))
            .arg(start)
            .arg(stop)
            .query_async(conn)
            .await?;
        self.fetch(conn, &ids).await
    }
}

#[async_trait]
impl<E> CommitReader<E> for RedisInner<E>
where
    E: Send + Sync + 'static,
{
    async fn store_revision(&self) -> Result<StoreRevision> {
        let mut conn = self.connection().await?;
        let len: u64 = redis::cmd("HLEN")
            .arg(self.keys.commits())
            .query_async(&mut conn)
            .await?;
        Ok(StoreRevision::new(len))
    }

    async fn read_commits(

        &self,

        since: StoreRevision,

        to: StoreRevision,

    ) -> Result<Vec<Commit<E>>> {
        if since >= to {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let current: u64 = redis::cmd("HLEN")
            .arg(self.keys.commits())
            .query_async(&mut conn)
            .await?;
        let until = to.value().min(current);
        if since.value() >= until {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = (since.value() + 1..=until).map(|r| r.to_string()).collect();
        self.fetch(&mut conn, &ids).await
    }

    async fn stream_revision(&self, stream_id: &str) -> Result<StreamRevision> {
        let mut conn = self.connection().await?;
        self.stream_revision_on(&mut conn, stream_id).await
    }

    async fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>> {
        let mut conn = self.connection().await?;
        self.read_stream_on(&mut conn, stream_id, since, to).await
    }
}

#[async_trait]
impl<E> CommitReader<E> for RedisEventStore<E>
where
    E: Send + Sync + 'static,
{
    async fn store_revision(&self) -> Result<StoreRevision> {
        self.inner.store_revision().await
    }

    async fn read_commits(

        &self,

        since: StoreRevision,

        to: StoreRevision,

    ) -> Result<Vec<Commit<E>>> {
        self.inner.read_commits(since, to).await
    }

    async fn stream_revision(&self, stream_id: &str) -> Result<StreamRevision> {
        self.inner.stream_revision(stream_id).await
    }

    async fn read_stream(
        &self,
        stream_id: &str,
        since: StreamRevision,
        to: StreamRevision,
    ) -> Result<Vec<Commit<E>>> {
        self.inner.read_stream(stream_id, since, to).await
    }
}
