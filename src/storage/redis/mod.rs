//! Redis event store.
//!
//! Layout under the configured namespace `name`:
//! - `{name}:commits`: hash of commit id (decimal store revision) to the
//!   JSON-encoded commit. The hash length is the store revision.
//! - `{name}:stream:{id}`: list of commit ids of one stream. The list length
//!   is the stream revision.
//! - `{name}:commits` (channel): every new commit, published inside the
//!   same transaction that stores it.
//! - `{name}:control` (channel): tokens that stop subscriptions.
//!
//! Commits use optimistic concurrency: WATCH both keys, check the stream
//! length, then write in MULTI/EXEC. A lost race is retried with linear
//! backoff; a stale expected revision comes back as a conflict.

mod committer;
mod keys;
mod publisher;
mod reader;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::CommitCodec;
use crate::config::RedisConfig;
use crate::interfaces::{CommitReader, EventStore, Result, StoreError};
use crate::utils::retry::RetryConfig;

use keys::Keys;

pub(crate) struct RedisInner<E> {
    pool: Pool,
    /// Pub/sub needs a dedicated connection per subscription.
    client: redis::Client,
    keys: Keys,
    codec: Arc<dyn CommitCodec<E>>,
    retry: RetryConfig,
    close_token: String,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl<E> RedisInner<E> {
    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn publish_control(&self, token: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let receivers: i64 = conn.publish(self.keys.control(), token).await?;
        debug!(token = %token, receivers, "Published control token");
        Ok(())
    }
}

/// Event store backed by a Redis server, shared by every process that uses
/// the same namespace.
pub struct RedisEventStore<E> {
    inner: Arc<RedisInner<E>>,
}

impl<E> Clone for RedisEventStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> RedisEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Connect to the server described by `config` and verify it answers.
    pub async fn connect(config: &RedisConfig, codec: Arc<dyn CommitCodec<E>>) -> Result<Self> {
        let url = config.url();
        let mut pool_config = deadpool_redis::Config::from_url(url.clone());
        pool_config.pool = Some(PoolConfig::new(config.pool_size.max(1)));
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let client = redis::Client::open(url.as_str())?;

        let (shutdown, _) = watch::channel(false);
        let inner = RedisInner {
            pool,
            client,
            keys: Keys::new(&config.name),
            codec,
            retry: config.retry.clone(),
            close_token: Uuid::new_v4().to_string(),
            closed: AtomicBool::new(false),
            shutdown,
        };

        let mut conn = inner.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(url = %url, name = %config.name, "Connected to Redis");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// A reader over this store's log.
    pub fn reader(&self) -> Arc<dyn CommitReader<E>> {
        self.inner.clone()
    }

    /// Stop the subscription holding `token`, in whichever process it runs.
    pub async fn unsubscribe(&self, token: &str) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.publish_control(token).await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<E> EventStore<E> for RedisEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Redis event store already closed");
            return Ok(());
        }
        self.inner.shutdown.send_replace(true);
        let published = self.inner.publish_control(&self.inner.close_token).await;
        self.inner.pool.close();
        info!(channel = %self.inner.keys.control(), "Redis event store closed");
        published
    }
}
