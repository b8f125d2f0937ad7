//! Subscriptions over Redis pub/sub.
//!
//! Each subscription owns a pub/sub connection listening on the commit and
//! control channels. It attaches before replaying history, so commits
//! published during replay are buffered and then dropped as duplicates by
//! the cursor. A live commit that arrives ahead of the cursor triggers a
//! read of the gap from the hash. A record on the commit channel that
//! cannot be read or decoded ends the subscription.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::RedisEventStore;
use crate::codec::CommitCodec;
use crate::commit::Commit;
use crate::interfaces::{
    Cancellation, CommitListener, CommitPublisher, Result, StoreError, Subscription,
};
use crate::revision::StoreRevision;
use crate::storage::cursor::Cursor;

#[async_trait]
impl<E> CommitPublisher<E> for RedisEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        since: StoreRevision,
        listener: Arc<dyn CommitListener<E>>,
    ) -> Result<Subscription> {
        let inner = self.inner.clone();
        inner.ensure_open()?;

        let commits_channel = inner.keys.commits().to_string();
        let control_channel = inner.keys.control().to_string();

        let mut pubsub = inner.client.get_async_pubsub().await?;
        pubsub.subscribe(&control_channel).await?;
        pubsub.subscribe(&commits_channel).await?;

        let mut shutdown = Cancellation::from_receiver(inner.shutdown.subscribe());
        let (cancel, cancellation) = Cancellation::channel();
        let token = Uuid::new_v4().to_string();
        let mut cursor = Cursor::new(since, self.reader(), listener, cancellation.clone());

        info!(token = %token, since = %since, channel = %commits_channel, "Subscription started");

        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut cancellation = cancellation;
            let mut messages = Box::pin(pubsub.on_message());

            if let Err(e) = cursor.sync().await {
                error!(token = %task_token, error = %e, "Subscription catch-up failed");
                return;
            }

            loop {
                let message = tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                    message = messages.next() => message,
                };

                let Some(message) = message else {
                    error!(
                        token = %task_token,
                        error = %StoreError::Disconnected,
                        "Subscription ended"
                    );
                    break;
                };

                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        let e = StoreError::from(e);
                        error!(token = %task_token, error = %e, "Unreadable pub/sub payload");
                        break;
                    }
                };

                if message.get_channel_name() == control_channel {
                    if payload == task_token || payload == inner.close_token {
                        debug!(token = %task_token, "Stop requested on control channel");
                        break;
                    }
                    continue;
                }

                let commit = match live_commit(inner.codec.as_ref(), &payload) {
                    Ok(commit) => commit,
                    Err(e) => {
                        error!(token = %task_token, error = %e, "Malformed commit on channel");
                        break;
                    }
                };

                if let Err(e) = cursor.offer(commit).await {
                    error!(token = %task_token, error = %e, "Subscription delivery failed");
                    break;
                }
            }

            info!(token = %task_token, last = %cursor.last(), "Subscription stopped");
        });

        Ok(Subscription::new(token, cancel, task))
    }
}

/// Decode a record received on the commit channel.
fn live_commit<E>(codec: &dyn CommitCodec<E>, payload: &str) -> Result<Arc<Commit<E>>> {
    Ok(Arc::new(codec.decode(payload)?))
}
