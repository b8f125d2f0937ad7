//! Event store implementations.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::{EventStore, Result};

pub(crate) mod cursor;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::InMemoryEventStore;

#[cfg(feature = "redis")]
pub use redis::RedisEventStore;

/// Wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Initialize the event store selected by configuration.
///
/// Redis stores persist commits with the JSON codec.
pub async fn init_store<E>(config: &StorageConfig) -> Result<Arc<dyn EventStore<E>>>
where
    E: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    info!("Storage: {}", config.describe());

    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(InMemoryEventStore::<E>::new())),
        #[cfg(feature = "redis")]
        StorageType::Redis => {
            let codec = Arc::new(crate::codec::JsonCodec::<E>::new());
            let store = RedisEventStore::connect(&config.redis, codec).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StorageType::Redis => {
            tracing::error!("Redis storage requested but 'redis' feature is not enabled");
            Err(crate::interfaces::StoreError::Pool(
                "redis feature not enabled".to_string(),
            ))
        }
    }
}
