//! Storage configuration types.

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Process-local log; nothing survives a restart.
    #[default]
    Memory,
    Redis,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Redis-specific configuration.
    pub redis: RedisConfig,
}

impl StorageConfig {
    /// Where the configured store lives, for logging.
    pub fn describe(&self) -> String {
        match self.storage_type {
            StorageType::Memory => "memory".to_string(),
            StorageType::Redis => format!("{} ({})", self.redis.url(), self.redis.name),
        }
    }
}

/// Redis-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Namespace prefix for every key and channel of this store.
    pub name: String,
    /// Maximum pooled connections shared by commits and reads.
    pub pool_size: usize,
    /// Retry policy for commits that lose a WATCH race.
    pub retry: RetryConfig,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            name: "blog".to_string(),
            pool_size: 8,
            retry: RetryConfig::default(),
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}
