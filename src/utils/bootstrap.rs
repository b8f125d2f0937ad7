//! Bootstrap utilities for memimage binaries.

use std::future::Future;
use std::time::Duration;

use backon::Retryable;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;
use crate::utils::retry::connection_backoff;

/// Initialize tracing with the MEMIMAGE_LOG environment variable.
///
/// Defaults to "info" level if MEMIMAGE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect to a backing service with exponential backoff retry.
///
/// # Arguments
/// * `service_name` - Human-readable name for logging (e.g., "event store")
/// * `address` - Where the service lives, for logging
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connected client on success, or the last error once retries run out.
pub async fn connect_with_retry<T, E, F, Fut>(
    service_name: &str,
    address: &str,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = connect
        .retry(connection_backoff())
        .notify(|err: &E, dur: Duration| {
            warn!(
                service = %service_name,
                error = %err,
                delay = ?dur,
                "Connection failed, retrying"
            );
        })
        .await;

    match &result {
        Ok(_) => info!("Connected to {} at {}", service_name, address),
        Err(e) => error!("Failed to connect to {} at {}: {}", service_name, address, e),
    }
    result
}
