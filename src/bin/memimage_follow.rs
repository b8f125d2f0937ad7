//! memimage-follow: tail a post log through a memory image
//!
//! Opens the configured event store, builds the posts memory image from the
//! start of the log, and logs every state change until Ctrl-C.
//!
//! ## Configuration
//! - MEMIMAGE_CONFIG: optional YAML config file
//! - MEMIMAGE__STORAGE__TYPE: `memory` (default) or `redis`
//! - MEMIMAGE__STORAGE__REDIS__HOST / __PORT / __NAME: Redis location and namespace
//! - MEMIMAGE_LOG: tracing filter (default `info`)

use tracing::{error, info};

use memimage::config::Config;
use memimage::posts::{PostEvent, Posts};
use memimage::storage::init_store;
use memimage::utils::bootstrap::{connect_with_retry, init_tracing};
use memimage::{EventStore, MemoryImage};

/// Posts shown per state change.
const RECENT: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting memimage-follow");

    let store = connect_with_retry("event store", &config.storage.describe(), || {
        init_store::<PostEvent>(&config.storage)
    })
    .await?;

    let image = MemoryImage::new(store.clone(), Posts::new(), Posts::apply_commit).await?;
    let mut changes = image.changes();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    error!("Commit feed ended");
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                let titles: Vec<String> = snapshot
                    .state
                    .most_recent(RECENT)
                    .iter()
                    .map(|post| post.content.title.clone())
                    .collect();
                info!(
                    revision = %snapshot.revision,
                    posts = snapshot.state.len(),
                    recent = ?titles,
                    "Posts updated"
                );
            }
        }
    }

    drop(image);
    store.close().await?;
    info!("Stopped");
    Ok(())
}
