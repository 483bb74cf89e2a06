//! Network edge cache: the offline-first HTTP layer.
//!
//! An independent worker task that owns the response cache and decides, per
//! request, whether to serve from a cache partition, the network, or a
//! blended strategy. It also relays push notifications and background-sync
//! wake-ups to registered clients.
//!
//! The worker shares nothing with the durable store: the two components
//! communicate only through the worker's event channel and client broadcast
//! channel, mirroring the page/worker split it models.

pub mod gateway;
pub mod partition;
pub mod push;
pub mod response;
pub mod strategy;
pub mod worker;

pub use gateway::{Gateway, HttpGateway};
pub use partition::{CachePartition, PartitionStore};
pub use push::{Notification, NotificationAction};
pub use response::CachedResponse;
pub use strategy::{Destination, FetchDecision, FetchRequest, FetchRouter, ResponseSource};
pub use worker::{ClientBroadcast, ClientCommand, EdgeWorker, WorkerEvent, SYNC_TAG};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode cached response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Install failed, shell asset unreachable: {0}")]
    InstallFailed(String),
}
