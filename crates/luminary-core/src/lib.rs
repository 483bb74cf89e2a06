//! Core library for Luminary Study's offline support.
//!
//! Two cooperating components form the offline/resilience core:
//!
//! - [`edge`]: the network edge cache. Intercepts fetches, applies a
//!   per-resource-class caching strategy over named partitions, relays push
//!   notifications and background-sync wake-ups to open app instances.
//! - [`store`] + [`sync`]: the local durable store and sync queue. Persists
//!   downloaded study content for offline reads and records user actions
//!   taken while offline as a FIFO queue of pending operations, replayed
//!   against the backend when connectivity returns.
//!
//! The two components share no state; they communicate only through the edge
//! worker's message channels. The [`api`] client, [`auth`] session, and
//! [`config`] round out the runtime the agent binary wires together.

pub mod api;
pub mod auth;
pub mod config;
pub mod edge;
pub mod models;
pub mod store;
pub mod sync;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use store::OfflineStore;
pub use sync::{ConnectivityState, SyncEngine};
