//! Offline sync: connectivity state machine, pending-operation queue drain,
//! and explicit "download for offline" content refresh.
//!
//! The sync engine owns the correctness rules the UI relies on:
//!
//! - pending operations drain strictly in enqueue order
//! - a drain pass is all-or-nothing: any failure leaves the whole queue
//!   intact for the next connectivity event
//! - concurrent drain triggers collapse into a single pass

pub mod backend;
pub mod engine;

pub use backend::SyncBackend;
pub use engine::{DownloadSummary, DrainOutcome, SyncEngine, SyncError};

use serde::{Deserialize, Serialize};

/// User-visible connectivity/sync state, published over a watch channel.
///
/// Offline → (online event) → Syncing → OnlineIdle on success, or
/// OnlinePending on failure, which re-enters Syncing on the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// No connectivity; reads come from the local store, writes queue up.
    Offline,
    /// A drain pass is running.
    Syncing,
    /// Online with an empty queue.
    OnlineIdle,
    /// Online but the last drain failed; queued operations await retry.
    OnlinePending,
}

impl ConnectivityState {
    /// Short label for banners/toasts.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityState::Offline => "Offline - changes will sync later",
            ConnectivityState::Syncing => "Syncing...",
            ConnectivityState::OnlineIdle => "Online",
            ConnectivityState::OnlinePending => "Sync failed, will retry",
        }
    }
}
