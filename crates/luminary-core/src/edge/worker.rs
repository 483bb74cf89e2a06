//! The edge worker: lifecycle events, client messaging, and the event loop.
//!
//! One worker task owns the partitions. Events arrive over an mpsc channel
//! (one logical async operation per platform callback); client-bound
//! messages leave over a broadcast channel so every open app instance hears
//! them.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{
    CachedResponse, EdgeError, FetchDecision, FetchRequest, FetchRouter, Gateway, Notification,
    NotificationAction, PartitionStore,
};

/// Background-sync tag this app responds to.
pub const SYNC_TAG: &str = "luminary-sync";

/// Concurrent fetches during install precache.
const MAX_CONCURRENT_PRECACHE: usize = 6;

/// Capacity of the client broadcast channel.
const BROADCAST_CAPACITY: usize = 16;

/// Inbound commands from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Activate the new worker generation immediately.
    SkipWaiting,
    /// Pin extra URLs into the offline-content partition.
    CacheUrls { urls: Vec<String> },
}

/// Messages relayed to every open app instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientBroadcast {
    /// The durable store should drain its pending queue.
    SyncRequired,
    /// Display this notification.
    ShowNotification(Notification),
    /// Focus an existing app window on this URL, or open a new one.
    FocusOrOpen { url: String },
}

/// Lifecycle events delivered to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch {
        request: FetchRequest,
        reply: oneshot::Sender<FetchDecision>,
    },
    Push {
        payload: Vec<u8>,
    },
    NotificationClick {
        action: NotificationAction,
        url: String,
    },
    Sync {
        tag: String,
    },
    Message(ClientCommand),
}

/// Worker generation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerPhase {
    /// Not installed yet; fetches pass through.
    New,
    /// Installed, waiting to activate.
    Installed,
    /// Active: intercepting fetches.
    Active,
}

pub struct EdgeWorker<G: Gateway> {
    partitions: PartitionStore,
    router: FetchRouter<G>,
    gateway: Arc<G>,
    static_name: String,
    offline_name: String,
    shell_manifest: Vec<String>,
    phase: WorkerPhase,
    broadcast: broadcast::Sender<ClientBroadcast>,
}

impl<G: Gateway> EdgeWorker<G> {
    pub fn new(
        cache_root: std::path::PathBuf,
        static_name: String,
        offline_name: String,
        shell_manifest: Vec<String>,
        api_prefixes: Vec<String>,
        gateway: Arc<G>,
    ) -> Result<Self, EdgeError> {
        let partitions = PartitionStore::new(cache_root)?;
        let static_partition = partitions.partition(&static_name)?;
        let offline_partition = partitions.partition(&offline_name)?;
        let shell_root = shell_manifest
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string());
        let router = FetchRouter::new(
            gateway.clone(),
            static_partition,
            offline_partition,
            api_prefixes,
            shell_root,
        );
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            partitions,
            router,
            gateway,
            static_name,
            offline_name,
            shell_manifest,
            phase: WorkerPhase::New,
            broadcast,
        })
    }

    /// Subscribe to client-bound messages. Call before spawning `run`.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientBroadcast> {
        self.broadcast.subscribe()
    }

    /// Event loop. Runs until the event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<WorkerEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Edge worker event channel closed, shutting down");
    }

    async fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Install => {
                if let Err(e) = self.install().await {
                    // The previous worker generation stays active; its
                    // partitions survive until a successful activate.
                    warn!(error = %e, "Install failed, keeping previous worker");
                }
            }
            WorkerEvent::Activate => {
                if let Err(e) = self.activate() {
                    warn!(error = %e, "Activation cleanup failed");
                }
            }
            WorkerEvent::Fetch { request, reply } => {
                let decision = if self.phase == WorkerPhase::Active {
                    self.router.handle(&request).await
                } else {
                    FetchDecision::Bypass
                };
                let _ = reply.send(decision);
            }
            WorkerEvent::Push { payload } => {
                let notification = Notification::from_payload(&payload);
                self.send(ClientBroadcast::ShowNotification(notification));
            }
            WorkerEvent::NotificationClick { action, url } => match action {
                NotificationAction::Dismiss => {}
                NotificationAction::Open => {
                    self.send(ClientBroadcast::FocusOrOpen { url });
                }
            },
            WorkerEvent::Sync { tag } => {
                if tag == SYNC_TAG {
                    self.send(ClientBroadcast::SyncRequired);
                } else {
                    debug!(tag, "Ignoring sync event with foreign tag");
                }
            }
            WorkerEvent::Message(command) => self.handle_command(command).await,
        }
    }

    /// Precache the app shell. All-or-nothing: every manifest URL must fetch
    /// successfully before anything is written, so a failed install leaves
    /// the static partition exactly as the previous generation left it.
    pub async fn install(&mut self) -> Result<(), EdgeError> {
        let fetched: Vec<(String, Result<CachedResponse, EdgeError>)> =
            stream::iter(self.shell_manifest.clone())
                .map(|url| {
                    let gateway = self.gateway.clone();
                    async move {
                        let result = gateway.fetch(&url).await;
                        (url, result)
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_PRECACHE)
                .collect()
                .await;

        let mut responses = Vec::with_capacity(fetched.len());
        for (url, result) in fetched {
            match result {
                Ok(response) if response.is_success() => responses.push(response),
                Ok(response) => {
                    return Err(EdgeError::InstallFailed(format!(
                        "{} returned status {}",
                        url, response.status
                    )))
                }
                Err(e) => {
                    return Err(EdgeError::InstallFailed(format!("{}: {}", url, e)));
                }
            }
        }

        let static_partition = self.partitions.partition(&self.static_name)?;
        for response in &responses {
            static_partition.put(response)?;
        }
        self.phase = WorkerPhase::Installed;
        info!(assets = responses.len(), "Installed app shell");
        Ok(())
    }

    /// Delete every partition that is not the current static or offline one.
    /// This is the sole eviction mechanism.
    pub fn activate(&mut self) -> Result<(), EdgeError> {
        for name in self.partitions.partition_names()? {
            if name != self.static_name && name != self.offline_name {
                info!(partition = %name, "Deleting stale cache partition");
                self.partitions.delete_partition(&name)?;
            }
        }
        self.phase = WorkerPhase::Active;
        Ok(())
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::SkipWaiting => {
                info!("Skip-waiting requested, activating immediately");
                if let Err(e) = self.activate() {
                    warn!(error = %e, "Activation cleanup failed");
                }
            }
            ClientCommand::CacheUrls { urls } => {
                self.pin_urls(&urls).await;
            }
        }
    }

    /// Pin URLs into the offline-content partition. Best-effort per URL: one
    /// unreachable URL does not stop the rest.
    async fn pin_urls(&self, urls: &[String]) {
        let offline = match self.partitions.partition(&self.offline_name) {
            Ok(partition) => partition,
            Err(e) => {
                warn!(error = %e, "Offline partition unavailable, cannot pin URLs");
                return;
            }
        };
        for url in urls {
            match self.gateway.fetch(url).await {
                Ok(response) if response.is_success() => {
                    if let Err(e) = offline.put(&response) {
                        warn!(url = %url, error = %e, "Failed to pin URL for offline use");
                    }
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Skipping pin, origin answered non-success");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch URL for pinning");
                }
            }
        }
    }

    fn send(&self, message: ClientBroadcast) {
        // No clients listening is fine; the broadcast is fire-and-forget.
        let _ = self.broadcast.send(message);
    }
}

// ============================================================================
// Tests
// ============================================================================
