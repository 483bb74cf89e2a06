//! Luminary offline agent - the headless runtime for the offline subsystem.
//!
//! Wires the two offline components together: runs the edge cache worker,
//! probes backend connectivity, and drains the pending-operation queue on
//! online transitions and relayed background-sync wake-ups. The study UI is
//! a separate application; this binary is what keeps its offline machinery
//! alive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use luminary_core::api::ApiClient;
use luminary_core::auth::Session;
use luminary_core::config::{Config, API_PASSTHROUGH_PREFIXES};
use luminary_core::edge::{ClientBroadcast, EdgeWorker, HttpGateway, WorkerEvent};
use luminary_core::store::OfflineStore;
use luminary_core::sync::SyncEngine;

// ============================================================================
// Constants
// ============================================================================

/// Interval between backend connectivity probes (in seconds)
const PROBE_INTERVAL_SECS: u64 = 30;

/// Timeout for a single connectivity probe (in seconds)
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Buffer size for the edge worker event channel
const EVENT_CHANNEL_SIZE: usize = 32;

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and to a daily-rolling file under the data directory.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing(log_dir: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(log_dir, "luminary-agent.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    if let Ok(url) = std::env::var("LUMINARY_BACKEND_URL") {
        config.backend_url = url;
    }
    if let Ok(key) = std::env::var("LUMINARY_API_KEY") {
        config.api_key = key;
    }
    if let Ok(origin) = std::env::var("LUMINARY_APP_ORIGIN") {
        config.app_origin = origin;
    }

    let data_dir = config.data_dir()?;
    let _log_guard = init_tracing(&data_dir.join("logs"))?;
    info!("Luminary offline agent starting");

    let store = Arc::new(OfflineStore::open(&data_dir.join("offline.db"))?);

    let mut session = Session::new(data_dir.clone());
    session.load()?;

    let mut api = ApiClient::new(&config.backend_url, &config.api_key)?;
    if let Some(token) = session.token() {
        api.set_token(token.to_string());
    }
    let engine = Arc::new(SyncEngine::new(store, Arc::new(api)));

    // CLI verbs in addition to the default agent loop
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--status" {
        return print_status(&engine);
    }
    if args.len() > 1 && args[1] == "--download" {
        let user_id = session
            .user_id()
            .ok_or_else(|| anyhow!("No saved session. Sign in from the app first."))?
            .to_string();
        let summary = engine.download_for_offline(&user_id).await?;
        println!(
            "Downloaded {} decks and {} quizzes for offline use",
            summary.decks, summary.quizzes
        );
        return Ok(());
    }

    let result = run_agent(&config, engine).await;
    info!("Luminary offline agent shutting down");
    result
}

fn print_status(engine: &SyncEngine) -> Result<()> {
    let pending = engine.pending_count()?;
    println!("state:   {}", engine.state().label());
    println!("pending: {} queued offline action(s)", pending);
    match engine.last_sync_time() {
        Some(at) => println!("synced:  {}", at.to_rfc3339()),
        None => println!("synced:  not yet this run"),
    }
    Ok(())
}

async fn run_agent(config: &Config, engine: Arc<SyncEngine>) -> Result<()> {
    // Edge cache worker: its own task, talked to only via channels.
    let gateway = Arc::new(HttpGateway::new(config.app_origin.clone())?);
    let worker = EdgeWorker::new(
        config.cache_dir()?,
        config.static_partition_name(),
        config.offline_partition_name(),
        config.shell_manifest.clone(),
        API_PASSTHROUGH_PREFIXES.iter().map(|s| s.to_string()).collect(),
        gateway,
    )?;
    let mut relays = worker.subscribe();
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let worker_task = tokio::spawn(worker.run(events_rx));

    for event in [WorkerEvent::Install, WorkerEvent::Activate] {
        events_tx
            .send(event)
            .await
            .map_err(|_| anyhow!("Edge worker exited unexpectedly"))?;
    }

    let probe = reqwest::Client::builder()
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .build()?;
    let health_url = format!("{}/auth/v1/health", config.backend_url);
    let mut online = false;
    let mut interval = tokio::time::interval(Duration::from_secs(PROBE_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now_online = probe
                    .get(&health_url)
                    .send()
                    .await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false);
                if now_online && !online {
                    info!("Connectivity restored, draining offline queue");
                    drain(&engine).await;
                } else if !now_online && online {
                    warn!("Connectivity lost");
                    engine.went_offline();
                }
                online = now_online;
            }
            relay = relays.recv() => {
                match relay {
                    Ok(ClientBroadcast::SyncRequired) => {
                        info!("Background sync requested, draining offline queue");
                        drain(&engine).await;
                    }
                    Ok(ClientBroadcast::ShowNotification(notification)) => {
                        info!(title = %notification.title, body = %notification.body, "Notification");
                    }
                    Ok(ClientBroadcast::FocusOrOpen { url }) => {
                        info!(%url, "App window focus requested");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Missed relayed messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    // Closing the event channel ends the worker's event loop.
    drop(events_tx);
    worker_task.await?;
    Ok(())
}

/// One drain trigger. Failures are already reflected in the engine's
/// connectivity state; here they only need logging.
async fn drain(engine: &SyncEngine) {
    match engine.went_online().await {
        Ok(outcome) => info!(?outcome, "Drain finished"),
        Err(e) => warn!(error = %e, "Drain could not run"),
    }
}
