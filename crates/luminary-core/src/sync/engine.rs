//! The sync engine: queue drain and download-for-offline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{OperationPayload, PendingOperation};
use crate::store::{OfflineStore, StoreError};
use crate::sync::{ConnectivityState, SyncBackend};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No backend session - sign in before syncing")]
    NoSession,

    #[error("{pending} offline actions are waiting to sync - drain the queue before re-downloading")]
    PendingOperations { pending: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Backend request failed: {0}")]
    Api(#[from] crate::api::ApiError),
}

/// Result of one drain trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every snapshotted operation applied; the queue was cleared.
    Completed { applied: usize },
    /// An operation failed. `applied` were pushed before the failure, but the
    /// queue still holds all `queued` operations for the next trigger.
    Failed { applied: usize, queued: usize },
    /// A drain pass was already running; this trigger was a no-op.
    AlreadyRunning,
}

/// Result of a successful "download for offline".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub decks: usize,
    pub quizzes: usize,
}

/// Resets the drain-in-progress flag even if the pass errors out early.
struct DrainPermit<'a>(&'a AtomicBool);

impl Drop for DrainPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Coordinates the local store, the backend, and the connectivity state
/// machine. Constructed explicitly and passed to consumers; holds no global
/// state, so tests can build as many independent engines as they need.
pub struct SyncEngine {
    store: Arc<OfflineStore>,
    backend: Arc<dyn SyncBackend>,
    state_tx: watch::Sender<ConnectivityState>,
    draining: AtomicBool,
    last_sync_time: Mutex<Option<DateTime<Utc>>>,
}

impl SyncEngine {
    pub fn new(store: Arc<OfflineStore>, backend: Arc<dyn SyncBackend>) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::Offline);
        Self {
            store,
            backend,
            state_tx,
            draining: AtomicBool::new(false),
            last_sync_time: Mutex::new(None),
        }
    }

    /// Subscribe to connectivity/sync state changes (for banners and toasts).
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectivityState) {
        // send_replace updates the value even with no subscribers.
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = ?previous, to = ?state, "Connectivity state change");
        }
    }

    /// When the last drain fully completed, if ever.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_time.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn pending_count(&self) -> Result<u64, SyncError> {
        Ok(self.store.pending_count()?)
    }

    /// Record a user action performed while offline.
    ///
    /// Never propagates store failures to the caller: offline durability is
    /// best-effort, and a failed write degrades to losing this one action
    /// rather than crashing the study session. Returns the queue id on
    /// success.
    pub fn record(&self, payload: OperationPayload) -> Option<i64> {
        match self.store.enqueue(&payload) {
            Ok(id) => {
                debug!(id, kind = payload.kind(), "Queued offline action");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, kind = payload.kind(), "Failed to queue offline action; it will not be synced");
                None
            }
        }
    }

    /// The browser-offline transition: reads now come from the local store.
    pub fn went_offline(&self) {
        self.set_state(ConnectivityState::Offline);
    }

    /// The browser-online transition (or a relayed background-sync wake-up):
    /// drain the queue. Both triggers funnel here and collapse via the
    /// reentrancy guard.
    pub async fn went_online(&self) -> Result<DrainOutcome, SyncError> {
        self.drain().await
    }

    /// Apply every queued operation against the backend, in enqueue order.
    ///
    /// All-or-nothing per pass: on any failure the queue is left intact
    /// (including operations that had already been pushed) and the whole
    /// pass retries on the next trigger. Re-pushing an already-applied
    /// operation is safe because every push is a last-write-wins overwrite
    /// keyed by entity id.
    pub async fn drain(&self) -> Result<DrainOutcome, SyncError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress; trigger ignored");
            return Ok(DrainOutcome::AlreadyRunning);
        }
        let _permit = DrainPermit(&self.draining);

        if !self.backend.has_session() {
            return Err(SyncError::NoSession);
        }

        self.set_state(ConnectivityState::Syncing);

        // Snapshot once; operations enqueued mid-drain wait for the next pass.
        let ops = self.store.pending_operations()?;
        let queued = ops.len();

        for (index, op) in ops.iter().enumerate() {
            if let Err(e) = self.apply(op).await {
                warn!(
                    applied = index,
                    queued,
                    error = %e,
                    "Sync drain failed, will retry on next connectivity event"
                );
                self.set_state(ConnectivityState::OnlinePending);
                return Ok(DrainOutcome::Failed {
                    applied: index,
                    queued,
                });
            }
        }

        self.store.clear_pending()?;
        *self
            .last_sync_time
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        self.set_state(ConnectivityState::OnlineIdle);
        if queued > 0 {
            info!(applied = queued, "Offline queue drained");
        }
        Ok(DrainOutcome::Completed { applied: queued })
    }

    /// Push one operation. The enqueue timestamp is used as the review/
    /// completion time so a replayed operation writes the same values.
    async fn apply(&self, op: &PendingOperation) -> Result<(), crate::api::ApiError> {
        match &op.payload {
            OperationPayload::FlashcardReview {
                deck_id,
                mastered_count,
            } => {
                self.backend
                    .push_flashcard_review(deck_id, *mastered_count, op.enqueued_at)
                    .await
            }
            OperationPayload::QuizComplete { quiz_id, score } => {
                self.backend
                    .push_quiz_result(quiz_id, *score, op.enqueued_at)
                    .await
            }
        }
    }

    /// Explicit "download for offline": overwrite the local content set from
    /// the backend.
    ///
    /// Refuses while pending operations exist - a full-replace download would
    /// silently discard the unsynced local edits behind them. Drain first.
    ///
    /// Writes are per-record puts: if the quiz fetch fails after decks were
    /// saved, the saved decks stay and the quiz collection is untouched; the
    /// whole action reports failure and a re-download is idempotent.
    pub async fn download_for_offline(
        &self,
        user_id: &str,
    ) -> Result<DownloadSummary, SyncError> {
        if !self.backend.has_session() {
            return Err(SyncError::NoSession);
        }
        let pending = self.store.pending_count()?;
        if pending > 0 {
            return Err(SyncError::PendingOperations { pending });
        }

        let synced_at = Utc::now();

        let decks = self.backend.fetch_decks(user_id).await?;
        let deck_count = decks.len();
        for row in decks {
            self.store.put_deck(&row.into_offline(synced_at))?;
        }

        let quizzes = self.backend.fetch_incomplete_quizzes(user_id).await?;
        let quiz_count = quizzes.len();
        for row in quizzes {
            self.store.put_quiz(&row.into_offline(synced_at))?;
        }

        info!(decks = deck_count, quizzes = quiz_count, "Downloaded content for offline use");
        Ok(DownloadSummary {
            decks: deck_count,
            quizzes: quiz_count,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
