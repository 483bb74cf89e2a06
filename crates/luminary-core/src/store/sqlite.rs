//! SQLite-backed durable store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::debug;

use crate::models::{OfflineDeck, OfflineQuiz, OperationPayload, PendingOperation};

/// Current schema version, stored in `PRAGMA user_version`.
/// Bumping this requires adding a migration step in `run_migrations`.
const SCHEMA_VERSION: i64 = 1;

/// Schema for the offline store.
///
/// `pending_sync.id` is AUTOINCREMENT on purpose: enqueue order is the drain
/// order, and ids must never be reused even after a full-clear, so a drain
/// snapshot can never confuse old and new operations.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS flashcard_decks (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quizzes (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_sync (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload BLOB NOT NULL,
    enqueued_at TEXT NOT NULL
);
"#;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to create store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Corrupt record in store: {0}")]
    Corrupt(String),
}

/// The local durable store.
///
/// Open is idempotent: the schema is created inside a versioned upgrade
/// transaction guarded by `PRAGMA user_version`, so concurrent consumers can
/// all call [`OfflineStore::open`] without duplicating collections. SQLite
/// serializes conflicting transactions itself; the mutex only keeps the
/// connection handle `Sync`.
pub struct OfflineStore {
    conn: Mutex<Connection>,
}

impl OfflineStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and as a degraded fallback
    /// when persistent storage is unavailable.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Versioned upgrade transaction, executed at most once per schema version.
    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        debug!(from = version, to = SCHEMA_VERSION, "Migrating offline store schema");
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    // ===== Decks =====

    /// Insert or fully replace a deck.
    pub fn put_deck(&self, deck: &OfflineDeck) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let data = serde_json::to_vec(deck)?;
        conn.execute(
            "INSERT OR REPLACE INTO flashcard_decks (id, data, last_synced_at) VALUES (?, ?, ?)",
            params![deck.id, data, deck.last_synced_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// All locally stored decks, ordered by title.
    pub fn decks(&self) -> Result<Vec<OfflineDeck>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM flashcard_decks")?;
        let mut decks = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|data| {
                serde_json::from_slice::<OfflineDeck>(&data)
                    .map_err(|e| StoreError::Corrupt(format!("flashcard_decks: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        decks.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(decks)
    }

    pub fn deck(&self, id: &str) -> Result<Option<OfflineDeck>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM flashcard_decks WHERE id = ?")?;
        let data: Option<Vec<u8>> = stmt.query_row(params![id], |row| row.get(0)).ok();
        match data {
            Some(data) => Ok(Some(serde_json::from_slice(&data).map_err(|e| {
                StoreError::Corrupt(format!("flashcard_decks[{}]: {}", id, e))
            })?)),
            None => Ok(None),
        }
    }

    /// Remove a deck from offline storage (explicit user action).
    pub fn delete_deck(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM flashcard_decks WHERE id = ?", params![id])?;
        Ok(())
    }

    // ===== Quizzes =====

    /// Insert or fully replace a quiz.
    pub fn put_quiz(&self, quiz: &OfflineQuiz) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let data = serde_json::to_vec(quiz)?;
        conn.execute(
            "INSERT OR REPLACE INTO quizzes (id, data, last_synced_at) VALUES (?, ?, ?)",
            params![quiz.id, data, quiz.last_synced_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// All locally stored quizzes, ordered by title.
    pub fn quizzes(&self) -> Result<Vec<OfflineQuiz>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM quizzes")?;
        let mut quizzes = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|data| {
                serde_json::from_slice::<OfflineQuiz>(&data)
                    .map_err(|e| StoreError::Corrupt(format!("quizzes: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        quizzes.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(quizzes)
    }

    pub fn delete_quiz(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM quizzes WHERE id = ?", params![id])?;
        Ok(())
    }

    // ===== Pending operations =====

    /// Append one operation to the queue. Returns the assigned queue id.
    pub fn enqueue(&self, payload: &OperationPayload) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let data = serde_json::to_vec(payload)?;
        conn.execute(
            "INSERT INTO pending_sync (kind, payload, enqueued_at) VALUES (?, ?, ?)",
            params![payload.kind(), data, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The full queue in enqueue (FIFO) order.
    pub fn pending_operations(&self) -> Result<Vec<PendingOperation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, payload, enqueued_at FROM pending_sync ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, payload, enqueued_at)| {
                let payload = serde_json::from_slice(&payload)
                    .map_err(|e| StoreError::Corrupt(format!("pending_sync[{}]: {}", id, e)))?;
                let enqueued_at = parse_datetime(&enqueued_at)?;
                Ok(PendingOperation {
                    id,
                    payload,
                    enqueued_at,
                })
            })
            .collect()
    }

    pub fn pending_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_sync", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Destroy the whole queue. Only called after a drain has durably applied
    /// every snapshotted operation to the backend.
    pub fn clear_pending(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM pending_sync", [])?;
        Ok(())
    }

    /// Wipe all three collections (explicit user action).
    pub fn reset(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM flashcard_decks; DELETE FROM quizzes; DELETE FROM pending_sync;",
        )?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OfflineCard, OperationPayload};

    fn deck(id: &str, title: &str) -> OfflineDeck {
        OfflineDeck {
            id: id.to_string(),
            title: title.to_string(),
            subject: "Law".to_string(),
            cards: vec![OfflineCard {
                id: format!("{}-c1", id),
                front: "offer".to_string(),
                back: "an expression of willingness to contract".to_string(),
                mastered: false,
            }],
            last_synced_at: Utc::now(),
        }
    }

    fn quiz(id: &str, title: &str) -> OfflineQuiz {
        OfflineQuiz {
            id: id.to_string(),
            title: title.to_string(),
            subject: "Health".to_string(),
            questions: vec![serde_json::json!({"prompt": "?"})],
            last_synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_is_idempotent() {
        let store = OfflineStore::open_in_memory().unwrap();
        // A second migration pass on an already-current schema is a no-op.
        store.run_migrations().unwrap();
        store.run_migrations().unwrap();
        assert_eq!(store.decks().unwrap().len(), 0);
    }

    #[test]
    fn test_open_on_disk_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.db");
        {
            let store = OfflineStore::open(&path).unwrap();
            store.put_deck(&deck("d1", "Contracts")).unwrap();
        }
        let store = OfflineStore::open(&path).unwrap();
        assert_eq!(store.decks().unwrap().len(), 1);
    }

    #[test]
    fn test_put_deck_is_full_replace() {
        let store = OfflineStore::open_in_memory().unwrap();
        store.put_deck(&deck("d1", "Contracts")).unwrap();

        let mut updated = deck("d1", "Contracts II");
        updated.cards.clear();
        store.put_deck(&updated).unwrap();

        let decks = store.decks().unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].title, "Contracts II");
        assert!(decks[0].cards.is_empty());
    }

    #[test]
    fn test_quiz_roundtrip_preserves_opaque_questions() {
        let store = OfflineStore::open_in_memory().unwrap();
        store.put_quiz(&quiz("q1", "Midterm")).unwrap();
        let quizzes = store.quizzes().unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].questions[0]["prompt"], "?");
    }

    #[test]
    fn test_delete_deck_and_quiz() {
        let store = OfflineStore::open_in_memory().unwrap();
        store.put_deck(&deck("d1", "Contracts")).unwrap();
        store.put_quiz(&quiz("q1", "Midterm")).unwrap();
        store.delete_deck("d1").unwrap();
        store.delete_quiz("q1").unwrap();
        assert!(store.decks().unwrap().is_empty());
        assert!(store.quizzes().unwrap().is_empty());
    }

    #[test]
    fn test_queue_is_fifo() {
        let store = OfflineStore::open_in_memory().unwrap();
        let first = store
            .enqueue(&OperationPayload::FlashcardReview {
                deck_id: "d1".to_string(),
                mastered_count: 3,
            })
            .unwrap();
        let second = store
            .enqueue(&OperationPayload::FlashcardReview {
                deck_id: "d1".to_string(),
                mastered_count: 5,
            })
            .unwrap();
        let third = store
            .enqueue(&OperationPayload::QuizComplete {
                quiz_id: "q1".to_string(),
                score: 8,
            })
            .unwrap();
        assert!(first < second && second < third);

        let ops = store.pending_operations().unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].id, first);
        assert_eq!(ops[2].id, third);
        // Two successive reviews of the same deck keep their relative order.
        assert_eq!(
            ops[0].payload,
            OperationPayload::FlashcardReview {
                deck_id: "d1".to_string(),
                mastered_count: 3,
            }
        );
        assert_eq!(
            ops[1].payload,
            OperationPayload::FlashcardReview {
                deck_id: "d1".to_string(),
                mastered_count: 5,
            }
        );
    }

    #[test]
    fn test_clear_pending_empties_queue() {
        let store = OfflineStore::open_in_memory().unwrap();
        store
            .enqueue(&OperationPayload::QuizComplete {
                quiz_id: "q1".to_string(),
                score: 8,
            })
            .unwrap();
        assert_eq!(store.pending_count().unwrap(), 1);
        store.clear_pending().unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_queue_ids_not_reused_after_clear() {
        let store = OfflineStore::open_in_memory().unwrap();
        let first = store
            .enqueue(&OperationPayload::QuizComplete {
                quiz_id: "q1".to_string(),
                score: 1,
            })
            .unwrap();
        store.clear_pending().unwrap();
        let next = store
            .enqueue(&OperationPayload::QuizComplete {
                quiz_id: "q1".to_string(),
                score: 2,
            })
            .unwrap();
        assert!(next > first);
    }

    #[test]
    fn test_reset_wipes_everything() {
        let store = OfflineStore::open_in_memory().unwrap();
        store.put_deck(&deck("d1", "Contracts")).unwrap();
        store.put_quiz(&quiz("q1", "Midterm")).unwrap();
        store
            .enqueue(&OperationPayload::QuizComplete {
                quiz_id: "q1".to_string(),
                score: 8,
            })
            .unwrap();
        store.reset().unwrap();
        assert!(store.decks().unwrap().is_empty());
        assert!(store.quizzes().unwrap().is_empty());
        assert_eq!(store.pending_count().unwrap(), 0);
    }
}
