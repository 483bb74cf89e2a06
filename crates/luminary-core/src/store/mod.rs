//! Local durable store for offline study content.
//!
//! A SQLite database with three tables: `flashcard_decks`, `quizzes`, and
//! `pending_sync`. The first two hold the content a user has explicitly
//! downloaded for offline use; `pending_sync` is the FIFO write-intent log
//! drained by the sync engine when connectivity returns.

pub mod sqlite;

pub use sqlite::{OfflineStore, StoreError};
