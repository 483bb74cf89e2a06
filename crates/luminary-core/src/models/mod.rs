//! Data models for offline study content.
//!
//! This module contains the data structures persisted by the local store:
//!
//! - `OfflineDeck`, `OfflineCard`: flashcard decks pinned for offline study
//! - `OfflineQuiz`: quizzes pinned for offline study
//! - `PendingOperation`, `OperationPayload`: the write-intent log recorded
//!   while offline and replayed against the backend on reconnect
//!
//! Backend row shapes (`DeckRow`, `QuizRow`) live alongside the local types
//! they hydrate.

pub mod deck;
pub mod operation;
pub mod quiz;

pub use deck::{DeckRow, OfflineCard, OfflineDeck};
pub use operation::{OperationPayload, PendingOperation};
pub use quiz::{OfflineQuiz, QuizRow};
