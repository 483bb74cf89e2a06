//! Trait seam between the sync engine and the study backend.
//!
//! The engine only needs four network-call-shaped operations, all idempotent
//! by entity id. Tests substitute a scripted fake; production wires in
//! [`ApiClient`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{ApiClient, ApiError};
use crate::models::{DeckRow, QuizRow};

#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Whether an authenticated session is attached. Draining or downloading
    /// without one is a contract violation, not a retryable failure.
    fn has_session(&self) -> bool;

    /// Fetch all flashcard decks owned by the user.
    async fn fetch_decks(&self, user_id: &str) -> Result<Vec<DeckRow>, ApiError>;

    /// Fetch all quizzes the user has not completed yet.
    async fn fetch_incomplete_quizzes(&self, user_id: &str) -> Result<Vec<QuizRow>, ApiError>;

    /// Overwrite a deck's mastered count and last-reviewed timestamp.
    async fn push_flashcard_review(
        &self,
        deck_id: &str,
        mastered_count: u32,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;

    /// Overwrite a quiz's score and completion timestamp.
    async fn push_quiz_result(
        &self,
        quiz_id: &str,
        score: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl SyncBackend for ApiClient {
    fn has_session(&self) -> bool {
        self.has_token()
    }

    async fn fetch_decks(&self, user_id: &str) -> Result<Vec<DeckRow>, ApiError> {
        ApiClient::fetch_decks(self, user_id).await
    }

    async fn fetch_incomplete_quizzes(&self, user_id: &str) -> Result<Vec<QuizRow>, ApiError> {
        ApiClient::fetch_incomplete_quizzes(self, user_id).await
    }

    async fn push_flashcard_review(
        &self,
        deck_id: &str,
        mastered_count: u32,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.update_deck_review(deck_id, mastered_count, reviewed_at)
            .await
    }

    async fn push_quiz_result(
        &self,
        quiz_id: &str,
        score: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.update_quiz_result(quiz_id, score, completed_at).await
    }
}
