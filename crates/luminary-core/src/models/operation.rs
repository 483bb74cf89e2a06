use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind strings as stored in the `pending_sync.kind` column.
pub const KIND_FLASHCARD_REVIEW: &str = "flashcard_review";
pub const KIND_QUIZ_COMPLETE: &str = "quiz_complete";

/// What a pending operation does when replayed against the backend.
///
/// Every variant is an idempotent by-id overwrite on the backend side, so a
/// retried operation after a partial drain failure does not double-count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    /// Record the outcome of an offline flashcard review session.
    FlashcardReview { deck_id: String, mastered_count: u32 },
    /// Record the score of an offline quiz run.
    QuizComplete { quiz_id: String, score: u32 },
}

impl OperationPayload {
    /// Kind discriminant, mirrored into its own store column.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationPayload::FlashcardReview { .. } => KIND_FLASHCARD_REVIEW,
            OperationPayload::QuizComplete { .. } => KIND_QUIZ_COMPLETE,
        }
    }

    /// Id of the backend entity this operation updates.
    pub fn entity_id(&self) -> &str {
        match self {
            OperationPayload::FlashcardReview { deck_id, .. } => deck_id,
            OperationPayload::QuizComplete { quiz_id, .. } => quiz_id,
        }
    }
}

/// One user action recorded while offline, awaiting replay.
///
/// Operations are appended in the order the user performed them and must be
/// drained in the same order: two successive review updates to the same deck
/// must not be reordered. The store's auto-increment id is the enqueue order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: i64,
    pub payload: OperationPayload,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_match_store_column() {
        let review = OperationPayload::FlashcardReview {
            deck_id: "d1".to_string(),
            mastered_count: 5,
        };
        assert_eq!(review.kind(), "flashcard_review");
        assert_eq!(review.entity_id(), "d1");

        let quiz = OperationPayload::QuizComplete {
            quiz_id: "q1".to_string(),
            score: 8,
        };
        assert_eq!(quiz.kind(), "quiz_complete");
        assert_eq!(quiz.entity_id(), "q1");
    }

    #[test]
    fn test_payload_json_shape() {
        let review = OperationPayload::FlashcardReview {
            deck_id: "d1".to_string(),
            mastered_count: 5,
        };
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["kind"], "flashcard_review");
        assert_eq!(json["deck_id"], "d1");
        assert_eq!(json["mastered_count"], 5);
    }
}
