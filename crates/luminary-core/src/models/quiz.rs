use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quiz downloaded for offline study.
///
/// Question payloads are opaque to this subsystem: the quiz player renders
/// them, we only persist and replay them. Same lifecycle as
/// [`OfflineDeck`](super::OfflineDeck).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQuiz {
    pub id: String,
    pub title: String,
    pub subject: String,
    /// Questions in presentation order, kept as raw JSON.
    pub questions: Vec<serde_json::Value>,
    /// When this copy was last downloaded from the backend.
    pub last_synced_at: DateTime<Utc>,
}

impl OfflineQuiz {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// Backend row shape for a quiz, as returned by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRow {
    pub id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub questions: Vec<serde_json::Value>,
}

impl QuizRow {
    /// Convert into the local offline record, stamped with the download time.
    pub fn into_offline(self, synced_at: DateTime<Utc>) -> OfflineQuiz {
        OfflineQuiz {
            id: self.id,
            title: self.title,
            subject: self.subject,
            questions: self.questions,
            last_synced_at: synced_at,
        }
    }
}
