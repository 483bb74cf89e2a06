use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single flashcard inside an offline deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineCard {
    pub id: String,
    pub front: String,
    pub back: String,
    /// Whether the student has marked this card as mastered.
    #[serde(default)]
    pub mastered: bool,
}

/// A flashcard deck downloaded for offline study.
///
/// The authoritative copy is the backend record; this is a read cache plus
/// the substrate for offline review. "Download for offline" overwrites the
/// whole deck, it never merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineDeck {
    pub id: String,
    pub title: String,
    pub subject: String,
    /// Cards in study order.
    pub cards: Vec<OfflineCard>,
    /// When this copy was last downloaded from the backend.
    pub last_synced_at: DateTime<Utc>,
}

impl OfflineDeck {
    /// Number of cards currently marked as mastered.
    pub fn mastered_count(&self) -> u32 {
        self.cards.iter().filter(|c| c.mastered).count() as u32
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }
}

/// Backend row shape for a flashcard deck, as returned by the REST API.
/// Cards are stored as a JSON column on the backend, so they deserialize
/// directly into [`OfflineCard`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRow {
    pub id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub cards: Vec<OfflineCard>,
}

impl DeckRow {
    /// Convert into the local offline record, stamped with the download time.
    pub fn into_offline(self, synced_at: DateTime<Utc>) -> OfflineDeck {
        OfflineDeck {
            id: self.id,
            title: self.title,
            subject: self.subject,
            cards: self.cards,
            last_synced_at: synced_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, mastered: bool) -> OfflineCard {
        OfflineCard {
            id: id.to_string(),
            front: "front".to_string(),
            back: "back".to_string(),
            mastered,
        }
    }

    #[test]
    fn test_mastered_count() {
        let deck = OfflineDeck {
            id: "d1".to_string(),
            title: "Contracts".to_string(),
            subject: "Law".to_string(),
            cards: vec![card("c1", true), card("c2", false), card("c3", true)],
            last_synced_at: Utc::now(),
        };
        assert_eq!(deck.mastered_count(), 2);
        assert_eq!(deck.card_count(), 3);
    }

    #[test]
    fn test_row_conversion_stamps_sync_time() {
        let now = Utc::now();
        let row = DeckRow {
            id: "d1".to_string(),
            title: "Torts".to_string(),
            subject: "Law".to_string(),
            cards: vec![card("c1", false)],
        };
        let deck = row.into_offline(now);
        assert_eq!(deck.last_synced_at, now);
        assert_eq!(deck.cards.len(), 1);
    }
}
