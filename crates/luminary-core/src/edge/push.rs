//! Push payload parsing with per-field defaults.
//!
//! A malformed payload must never fail the push event (the platform surfaces
//! failed pushes as a warning to the user), so every field falls back to a
//! default and parse errors degrade to the all-default notification.

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_TITLE: &str = "Luminary Study";
pub const DEFAULT_BODY: &str = "Time to study!";
pub const DEFAULT_ICON: &str = "/icons/icon-192.png";
pub const DEFAULT_BADGE: &str = "/icons/badge-72.png";
pub const DEFAULT_TAG: &str = "luminary-push";
pub const DEFAULT_URL: &str = "/home";

/// Wire shape of a push payload. Everything is optional.
#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    tag: Option<String>,
    data: Option<RawPayloadData>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayloadData {
    url: Option<String>,
}

/// A fully-defaulted notification ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    /// Navigation target for the "open" action.
    pub url: String,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            tag: DEFAULT_TAG.to_string(),
            url: DEFAULT_URL.to_string(),
        }
    }
}

impl Notification {
    /// Parse a push payload, defaulting every missing field. Malformed JSON
    /// is logged and yields the all-default notification.
    pub fn from_payload(payload: &[u8]) -> Self {
        let raw: RawPayload = match serde_json::from_slice(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Malformed push payload, using defaults");
                RawPayload::default()
            }
        };
        let defaults = Self::default();
        Self {
            title: raw.title.unwrap_or(defaults.title),
            body: raw.body.unwrap_or(defaults.body),
            icon: raw.icon.unwrap_or(defaults.icon),
            badge: raw.badge.unwrap_or(defaults.badge),
            tag: raw.tag.unwrap_or(defaults.tag),
            url: raw
                .data
                .and_then(|d| d.url)
                .unwrap_or(defaults.url),
        }
    }
}

/// The two actions a displayed notification offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Open,
    Dismiss,
}
