use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque HTTP response snapshot, keyed by request URL.
///
/// This is what a cache partition stores and what strategies hand back to
/// the caller; the edge cache never interprets the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content-Type header, if the origin sent one.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let mut resp = CachedResponse {
            url: "/".to_string(),
            status: 204,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: Vec::new(),
            fetched_at: Utc::now(),
        };
        assert!(resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
        assert_eq!(resp.content_type(), Some("text/html"));
    }
}
