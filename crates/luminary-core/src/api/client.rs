//! API client for the Luminary study backend.
//!
//! The backend exposes PostgREST-style endpoints: row filters are query
//! parameters (`id=eq.<uuid>`) and updates are PATCH requests that overwrite
//! named columns, which is what makes replaying the offline queue idempotent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{DeckRow, QuizRow};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile connections while failing fast enough that a
/// sync drain does not hang the connectivity state machine.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the study backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given backend.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: Some(token),
        }
    }

    /// Set the bearer token for authenticated requests.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Whether a bearer token is currently attached.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid api key: {}", e)))?,
        );
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::InvalidResponse(format!("Invalid token: {}", e)))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// GET with rate-limit backoff, parsing the JSON body.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let response = Self::check_response(response).await?;
            return response.json().await.map_err(ApiError::from);
        }
    }

    /// PATCH an update body against a row filter. No retry: the sync engine
    /// owns retry semantics for replayed operations.
    async fn patch<B: Serialize>(&self, url: &str, body: &B) -> Result<(), ApiError> {
        let response = self
            .client
            .patch(url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Download operations =====

    /// Fetch all flashcard decks owned by the user.
    pub async fn fetch_decks(&self, user_id: &str) -> Result<Vec<DeckRow>, ApiError> {
        let url = format!(
            "{}/rest/v1/flashcard_decks?user_id=eq.{}&select=id,title,subject,cards",
            self.base_url, user_id
        );
        let decks: Vec<DeckRow> = self.get(&url).await?;
        debug!(count = decks.len(), "Fetched flashcard decks");
        Ok(decks)
    }

    /// Fetch all quizzes the user has not completed yet.
    pub async fn fetch_incomplete_quizzes(&self, user_id: &str) -> Result<Vec<QuizRow>, ApiError> {
        let url = format!(
            "{}/rest/v1/quizzes?user_id=eq.{}&completed_at=is.null&select=id,title,subject,questions",
            self.base_url, user_id
        );
        let quizzes: Vec<QuizRow> = self.get(&url).await?;
        debug!(count = quizzes.len(), "Fetched incomplete quizzes");
        Ok(quizzes)
    }

    // ===== Replay operations =====

    /// Overwrite a deck's mastered count and last-reviewed timestamp.
    /// Last-write-wins by deck id, so replaying is safe.
    pub async fn update_deck_review(
        &self,
        deck_id: &str,
        mastered_count: u32,
        reviewed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/rest/v1/flashcard_decks?id=eq.{}", self.base_url, deck_id);
        let body = serde_json::json!({
            "mastered_count": mastered_count,
            "last_reviewed_at": reviewed_at.to_rfc3339(),
        });
        self.patch(&url, &body).await
    }

    /// Overwrite a quiz's score and completion timestamp.
    /// Last-write-wins by quiz id, so replaying is safe.
    pub async fn update_quiz_result(
        &self,
        quiz_id: &str,
        score: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/rest/v1/quizzes?id=eq.{}", self.base_url, quiz_id);
        let body = serde_json::json!({
            "score": score,
            "completed_at": completed_at.to_rfc3339(),
        });
        self.patch(&url, &body).await
    }
}
