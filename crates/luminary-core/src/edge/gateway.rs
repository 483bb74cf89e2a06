//! Network gateway behind the fetch strategies.
//!
//! The seam exists so the strategy laws are testable without a network: the
//! cache-first property ("if cached, the network is never contacted") is
//! asserted against a scripted gateway with a call counter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use super::{CachedResponse, EdgeError};

/// Timeout for edge fetches. Shorter than the API client's: a navigation
/// that cannot answer quickly should fall back to cache instead of hanging
/// the page load.
const FETCH_TIMEOUT_SECS: u64 = 15;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Perform a GET and snapshot whatever came back. Non-2xx statuses are
    /// snapshots too, not errors; only transport failures are `Err`.
    async fn fetch(&self, url: &str) -> Result<CachedResponse, EdgeError>;
}

/// Production gateway over reqwest.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    /// Origin prepended to path-only URLs, e.g. `https://app.luminarystudy.com`.
    origin: String,
}

impl HttpGateway {
    pub fn new(origin: impl Into<String>) -> Result<Self, EdgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
        })
    }

    fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.origin, url)
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch(&self, url: &str) -> Result<CachedResponse, EdgeError> {
        let response = self.client.get(self.absolute(url)).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(CachedResponse {
            url: url.to_string(),
            status,
            headers,
            body,
            fetched_at: Utc::now(),
        })
    }
}
