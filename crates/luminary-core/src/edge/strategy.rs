//! Per-request caching strategy.
//!
//! Only GETs are intercepted. Backend API paths pass through untouched -
//! caching authenticated endpoints would serve stale or cross-user data, so
//! the bypass is a correctness rule, not an optimization. Navigations are
//! network-first (fresh content online, cached shell offline); static assets
//! are cache-first (latency and offline availability win, assets only change
//! on redeploy).

use std::sync::Arc;

use tracing::{debug, warn};

use super::{CachePartition, CachedResponse, Gateway};

/// What the request says it is loading, mirroring the fetch destinations the
/// edge cache distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A navigation to an HTML document.
    Document,
    Image,
    Script,
    Style,
    Font,
    /// Anything else (API calls, beacons, media...).
    Other,
}

impl Destination {
    fn is_static_asset(&self) -> bool {
        matches!(
            self,
            Destination::Image | Destination::Script | Destination::Style | Destination::Font
        )
    }
}

/// An intercepted request, reduced to what strategy selection needs.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub destination: Destination,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, destination: Destination) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            destination,
        }
    }

    /// Path component of the URL, for API-prefix matching.
    fn path(&self) -> &str {
        let rest = self
            .url
            .strip_prefix("http://")
            .or_else(|| self.url.strip_prefix("https://"));
        match rest {
            Some(rest) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
            None => &self.url,
        }
    }
}

/// How the router answered a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not intercepted: the caller talks to the network directly.
    Bypass,
    /// Answered with a response snapshot.
    Serve {
        response: CachedResponse,
        source: ResponseSource,
    },
    /// Offline with nothing cached; there is no response to give.
    Unavailable,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Navigation fallback to the cached root document.
    OfflineShell,
}

/// Applies the per-class strategy against the two live partitions.
pub struct FetchRouter<G: Gateway> {
    gateway: Arc<G>,
    static_partition: CachePartition,
    offline_partition: CachePartition,
    api_prefixes: Vec<String>,
    /// URL of the root document served as the last-resort navigation fallback.
    shell_root: String,
}

impl<G: Gateway> FetchRouter<G> {
    pub fn new(
        gateway: Arc<G>,
        static_partition: CachePartition,
        offline_partition: CachePartition,
        api_prefixes: Vec<String>,
        shell_root: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            static_partition,
            offline_partition,
            api_prefixes,
            shell_root: shell_root.into(),
        }
    }

    /// Decide and (where the strategy says so) answer one request.
    pub async fn handle(&self, request: &FetchRequest) -> FetchDecision {
        if request.method != "GET" {
            return FetchDecision::Bypass;
        }
        let path = request.path();
        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            debug!(url = %request.url, "Backend API request passed through");
            return FetchDecision::Bypass;
        }

        match request.destination {
            Destination::Document => self.network_first(request).await,
            d if d.is_static_asset() => self.cache_first(request).await,
            _ => FetchDecision::Bypass,
        }
    }

    /// Network-first: fresh content when online, cached copy when not,
    /// cached root document as the last resort.
    async fn network_first(&self, request: &FetchRequest) -> FetchDecision {
        match self.gateway.fetch(&request.url).await {
            Ok(response) if response.is_success() => {
                self.best_effort_put(&self.static_partition, &response);
                FetchDecision::Serve {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Ok(response) => {
                debug!(url = %request.url, status = response.status, "Navigation fetch not ok, falling back to cache");
                self.navigation_fallback(request)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation fetch failed, falling back to cache");
                self.navigation_fallback(request)
            }
        }
    }

    fn navigation_fallback(&self, request: &FetchRequest) -> FetchDecision {
        if let Some(response) = self.lookup(&request.url) {
            return FetchDecision::Serve {
                response,
                source: ResponseSource::Cache,
            };
        }
        match self.best_effort_get(&self.static_partition, &self.shell_root) {
            Some(response) => FetchDecision::Serve {
                response,
                source: ResponseSource::OfflineShell,
            },
            None => FetchDecision::Unavailable,
        }
    }

    /// Cache-first: if a matching entry exists the network is never
    /// contacted.
    async fn cache_first(&self, request: &FetchRequest) -> FetchDecision {
        if let Some(response) = self.lookup(&request.url) {
            return FetchDecision::Serve {
                response,
                source: ResponseSource::Cache,
            };
        }
        match self.gateway.fetch(&request.url).await {
            Ok(response) => {
                if response.is_success() {
                    self.best_effort_put(&self.static_partition, &response);
                }
                FetchDecision::Serve {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Asset fetch failed with no cached copy");
                FetchDecision::Unavailable
            }
        }
    }

    /// Exact-URL lookup across the static partition, then the pinned
    /// offline-content partition.
    fn lookup(&self, url: &str) -> Option<CachedResponse> {
        self.best_effort_get(&self.static_partition, url)
            .or_else(|| self.best_effort_get(&self.offline_partition, url))
    }

    fn best_effort_get(&self, partition: &CachePartition, url: &str) -> Option<CachedResponse> {
        match partition.get(url) {
            Ok(found) => found,
            Err(e) => {
                warn!(partition = partition.name(), url, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// A cache-write failure never fails the user-visible response.
    fn best_effort_put(&self, partition: &CachePartition, response: &CachedResponse) {
        if let Err(e) = partition.put(response) {
            warn!(partition = partition.name(), url = %response.url, error = %e, "Cache write failed, serving response anyway");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::edge::{EdgeError, PartitionStore};

    /// Scripted gateway with a call counter.
    #[derive(Default)]
    struct FakeGateway {
        responses: Mutex<HashMap<String, CachedResponse>>,
        offline: bool,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn serving(urls: &[(&str, &[u8])]) -> Self {
            let gateway = Self::default();
            {
                let mut responses = gateway.responses.lock().unwrap();
                for (url, body) in urls {
                    responses.insert(url.to_string(), ok_response(url, body));
                }
            }
            gateway
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn fetch(&self, url: &str) -> Result<CachedResponse, EdgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline {
                return Err(EdgeError::InstallFailed(format!("offline: {}", url)));
            }
            match self.responses.lock().unwrap().get(url) {
                Some(response) => Ok(response.clone()),
                None => Ok(CachedResponse {
                    url: url.to_string(),
                    status: 404,
                    headers: vec![],
                    body: b"not found".to_vec(),
                    fetched_at: Utc::now(),
                }),
            }
        }
    }

    fn ok_response(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![],
            body: body.to_vec(),
            fetched_at: Utc::now(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: PartitionStore,
        gateway: Arc<FakeGateway>,
        router: FetchRouter<FakeGateway>,
    }

    fn fixture(gateway: FakeGateway) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().to_path_buf()).unwrap();
        let static_partition = store.partition("luminary-study-v1").unwrap();
        let offline_partition = store.partition("luminary-offline-v1").unwrap();
        let gateway = Arc::new(gateway);
        let router = FetchRouter::new(
            gateway.clone(),
            static_partition,
            offline_partition,
            vec!["/rest/v1".to_string(), "/auth/v1".to_string()],
            "/",
        );
        Fixture {
            _dir: dir,
            store,
            gateway,
            router,
        }
    }

    #[tokio::test]
    async fn test_cache_first_never_contacts_network_on_hit() {
        let f = fixture(FakeGateway::default());
        let partition = f.store.partition("luminary-study-v1").unwrap();
        partition.put(&ok_response("/app.js", b"cached")).unwrap();

        let decision = f
            .router
            .handle(&FetchRequest::get("/app.js", Destination::Script))
            .await;
        match decision {
            FetchDecision::Serve { response, source } => {
                assert_eq!(source, ResponseSource::Cache);
                assert_eq!(response.body, b"cached");
            }
            other => panic!("expected Serve, got {:?}", other),
        }
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_then_caches() {
        let f = fixture(FakeGateway::serving(&[("/app.js", b"fresh")]));

        let request = FetchRequest::get("/app.js", Destination::Script);
        let first = f.router.handle(&request).await;
        assert!(matches!(
            first,
            FetchDecision::Serve {
                source: ResponseSource::Network,
                ..
            }
        ));
        assert_eq!(f.gateway.call_count(), 1);

        // Second request is served from cache without another fetch.
        let second = f.router.handle(&request).await;
        assert!(matches!(
            second,
            FetchDecision::Serve {
                source: ResponseSource::Cache,
                ..
            }
        ));
        assert_eq!(f.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_navigation_network_first_updates_cache() {
        // Online navigations serve the network's content and replace any
        // stale cached copy with it.
        let f = fixture(FakeGateway::serving(&[("/home", b"new shell")]));
        let partition = f.store.partition("luminary-study-v1").unwrap();
        partition.put(&ok_response("/home", b"old shell")).unwrap();

        let decision = f
            .router
            .handle(&FetchRequest::get("/home", Destination::Document))
            .await;
        match decision {
            FetchDecision::Serve { response, source } => {
                assert_eq!(source, ResponseSource::Network);
                assert_eq!(response.body, b"new shell");
            }
            other => panic!("expected Serve, got {:?}", other),
        }
        let cached = partition.get("/home").unwrap().unwrap();
        assert_eq!(cached.body, b"new shell");
    }

    #[tokio::test]
    async fn test_navigation_offline_falls_back_to_exact_url() {
        let f = fixture(FakeGateway {
            offline: true,
            ..FakeGateway::default()
        });
        let partition = f.store.partition("luminary-study-v1").unwrap();
        partition.put(&ok_response("/home", b"cached page")).unwrap();

        let decision = f
            .router
            .handle(&FetchRequest::get("/home", Destination::Document))
            .await;
        assert!(matches!(
            decision,
            FetchDecision::Serve {
                source: ResponseSource::Cache,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_navigation_offline_falls_back_to_shell_root() {
        let f = fixture(FakeGateway {
            offline: true,
            ..FakeGateway::default()
        });
        let partition = f.store.partition("luminary-study-v1").unwrap();
        partition.put(&ok_response("/", b"shell")).unwrap();

        let decision = f
            .router
            .handle(&FetchRequest::get("/deep/link", Destination::Document))
            .await;
        match decision {
            FetchDecision::Serve { response, source } => {
                assert_eq!(source, ResponseSource::OfflineShell);
                assert_eq!(response.body, b"shell");
            }
            other => panic!("expected Serve, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_navigation_offline_with_empty_cache_is_unavailable() {
        let f = fixture(FakeGateway {
            offline: true,
            ..FakeGateway::default()
        });
        let decision = f
            .router
            .handle(&FetchRequest::get("/home", Destination::Document))
            .await;
        assert_eq!(decision, FetchDecision::Unavailable);
    }

    #[tokio::test]
    async fn test_api_prefixes_pass_through() {
        let f = fixture(FakeGateway::default());
        for url in [
            "/rest/v1/flashcard_decks?user_id=eq.u1",
            "https://backend.example.com/auth/v1/token",
        ] {
            let decision = f
                .router
                .handle(&FetchRequest::get(url, Destination::Other))
                .await;
            assert_eq!(decision, FetchDecision::Bypass);
        }
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let f = fixture(FakeGateway::default());
        let request = FetchRequest {
            url: "/home".to_string(),
            method: "POST".to_string(),
            destination: Destination::Document,
        };
        assert_eq!(f.router.handle(&request).await, FetchDecision::Bypass);
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pinned_offline_content_is_found() {
        let f = fixture(FakeGateway {
            offline: true,
            ..FakeGateway::default()
        });
        let offline = f.store.partition("luminary-offline-v1").unwrap();
        offline
            .put(&ok_response("/decks/contracts.json", b"deck"))
            .unwrap();

        // Pinned content answers even though the static partition misses.
        let decision = f
            .router
            .handle(&FetchRequest::get(
                "/decks/contracts.json",
                Destination::Image,
            ))
            .await;
        assert!(matches!(
            decision,
            FetchDecision::Serve {
                source: ResponseSource::Cache,
                ..
            }
        ));
        assert_eq!(f.gateway.call_count(), 0);
    }
}
