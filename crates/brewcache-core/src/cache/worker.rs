//! One cache generation's lifecycle and request interception.
//!
//! ```text
//! Installing --install ok--> Waiting --activate--> Activating --> Active
//!     |                         |                                  |
//!     +--install failed---------+--superseded----------------------+--> Redundant
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    CacheBucket, CacheName, CacheStorage, ClientRegistry, LifecycleError, PrecacheManifest,
    RoutePolicy, RouteTable,
};
use crate::net::{Fetch, FetchError, Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
    /// Install failed or a newer generation took over; never routes again.
    Redundant,
}

impl LifecycleState {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cache_name: String,
    pub assets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub cache_name: String,
    /// Generations deleted by the eviction sweep.
    pub evicted: Vec<String>,
    /// Clients now controlled by this generation.
    pub claimed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache { cached_at: DateTime<Utc> },
    Network,
}

/// A response handed back to the requester, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub response: Response,
    pub source: ResponseSource,
}

impl Routed {
    fn network(response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    pub fn from_cache(&self) -> bool {
        matches!(self.source, ResponseSource::Cache { .. })
    }
}

/// Pending work for one intercepted request.
///
/// Resolves once the response is available *and* any cache write it
/// triggered has finished; the dispatcher must await it before treating the
/// request as handled.
pub struct Interception {
    policy: RoutePolicy,
    work: BoxFuture<'static, Result<Routed, FetchError>>,
}

impl Interception {
    /// A request no generation controls: straight to the network.
    pub(crate) fn passthrough<F: Fetch + 'static>(fetcher: Arc<F>, request: Request) -> Self {
        Self {
            policy: RoutePolicy::NetworkOnly,
            work: async move { fetcher.fetch(&request).await.map(Routed::network) }.boxed(),
        }
    }

    pub fn policy(&self) -> RoutePolicy {
        self.policy
    }
}

impl Future for Interception {
    type Output = Result<Routed, FetchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.work.as_mut().poll(cx)
    }
}

/// The cache manager for one versioned generation.
pub struct CacheWorker<S: CacheStorage, F: Fetch> {
    cache_name: CacheName,
    base_url: Url,
    manifest: PrecacheManifest,
    routes: RouteTable,
    storage: Arc<S>,
    fetcher: Arc<F>,
    state: RwLock<LifecycleState>,
}

impl<S: CacheStorage, F: Fetch + 'static> CacheWorker<S, F> {
    pub fn new(
        cache_name: CacheName,
        base_url: Url,
        manifest: PrecacheManifest,
        routes: RouteTable,
        storage: Arc<S>,
        fetcher: Arc<F>,
    ) -> Self {
        Self {
            cache_name,
            base_url,
            manifest,
            routes,
            storage,
            fetcher,
            state: RwLock::new(LifecycleState::Installing),
        }
    }

    /// Take over a generation an earlier run already installed. Nothing is
    /// fetched; the worker starts in `state` (`Waiting` or `Active`).
    pub(crate) fn restored(self, state: LifecycleState) -> Self {
        Self {
            state: RwLock::new(state),
            ..self
        }
    }

    pub fn cache_name(&self) -> &CacheName {
        &self.cache_name
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.write().await;
        debug!(cache = %self.cache_name, from = %*current, to = %state, "Lifecycle transition");
        *current = state;
    }

    pub(crate) async fn mark_redundant(&self) {
        self.set_state(LifecycleState::Redundant).await;
    }

    /// Fetch and store every manifest asset.
    ///
    /// All-or-nothing: if any asset cannot be fetched (or comes back with a
    /// non-2xx status) nothing is written and the worker turns redundant.
    pub async fn install(&self) -> Result<InstallReport, LifecycleError> {
        let state = self.state().await;
        if state != LifecycleState::Installing {
            return Err(LifecycleError::InvalidTransition {
                state,
                event: "install",
            });
        }

        match self.precache().await {
            Ok(report) => {
                self.set_state(LifecycleState::Waiting).await;
                info!(cache = %self.cache_name, assets = report.assets, "Generation installed");
                Ok(report)
            }
            Err(e) => {
                warn!(cache = %self.cache_name, error = %e, "Install failed");
                self.mark_redundant().await;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<InstallReport, LifecycleError> {
        let urls = self
            .manifest
            .resolve_assets(&self.base_url)
            .map_err(|e| LifecycleError::InstallFailed {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        info!(cache = %self.cache_name, assets = urls.len(), "Pre-caching assets");

        let fetches = urls.into_iter().map(|url| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                let request = Request::get(url);
                let response = fetcher.fetch(&request).await.map_err(|e| {
                    LifecycleError::InstallFailed {
                        url: request.cache_key().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                if !response.is_ok() {
                    return Err(LifecycleError::InstallFailed {
                        url: request.cache_key().to_string(),
                        reason: format!("status {}", response.status),
                    });
                }
                Ok((request.cache_key().to_string(), response))
            }
        });
        let entries = try_join_all(fetches).await?;

        let name = self.cache_name.to_string();
        let existed = self.storage.has(&name).await.unwrap_or(false);
        let bucket = self.storage.open(&name).await?;
        if let Err(e) = bucket.put_all(&entries).await {
            if !existed {
                if let Err(cleanup) = self.storage.delete(&name).await {
                    warn!(cache = %name, error = %cleanup, "Failed to remove partial generation");
                }
            }
            return Err(e.into());
        }

        Ok(InstallReport {
            cache_name: name,
            assets: entries.len(),
        })
    }

    /// Evict every other generation, claim all open clients, go active.
    pub async fn activate(
        &self,
        clients: &ClientRegistry,
    ) -> Result<ActivationReport, LifecycleError> {
        let state = self.state().await;
        if state != LifecycleState::Waiting {
            return Err(LifecycleError::InvalidTransition {
                state,
                event: "activate",
            });
        }
        self.set_state(LifecycleState::Activating).await;

        let current = self.cache_name.to_string();
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(LifecycleState::Waiting).await;
                return Err(e.into());
            }
        };

        let mut evicted = Vec::new();
        for name in names.into_iter().filter(|n| *n != current) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    info!(cache = %name, "Evicted stale generation");
                    evicted.push(name);
                }
                Ok(false) => debug!(cache = %name, "Generation already gone"),
                Err(e) => warn!(cache = %name, error = %e, "Failed to evict generation"),
            }
        }

        let claimed = clients.claim(&current).await;
        self.set_state(LifecycleState::Active).await;
        info!(cache = %current, evicted = evicted.len(), claimed, "Generation active");

        Ok(ActivationReport {
            cache_name: current,
            evicted,
            claimed,
        })
    }

    /// Route one request according to its [`RoutePolicy`].
    pub fn intercept(&self, request: Request) -> Interception {
        let policy = self.routes.classify(request.url());
        if !policy.reads_cache() {
            return Interception::passthrough(Arc::clone(&self.fetcher), request);
        }

        let storage = Arc::clone(&self.storage);
        let fetcher = Arc::clone(&self.fetcher);
        let name = self.cache_name.to_string();

        let work = async move {
            let key = request.cache_key();

            // An evicted generation must not be resurrected by a late request
            let bucket = match storage.get(&name).await {
                Ok(Some(bucket)) => Some(bucket),
                Ok(None) => {
                    debug!(cache = %name, "Generation bucket gone, bypassing cache");
                    None
                }
                Err(e) => {
                    warn!(cache = %name, error = %e, "Cache unavailable, going to network");
                    None
                }
            };

            if let Some(bucket) = &bucket {
                match bucket.match_key(key).await {
                    Ok(Some(hit)) => {
                        debug!(url = key, "Cache hit");
                        return Ok(Routed {
                            response: hit.data,
                            source: ResponseSource::Cache {
                                cached_at: hit.cached_at,
                            },
                        });
                    }
                    Ok(None) => debug!(url = key, "Cache miss"),
                    Err(e) => debug!(url = key, error = %e, "Cache read failed, treating as miss"),
                }
            }

            let response = fetcher.fetch(&request).await?;

            if policy.should_store(response.status) {
                if let Some(bucket) = &bucket {
                    if let Err(e) = bucket.put(key, &response).await {
                        warn!(url = key, error = %e, "Failed to cache response");
                    }
                }
            } else {
                debug!(url = key, status = response.status, "Response not cached");
            }

            Ok(Routed::network(response))
        }
        .boxed();

        Interception { policy, work }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::routing::DEFAULT_FONT_ORIGINS;
    use crate::cache::MemoryStorage;
    use crate::net::mock::MockFetcher;

    const BASE: &str = "http://localhost:8080/";

    fn manifest() -> PrecacheManifest {
        PrecacheManifest {
            assets: vec!["./".into(), "./index.html".into(), "./manifest.json".into()],
            font_stylesheets: vec![],
        }
    }

    fn shell_fetcher() -> MockFetcher {
        MockFetcher::new()
            .respond("http://localhost:8080/", 200, "<shell>")
            .respond("http://localhost:8080/index.html", 200, "<index>")
            .respond("http://localhost:8080/manifest.json", 200, "{}")
    }

    fn worker(
        version: &str,
        storage: Arc<MemoryStorage>,
        fetcher: Arc<MockFetcher>,
    ) -> CacheWorker<MemoryStorage, MockFetcher> {
        let base = Url::parse(BASE).unwrap();
        let routes = RouteTable::new(&base, &DEFAULT_FONT_ORIGINS).unwrap();
        CacheWorker::new(
            CacheName::new("v60-recipe", version).unwrap(),
            base,
            manifest(),
            routes,
            storage,
            fetcher,
        )
    }

    async fn active_worker(
        storage: Arc<MemoryStorage>,
        fetcher: Arc<MockFetcher>,
    ) -> CacheWorker<MemoryStorage, MockFetcher> {
        let w = worker("1.4.0", storage, fetcher);
        w.install().await.unwrap();
        w.activate(&ClientRegistry::new()).await.unwrap();
        w
    }

    fn get(url: &str) -> Request {
        Request::parse(url).unwrap()
    }

    // -------------------------------------------------------------------------
    // Install
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_install_success_moves_to_waiting() {
        let storage = Arc::new(MemoryStorage::new());
        let w = worker("1.4.0", storage.clone(), Arc::new(shell_fetcher()));

        let report = w.install().await.unwrap();

        assert_eq!(report.assets, 3);
        assert_eq!(w.state().await, LifecycleState::Waiting);
        let bucket = storage.open("v60-recipe-v1.4.0").await.unwrap();
        assert_eq!(bucket.keys().await.unwrap().len(), 3);
        let shell = bucket.match_key("http://localhost:8080/").await.unwrap().unwrap();
        assert_eq!(shell.data.body, b"<shell>");
    }

    #[tokio::test]
    async fn test_install_fetch_failure_leaves_no_generation() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = shell_fetcher().fail("http://localhost:8080/manifest.json");
        let w = worker("1.4.0", storage.clone(), Arc::new(fetcher));

        let result = w.install().await;

        match result {
            Err(LifecycleError::InstallFailed { url, .. }) => {
                assert_eq!(url, "http://localhost:8080/manifest.json");
            }
            other => panic!("expected install failure, got {other:?}"),
        }
        assert_eq!(w.state().await, LifecycleState::Redundant);
        assert!(!storage.has("v60-recipe-v1.4.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_non_ok_status_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = shell_fetcher();
        fetcher.set_response("http://localhost:8080/index.html", 404, "missing");
        let w = worker("1.4.0", storage.clone(), Arc::new(fetcher));

        assert!(w.install().await.is_err());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_keeps_previous_generation() {
        let storage = Arc::new(MemoryStorage::new());
        let old = active_worker(storage.clone(), Arc::new(shell_fetcher())).await;

        let broken = Arc::new(MockFetcher::new());
        let next = worker("1.5.0", storage.clone(), broken);
        assert!(next.install().await.is_err());

        assert_eq!(old.state().await, LifecycleState::Active);
        assert_eq!(storage.keys().await.unwrap(), vec!["v60-recipe-v1.4.0"]);
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let w = worker("1.4.0", storage, Arc::new(shell_fetcher()));
        w.install().await.unwrap();
        assert!(matches!(
            w.install().await,
            Err(LifecycleError::InvalidTransition { event: "install", .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Activate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_activate_evicts_every_other_generation() {
        let storage = Arc::new(MemoryStorage::new());
        storage.open("v60-recipe-v1.2.0").await.unwrap();
        storage.open("v60-recipe-v1.3.0").await.unwrap();
        storage.open("something-else").await.unwrap();

        let w = worker("1.4.0", storage.clone(), Arc::new(shell_fetcher()));
        w.install().await.unwrap();
        let report = w.activate(&ClientRegistry::new()).await.unwrap();

        assert_eq!(w.state().await, LifecycleState::Active);
        assert_eq!(report.evicted.len(), 3);
        assert_eq!(storage.keys().await.unwrap(), vec!["v60-recipe-v1.4.0"]);
    }

    #[tokio::test]
    async fn test_activate_claims_existing_clients() {
        let storage = Arc::new(MemoryStorage::new());
        let clients = ClientRegistry::new();
        let base = Url::parse(BASE).unwrap();
        let before = clients.open_window(&base, None).await;

        let w = worker("1.4.0", storage, Arc::new(shell_fetcher()));
        w.install().await.unwrap();
        let report = w.activate(&clients).await.unwrap();

        assert_eq!(report.claimed, 1);
        assert_eq!(
            clients.get(before.id).await.unwrap().controller.as_deref(),
            Some("v60-recipe-v1.4.0")
        );
    }

    #[tokio::test]
    async fn test_activate_requires_waiting() {
        let storage = Arc::new(MemoryStorage::new());
        let w = worker("1.4.0", storage, Arc::new(shell_fetcher()));
        assert!(matches!(
            w.activate(&ClientRegistry::new()).await,
            Err(LifecycleError::InvalidTransition {
                state: LifecycleState::Installing,
                ..
            })
        ));
    }

    // -------------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_same_origin_serves_precached_without_network() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher());
        let w = active_worker(storage, fetcher.clone()).await;
        let calls_after_install = fetcher.total_calls();

        let routed = w.intercept(get("http://localhost:8080/index.html")).await.unwrap();

        assert!(routed.from_cache());
        assert_eq!(routed.response.body, b"<index>");
        assert_eq!(fetcher.total_calls(), calls_after_install);
    }

    #[tokio::test]
    async fn test_same_origin_200_is_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher().respond("http://localhost:8080/app.js", 200, "js"));
        let w = active_worker(storage.clone(), fetcher.clone()).await;

        let interception = w.intercept(get("http://localhost:8080/app.js"));
        assert_eq!(interception.policy(), RoutePolicy::SameOriginCacheFirst);
        let first = interception.await.unwrap();
        assert!(!first.from_cache());

        let bucket = storage.open("v60-recipe-v1.4.0").await.unwrap();
        assert!(bucket
            .match_key("http://localhost:8080/app.js")
            .await
            .unwrap()
            .is_some());

        let second = w.intercept(get("http://localhost:8080/app.js")).await.unwrap();
        assert!(second.from_cache());
        assert_eq!(fetcher.call_count("http://localhost:8080/app.js"), 1);
    }

    #[tokio::test]
    async fn test_same_origin_non_200_is_returned_not_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher =
            Arc::new(shell_fetcher().respond("http://localhost:8080/missing", 404, "not found"));
        let w = active_worker(storage.clone(), fetcher.clone()).await;

        let routed = w.intercept(get("http://localhost:8080/missing")).await.unwrap();
        assert_eq!(routed.response.status, 404);

        let bucket = storage.open("v60-recipe-v1.4.0").await.unwrap();
        assert!(bucket
            .match_key("http://localhost:8080/missing")
            .await
            .unwrap()
            .is_none());

        w.intercept(get("http://localhost:8080/missing")).await.unwrap();
        assert_eq!(fetcher.call_count("http://localhost:8080/missing"), 2);
    }

    #[tokio::test]
    async fn test_font_is_stored_regardless_of_status() {
        let font = "https://fonts.gstatic.com/s/inter/missing.woff2";
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher().respond(font, 503, "busy"));
        let w = active_worker(storage.clone(), fetcher.clone()).await;

        let first = w.intercept(get(font)).await.unwrap();
        assert_eq!(first.response.status, 503);
        assert!(!first.from_cache());

        let second = w.intercept(get(font)).await.unwrap();
        assert!(second.from_cache());
        assert_eq!(second.response.status, 503);
        assert_eq!(fetcher.call_count(font), 1);
    }

    #[tokio::test]
    async fn test_other_origin_bypasses_cache() {
        let api = "https://api.github.com/repos/DevSecNinja/v60-recipe";
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher().respond(api, 200, "{}"));
        let w = active_worker(storage.clone(), fetcher.clone()).await;

        let interception = w.intercept(get(api));
        assert_eq!(interception.policy(), RoutePolicy::NetworkOnly);
        interception.await.unwrap();
        w.intercept(get(api)).await.unwrap();

        assert_eq!(fetcher.call_count(api), 2);
        let bucket = storage.open("v60-recipe-v1.4.0").await.unwrap();
        assert!(bucket.match_key(api).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher().fail("http://localhost:8080/offline.json"));
        let w = active_worker(storage, fetcher).await;

        let result = w.intercept(get("http://localhost:8080/offline.json")).await;
        assert!(matches!(result, Err(FetchError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_evicted_generation_is_not_recreated() {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(shell_fetcher().respond("http://localhost:8080/new", 200, "fresh"));
        let w = active_worker(storage.clone(), fetcher).await;

        storage.delete("v60-recipe-v1.4.0").await.unwrap();
        let routed = w.intercept(get("http://localhost:8080/new")).await.unwrap();
        assert_eq!(routed.response.body, b"fresh");
        assert!(!routed.from_cache());
        assert!(!storage.has("v60-recipe-v1.4.0").await.unwrap());
    }

    /// Evicts a generation while the request is on the network.
    struct EvictingFetcher {
        storage: Arc<MemoryStorage>,
        inner: MockFetcher,
    }

    #[async_trait::async_trait]
    impl Fetch for EvictingFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.storage.delete("v60-recipe-v1.4.0").await.ok();
            self.inner.fetch(request).await
        }
    }

    #[tokio::test]
    async fn test_eviction_during_fetch_does_not_recreate_bucket() {
        let storage = Arc::new(MemoryStorage::new());
        let w = active_worker(storage.clone(), Arc::new(shell_fetcher())).await;

        let late = CacheWorker::new(
            w.cache_name().clone(),
            Url::parse(BASE).unwrap(),
            manifest(),
            w.routes().clone(),
            storage.clone(),
            Arc::new(EvictingFetcher {
                storage: storage.clone(),
                inner: MockFetcher::new().respond("http://localhost:8080/late", 200, "late"),
            }),
        );

        let routed = late.intercept(get("http://localhost:8080/late")).await.unwrap();

        assert_eq!(routed.response.body, b"late");
        assert!(!storage.has("v60-recipe-v1.4.0").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }
}
