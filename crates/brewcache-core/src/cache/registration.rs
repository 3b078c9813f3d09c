//! The host side of the cache manager.
//!
//! A [`Registration`] owns the active and waiting generations and is the
//! single entry point the app talks to: it installs new versions, forwards
//! control messages, dispatches requests to whichever generation is active,
//! and routes notification clicks to an open client.

use std::sync::Arc;

use reqwest::Url;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    ActivationReport, CacheBucket, CacheName, CacheStorage, CacheWorker, Client, ClientId,
    ClientRegistry, ControlMessage, Interception, LifecycleError, LifecycleState, Notification,
    NotificationCenter, NotificationId, RouteTable, Routed, StoreError,
};
use crate::config::CacheConfig;
use crate::net::{Fetch, FetchError, Request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The active generation already carries this version.
    Unchanged,
    /// Installed; waits for `SKIP_WAITING` before taking over.
    Waiting,
    /// First install: activated straight away.
    Activated(ActivationReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(ClientId),
    Opened(ClientId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub cache_name: String,
    pub state: LifecycleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketStatus {
    pub name: String,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub scope: String,
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub buckets: Vec<BucketStatus>,
    pub clients: usize,
}

type Slot<S, F> = RwLock<Option<Arc<CacheWorker<S, F>>>>;

pub struct Registration<S: CacheStorage, F: Fetch> {
    storage: Arc<S>,
    fetcher: Arc<F>,
    scope: Url,
    routes: RouteTable,
    active: Slot<S, F>,
    waiting: Slot<S, F>,
    /// Serialises install and activation so two versions never race.
    lifecycle: Mutex<()>,
    clients: ClientRegistry,
    notifications: NotificationCenter,
}

impl<S: CacheStorage, F: Fetch + 'static> Registration<S, F> {
    pub fn new(storage: S, fetcher: F, config: &CacheConfig) -> Result<Self, LifecycleError> {
        Ok(Self {
            storage: Arc::new(storage),
            fetcher: Arc::new(fetcher),
            scope: config.scope()?,
            routes: config.routes()?,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            lifecycle: Mutex::new(()),
            clients: ClientRegistry::new(),
            notifications: NotificationCenter::new(),
        })
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Name of the generation currently routing requests.
    pub async fn active_name(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|w| w.cache_name().to_string())
    }

    pub async fn waiting_name(&self) -> Option<String> {
        self.waiting
            .read()
            .await
            .as_ref()
            .map(|w| w.cache_name().to_string())
    }

    pub async fn update_waiting(&self) -> bool {
        self.waiting.read().await.is_some()
    }

    fn build_worker(
        &self,
        cache_name: CacheName,
        config: &CacheConfig,
    ) -> Result<CacheWorker<S, F>, LifecycleError> {
        Ok(CacheWorker::new(
            cache_name,
            config.scope()?,
            config.manifest.clone(),
            config.routes()?,
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
        ))
    }

    /// Adopt the generations an earlier run left in storage, without
    /// fetching anything. Returns the name of the generation now active.
    pub async fn restore(&self, config: &CacheConfig) -> Result<Option<String>, LifecycleError> {
        let _guard = self.lifecycle.lock().await;
        self.restore_persisted(config).await
    }

    /// Caller must hold `lifecycle`.
    ///
    /// Only generations with the configured prefix and a version no newer
    /// than the configured one are considered. Activation leaves a single
    /// generation behind, so when two survive, the older one was serving and
    /// the configured one was installed but never took over.
    async fn restore_persisted(
        &self,
        config: &CacheConfig,
    ) -> Result<Option<String>, LifecycleError> {
        if self.active.read().await.is_some() {
            return Ok(None);
        }
        let configured = config.cache_name()?;

        let mut persisted = Vec::new();
        for name in self.storage.keys().await? {
            let Some(parsed) = CacheName::parse(&name) else {
                continue;
            };
            if parsed.prefix() != configured.prefix() || parsed.version() > configured.version() {
                continue;
            }
            match self.storage.get(&name).await? {
                Some(bucket) if !bucket.keys().await?.is_empty() => persisted.push(parsed),
                _ => debug!(cache = %name, "Skipping empty generation"),
            }
        }
        persisted.sort_by(|a, b| a.version().cmp(b.version()));

        let Some(oldest) = persisted.first().cloned() else {
            return Ok(None);
        };
        if let Some(newest) = persisted.last().filter(|n| **n != oldest && **n == configured) {
            let worker = self
                .build_worker(newest.clone(), config)?
                .restored(LifecycleState::Waiting);
            info!(cache = %newest, "Restored waiting generation");
            *self.waiting.write().await = Some(Arc::new(worker));
        }

        let worker = self
            .build_worker(oldest.clone(), config)?
            .restored(LifecycleState::Active);
        info!(cache = %oldest, "Restored active generation");
        *self.active.write().await = Some(Arc::new(worker));

        Ok(Some(oldest.to_string()))
    }

    /// Install the generation described by `config` unless it is already
    /// active. Generations persisted by an earlier run are adopted first.
    pub async fn register(&self, config: &CacheConfig) -> Result<RegisterOutcome, LifecycleError> {
        let _guard = self.lifecycle.lock().await;
        let cache_name = config.cache_name()?;

        if let Err(e) = self.restore_persisted(config).await {
            warn!(error = %e, "Could not restore persisted generations");
        }

        let active = self.active.read().await.clone();
        if let Some(active) = &active {
            if *active.cache_name() == cache_name {
                debug!(cache = %cache_name, "Generation already active");
                return Ok(RegisterOutcome::Unchanged);
            }
        }
        let waiting = self.waiting.read().await.clone();
        if let Some(waiting) = &waiting {
            if *waiting.cache_name() == cache_name {
                debug!(cache = %cache_name, "Generation already waiting");
                return Ok(RegisterOutcome::Waiting);
            }
        }

        let worker = Arc::new(self.build_worker(cache_name, config)?);
        worker.install().await?;

        let superseded = self.waiting.write().await.replace(worker);
        if let Some(superseded) = superseded {
            superseded.mark_redundant().await;
        }

        if active.is_none() {
            // Nothing is serving yet, so there is nobody to wait for
            return match self.promote_waiting().await? {
                Some(report) => Ok(RegisterOutcome::Activated(report)),
                None => Ok(RegisterOutcome::Waiting),
            };
        }

        info!("Update installed, waiting for SKIP_WAITING");
        Ok(RegisterOutcome::Waiting)
    }

    pub async fn post_message(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ActivationReport>, LifecycleError> {
        match message {
            ControlMessage::SkipWaiting => {
                let _guard = self.lifecycle.lock().await;
                let report = self.promote_waiting().await?;
                if report.is_none() {
                    debug!("SKIP_WAITING with no waiting generation");
                }
                Ok(report)
            }
        }
    }

    /// Deliver a raw JSON message; unrecognised messages are ignored.
    pub async fn post_raw_message(
        &self,
        raw: &str,
    ) -> Result<Option<ActivationReport>, LifecycleError> {
        match ControlMessage::parse(raw) {
            Some(message) => self.post_message(message).await,
            None => {
                debug!(raw, "Ignoring unknown control message");
                Ok(None)
            }
        }
    }

    /// Caller must hold `lifecycle`.
    async fn promote_waiting(&self) -> Result<Option<ActivationReport>, LifecycleError> {
        let Some(worker) = self.waiting.read().await.clone() else {
            return Ok(None);
        };

        let report = worker.activate(&self.clients).await?;

        self.waiting.write().await.take();
        let previous = self.active.write().await.replace(worker);
        if let Some(previous) = previous {
            previous.mark_redundant().await;
        }

        Ok(Some(report))
    }

    /// Hand a request to the active generation, or straight to the network
    /// when none is active.
    pub async fn dispatch(&self, request: Request) -> Interception {
        match self.active.read().await.clone() {
            Some(worker) => worker.intercept(request),
            None => Interception::passthrough(Arc::clone(&self.fetcher), request),
        }
    }

    pub async fn fetch(&self, request: Request) -> Result<Routed, FetchError> {
        self.dispatch(request).await.await
    }

    /// Open an app instance, controlled by the active generation if any.
    pub async fn open_client(&self, url: &Url) -> Client {
        let controller = self.active_name().await;
        self.clients.open_window(url, controller.as_deref()).await
    }

    pub async fn show_notification(&self, title: &str, body: &str) -> Notification {
        self.notifications.show(title, body).await
    }

    /// Close the notification, then focus an open client of the app or open
    /// a new one at the scope root.
    pub async fn notification_click(&self, id: NotificationId) -> ClickOutcome {
        self.notifications.close(id).await;

        for client in self.clients.match_all(true).await {
            let same_origin = Url::parse(&client.url)
                .map(|url| self.routes.is_app_origin(&url))
                .unwrap_or(false);
            if !same_origin {
                continue;
            }
            if let Some(focused) = self.clients.focus(client.id).await {
                debug!(client = focused.id, "Focused existing client");
                return ClickOutcome::Focused(focused.id);
            }
        }

        let opened = self.open_client(&self.scope).await;
        debug!(client = opened.id, "Opened new client");
        ClickOutcome::Opened(opened.id)
    }

    pub async fn notification_close(&self, id: NotificationId) -> bool {
        let closed = self.notifications.close(id).await;
        debug!(notification = id, closed, "Notification dismissed");
        closed
    }

    pub async fn snapshot(&self) -> Result<RegistrationStatus, StoreError> {
        let active = match self.active.read().await.clone() {
            Some(w) => Some(worker_status(&w).await),
            None => None,
        };
        let waiting = match self.waiting.read().await.clone() {
            Some(w) => Some(worker_status(&w).await),
            None => None,
        };

        let mut buckets = Vec::new();
        for name in self.storage.keys().await? {
            // Evicted since it was listed
            let Some(bucket) = self.storage.get(&name).await? else {
                continue;
            };
            let entries = bucket.keys().await?.len();
            buckets.push(BucketStatus { name, entries });
        }

        Ok(RegistrationStatus {
            scope: self.scope.to_string(),
            active,
            waiting,
            buckets,
            clients: self.clients.len().await,
        })
    }
}

async fn worker_status<S: CacheStorage, F: Fetch + 'static>(
    worker: &CacheWorker<S, F>,
) -> WorkerStatus {
    WorkerStatus {
        cache_name: worker.cache_name().to_string(),
        state: worker.state().await,
    }
}
