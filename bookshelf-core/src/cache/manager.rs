//! Install / activate / fetch lifecycle of the offline asset cache

use super::{CacheManifest, CacheStore};
use crate::error::{CacheError, FetchError};
use crate::fetch::{AssetRequest, AssetResponse, Destination, Fetcher};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Where the manager is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this manager will never take control
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

/// Lifecycle notifications for anyone watching the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Installing { generation: String },
    Installed { generation: String, assets: usize },
    InstallFailed { generation: String, message: String },
    GenerationDeleted { generation: String },
    Activated { generation: String },
}

/// Messages an open client can post to the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Promote a waiting generation to active right away
    SkipWaiting,
}

impl ControlMessage {
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim().trim_matches('"') {
            "skipWaiting" | "skip_waiting" | "SKIP_WAITING" => Some(ControlMessage::SkipWaiting),
            _ => None,
        }
    }
}

/// Snapshot of the manager for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub generation: String,
    pub state: LifecycleState,
    pub controlling: bool,
    pub generations: Vec<String>,
}

/// Owns the current cache generation and answers requests cache-first
pub struct AssetCacheManager {
    manifest: CacheManifest,
    store: CacheStore,
    network: Arc<dyn Fetcher>,
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
    events: broadcast::Sender<CacheEvent>,
}

impl AssetCacheManager {
    pub fn new(manifest: CacheManifest, store: CacheStore, network: Arc<dyn Fetcher>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            manifest,
            store,
            network,
            state: Mutex::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
            events,
        }
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    pub fn generation(&self) -> &str {
        &self.manifest.generation
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap()
    }

    /// Whether requests are being intercepted
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        // Ignore errors (no subscribers)
        let _ = self.events.send(event);
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state.lock().unwrap() = next;
    }

    /// Move to `next` if the current state is one of `allowed`
    fn transition(
        &self,
        allowed: &[LifecycleState],
        expected: &'static str,
        next: LifecycleState,
    ) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        if !allowed.contains(&*state) {
            return Err(CacheError::InvalidState {
                expected,
                actual: state.as_str(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Populate the current generation from the manifest
    ///
    /// Fail-fast: one failed asset fails the whole install and nothing is
    /// committed. On success, activates immediately when skip-waiting was
    /// requested.
    pub async fn install(&self) -> Result<(), CacheError> {
        self.transition(
            &[LifecycleState::Parsed, LifecycleState::Redundant],
            "parsed",
            LifecycleState::Installing,
        )?;

        let generation = self.manifest.generation.clone();
        tracing::info!(generation = %generation, "installing asset cache");
        self.emit(CacheEvent::Installing {
            generation: generation.clone(),
        });

        let created = match self.store.open(&generation).await {
            Ok(created) => created,
            Err(e) => return Err(self.fail_install(e)),
        };

        match self.populate(&generation).await {
            Ok(assets) => {
                self.set_state(LifecycleState::Installed);
                tracing::info!(generation = %generation, assets, "all assets cached");
                self.emit(CacheEvent::Installed {
                    generation,
                    assets,
                });
            }
            Err(e) => {
                if created {
                    if let Err(cleanup) = self.store.delete(&generation).await {
                        tracing::warn!("failed to remove partial generation: {}", cleanup);
                    }
                }
                return Err(self.fail_install(e));
            }
        }

        if self.manifest.skip_waiting_on_install {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(())
    }

    fn fail_install(&self, error: CacheError) -> CacheError {
        self.set_state(LifecycleState::Redundant);
        tracing::error!(generation = %self.manifest.generation, "cache install failed: {}", error);
        self.emit(CacheEvent::InstallFailed {
            generation: self.manifest.generation.clone(),
            message: error.to_string(),
        });
        error
    }

    async fn populate(&self, generation: &str) -> Result<usize, CacheError> {
        let fetches = self.manifest.assets.iter().map(|url| async move {
            let request = AssetRequest::new(url.clone(), Destination::Empty);
            let response =
                self.network
                    .fetch(&request)
                    .await
                    .map_err(|e| CacheError::InstallFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;
            if !response.is_success() {
                return Err(CacheError::InstallFailed {
                    url: url.clone(),
                    reason: format!("HTTP status {}", response.status),
                });
            }
            Ok((request, response))
        });

        // Everything is fetched before anything is written
        let responses = try_join_all(fetches).await?;
        for (request, response) in &responses {
            self.store.put(generation, request.key(), response).await?;
        }
        Ok(responses.len())
    }

    /// Take control again with a generation a previous process installed
    ///
    /// Succeeds only from `Parsed` and only when every manifest asset is
    /// already stored. Returns false, leaving the state untouched, otherwise.
    pub async fn resume(&self) -> Result<bool, CacheError> {
        if self.state() != LifecycleState::Parsed {
            return Ok(false);
        }
        let generation = &self.manifest.generation;
        if !self.store.has(generation).await? {
            return Ok(false);
        }
        let stored = self.store.keys(generation).await?;
        if let Some(missing) = self
            .manifest
            .assets
            .iter()
            .find(|asset| stored.binary_search(*asset).is_err())
        {
            tracing::info!(generation = %generation, missing = %missing, "stored generation incomplete");
            return Ok(false);
        }

        self.transition(
            &[LifecycleState::Parsed],
            "parsed",
            LifecycleState::Installed,
        )?;
        tracing::info!(generation = %generation, "resuming stored cache generation");
        self.activate().await?;
        Ok(true)
    }

    /// Evict every stale generation and take control of all clients
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.transition(
            &[LifecycleState::Installed],
            "installed",
            LifecycleState::Activating,
        )?;
        tracing::info!(generation = %self.manifest.generation, "activating asset cache");

        let deleted = match self.evict_stale().await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(LifecycleState::Installed);
                return Err(e);
            }
        };

        self.controlling.store(true, Ordering::SeqCst);
        self.set_state(LifecycleState::Activated);
        tracing::info!(generation = %self.manifest.generation, "asset cache activated");
        self.emit(CacheEvent::Activated {
            generation: self.manifest.generation.clone(),
        });
        Ok(deleted)
    }

    async fn evict_stale(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for generation in self.store.generations().await? {
            if generation == self.manifest.generation {
                continue;
            }
            tracing::info!(generation = %generation, "deleting old cache");
            self.store.delete(&generation).await?;
            self.emit(CacheEvent::GenerationDeleted {
                generation: generation.clone(),
            });
            deleted.push(generation);
        }
        Ok(deleted)
    }

    /// Handle a message posted by a client
    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), CacheError> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state() == LifecycleState::Installed {
                    self.activate().await?;
                }
                Ok(())
            }
        }
    }

    /// Answer a request: cache first, then network with write-through
    pub async fn handle_fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        if !self.is_controlling() {
            return self.network.fetch(request).await;
        }

        let generation = &self.manifest.generation;
        match self.store.get(generation, request.key()).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %request.url, "cache hit");
                return Ok(cached);
            }
            Ok(None) => tracing::debug!(url = %request.url, "cache miss"),
            Err(e) => tracing::warn!(url = %request.url, "cache lookup failed: {}", e),
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    let copy = response.clone();
                    if let Err(e) = self.store.put(generation, request.key(), &copy).await {
                        tracing::warn!(url = %request.url, "re-cache failed: {}", e);
                    }
                }
                Ok(response)
            }
            Err(error) => {
                if request.destination == Destination::Document {
                    match self.store.get(generation, &self.manifest.root_document).await {
                        Ok(Some(page)) => {
                            tracing::info!(url = %request.url, "offline, serving cached root document");
                            return Ok(page);
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!("root document lookup failed: {}", e),
                    }
                }
                Err(error)
            }
        }
    }

    /// Current lifecycle snapshot
    pub async fn status(&self) -> Result<CacheStatus, CacheError> {
        Ok(CacheStatus {
            generation: self.manifest.generation.clone(),
            state: self.state(),
            controlling: self.is_controlling(),
            generations: self.store.generations().await?,
        })
    }
}

#[async_trait]
impl Fetcher for AssetCacheManager {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        self.handle_fetch(request).await
    }
}
