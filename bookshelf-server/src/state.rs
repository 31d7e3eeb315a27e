//! Application state and configuration

use anyhow::{Context, Result};
use bookshelf_core::cache::{AssetCacheManager, CacheEvent, CacheManifest, CacheStore};
use bookshelf_core::fetch::origin_fetcher;
use bookshelf_core::storage::LocalStorage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Server settings, read from `BOOKSHELF_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root of the cache generations
    pub storage_path: PathBuf,
    /// `http(s)://` URL or a directory of static files
    pub origin: String,
    /// JSON manifest; the built-in manifest is used when unset
    pub manifest_path: Option<PathBuf>,
    pub addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let storage_path = std::env::var("BOOKSHELF_STORAGE_PATH")
            .unwrap_or_else(|_| "./bookshelf_data".to_string());
        let origin = std::env::var("BOOKSHELF_ORIGIN").unwrap_or_else(|_| "./public".to_string());
        let manifest_path = std::env::var("BOOKSHELF_MANIFEST").ok().map(PathBuf::from);
        let addr = std::env::var("BOOKSHELF_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .context("BOOKSHELF_ADDR is not a socket address")?;

        Ok(Self {
            storage_path: PathBuf::from(storage_path),
            origin,
            manifest_path,
            addr,
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The offline cache fronting the origin
    pub cache: Arc<AssetCacheManager>,
}

impl AppState {
    /// Create application state from configuration
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage_path)
            .await
            .with_context(|| format!("creating {}", config.storage_path.display()))?;

        let manifest = match &config.manifest_path {
            Some(path) => CacheManifest::load(path)
                .await
                .with_context(|| format!("loading manifest {}", path.display()))?,
            None => CacheManifest::default(),
        };
        let network = origin_fetcher(&config.origin)?;
        let store = CacheStore::new(Arc::new(LocalStorage::new(&config.storage_path)));

        tracing::info!(
            generation = %manifest.generation,
            origin = %config.origin,
            assets = manifest.assets.len(),
            "cache configured"
        );
        let cache = Arc::new(AssetCacheManager::new(manifest, store, network));
        Ok(Self::with_cache(cache))
    }

    pub fn with_cache(cache: Arc<AssetCacheManager>) -> Self {
        Self { cache }
    }

    /// Subscribe to cache lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }
}
