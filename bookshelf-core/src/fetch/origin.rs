//! Fetcher that serves an origin out of a storage provider

use super::{content_type_for, AssetRequest, AssetResponse, Fetcher};
use crate::error::{FetchError, StorageError};
use crate::storage::StorageProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Serves origin-relative paths from storage, like a static file server
///
/// Missing files become `404` responses. Absolute URLs go to the optional
/// remote fetcher and are otherwise unsupported.
pub struct StorageFetcher {
    storage: Arc<dyn StorageProvider>,
    remote: Option<Arc<dyn Fetcher>>,
}

impl StorageFetcher {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            storage,
            remote: None,
        }
    }

    /// Route absolute URLs (CDN scripts, web fonts) to another fetcher
    pub fn with_remote(mut self, remote: Arc<dyn Fetcher>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Map a request path to a storage key: `/` and directories map to `index.html`
    fn storage_key(url: &str) -> String {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let path = path.trim_start_matches('/');
        if path.is_empty() || path.ends_with('/') {
            format!("{}index.html", path)
        } else {
            path.to_string()
        }
    }
}

#[async_trait]
impl Fetcher for StorageFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        if request.is_absolute() {
            return match &self.remote {
                Some(remote) => remote.fetch(request).await,
                None => Err(FetchError::Unsupported(request.url.clone())),
            };
        }

        let key = Self::storage_key(&request.url);
        match self.storage.read(&key).await {
            Ok(body) => Ok(AssetResponse::ok(content_type_for(&key), body)),
            Err(StorageError::NotFound(_)) => Ok(AssetResponse::not_found()),
            Err(StorageError::PermissionDenied(_)) => Ok(AssetResponse::new(
                403,
                Some("text/plain".to_string()),
                b"Forbidden".to_vec(),
            )),
            Err(e) => Err(FetchError::Network(e.to_string())),
        }
    }
}
