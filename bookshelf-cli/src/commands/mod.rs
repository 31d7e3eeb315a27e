//! CLI command implementations

mod cache;
mod download;
mod progress;
mod read;

pub use cache::{cache_install, cache_list};
pub use download::download;
pub use progress::progress;
pub use read::read;

use crate::{BookArgs, SourceArgs};
use anyhow::{Context, Result};
use bookshelf_core::cache::{AssetCacheManager, CacheManifest, CacheStore};
use bookshelf_core::fetch::{origin_fetcher, Fetcher};
use bookshelf_core::progress::ProgressStore;
use bookshelf_core::reader::BookConfig;
use bookshelf_core::storage::LocalStorage;
use std::path::Path;
use std::sync::Arc;

/// Cache generations live under `{data_dir}/cache`
fn cache_store(data_dir: &Path) -> CacheStore {
    CacheStore::new(Arc::new(LocalStorage::new(data_dir.join("cache"))))
}

/// Progress records live under `{data_dir}/progress`
fn progress_store(data_dir: &Path) -> ProgressStore {
    ProgressStore::new(Arc::new(LocalStorage::new(data_dir.join("progress"))))
}

async fn load_manifest(path: Option<&Path>) -> Result<CacheManifest> {
    match path {
        Some(path) => CacheManifest::load(path)
            .await
            .with_context(|| format!("Failed to load manifest: {}", path.display())),
        None => Ok(CacheManifest::default()),
    }
}

/// Cache manager in front of the origin, not yet installed
async fn cache_manager(
    data_dir: &Path,
    origin: &str,
    manifest: Option<&Path>,
) -> Result<AssetCacheManager> {
    let manifest = load_manifest(manifest).await?;
    let network =
        origin_fetcher(origin).with_context(|| format!("Invalid origin: {}", origin))?;
    Ok(AssetCacheManager::new(manifest, cache_store(data_dir), network))
}

/// Where the reader gets the PDF from
///
/// Cache-first unless disabled: a stored generation is reused, otherwise an
/// install is attempted and, if it fails, requests go straight to the origin.
async fn book_source(data_dir: &Path, source: &SourceArgs) -> Result<Arc<dyn Fetcher>> {
    if source.no_cache {
        return Ok(origin_fetcher(&source.origin)
            .with_context(|| format!("Invalid origin: {}", source.origin))?);
    }

    let cache = cache_manager(data_dir, &source.origin, source.manifest.as_deref()).await?;
    match cache.resume().await {
        Ok(true) => return Ok(Arc::new(cache)),
        Ok(false) => {}
        Err(e) => tracing::warn!("Could not reuse stored cache: {}", e),
    }
    if let Err(e) = cache.install().await {
        tracing::warn!("Reading without offline cache: {}", e);
    }
    Ok(Arc::new(cache))
}

/// Book selection with defaults filled in
fn book_config(args: &BookArgs) -> BookConfig {
    let defaults = BookConfig::default();
    BookConfig {
        id: args.book_id.clone().unwrap_or(defaults.id),
        pdf_path: args.pdf_path.clone().unwrap_or(defaults.pdf_path),
        title: args.title.clone().unwrap_or(defaults.title),
    }
}
