//! Network port: requests, responses and the fetchers that resolve them

mod http;
mod origin;

pub use http::HttpFetcher;
pub use origin::StorageFetcher;

use crate::error::FetchError;
use crate::storage::LocalStorage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What kind of resource a request is for
///
/// Mirrors the `Sec-Fetch-Dest` vocabulary; only `Document` changes
/// behavior (it may fall back to the cached app shell when offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value; unknown values map to `Empty`
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Destination::Document,
            "script" | "worker" | "sharedworker" | "serviceworker" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            _ => Destination::Empty,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Empty => "empty",
        }
    }
}

/// A request for one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    /// Request URL, either an absolute URL or an origin-relative path
    pub url: String,
    pub destination: Destination,
}

impl AssetRequest {
    pub fn new(url: impl Into<String>, destination: Destination) -> Self {
        Self {
            url: url.into(),
            destination,
        }
    }

    /// Request for a top-level page
    pub fn document(url: impl Into<String>) -> Self {
        Self::new(url, Destination::Document)
    }

    /// Cache key; requests match only on the exact URL
    pub fn key(&self) -> &str {
        &self.url
    }

    /// Whether the URL carries its own scheme and host
    pub fn is_absolute(&self) -> bool {
        self.url.contains("://")
    }
}

/// A response produced by the network or by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    /// A 200 response with the given body
    pub fn ok(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(200, Some(content_type.into()), body)
    }

    pub fn not_found() -> Self {
        Self::new(404, Some("text/plain".to_string()), b"Not Found".to_vec())
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can turn a request into a response
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a single asset. Non-2xx statuses are responses, not errors.
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError>;
}

/// Network fetcher for an origin given as an `http(s)://` URL or a directory
///
/// A directory origin is served like a static file server; absolute URLs
/// (CDN scripts, web fonts) still go over HTTP.
pub fn origin_fetcher(origin: &str) -> Result<Arc<dyn Fetcher>, FetchError> {
    if origin.starts_with("http://") || origin.starts_with("https://") {
        return Ok(Arc::new(HttpFetcher::new(origin)?));
    }
    let storage = Arc::new(LocalStorage::new(origin));
    let remote = Arc::new(HttpFetcher::absolute_only()?);
    Ok(Arc::new(StorageFetcher::new(storage).with_remote(remote)))
}

/// Guess a content type from a path's extension
pub fn content_type_for(path: &str) -> &'static str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
