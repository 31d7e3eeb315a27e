//! Error types for Bookshelf Core

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Top-level error type for all Bookshelf operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the asset cache lifecycle
#[derive(Debug, Error)]
pub enum CacheError {
    /// An asset in the install manifest could not be fetched
    #[error("Install failed while caching {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Writing an entry into a generation failed
    #[error("Cache write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    /// A lifecycle transition was requested from the wrong state
    #[error("Invalid lifecycle transition: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// A stored entry could not be decoded
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    /// Generation tags double as directory names
    #[error("Invalid generation tag: {0:?}")]
    InvalidGeneration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the network port
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request never produced a response (offline, DNS, refused)
    #[error("Network error: {0}")]
    Network(String),

    /// The fetcher cannot serve this kind of URL
    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

/// Errors raised by the reader session
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The document could not be fetched or parsed
    #[error("Failed to load document: {0}")]
    DocumentLoad(String),

    /// A single page failed to render
    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("Page {page} is out of range (1..={total})")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Reader session is not open")]
    NotOpen,

    #[error("Download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors that occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
