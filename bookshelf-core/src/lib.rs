//! Bookshelf Core Library
//!
//! Offline-first pieces of the Bookshelf reader: a versioned asset cache with
//! an install/activate lifecycle, a PDF reader session, and per-book reading
//! progress. Everything persists through a [`storage::StorageProvider`].

pub mod cache;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod reader;
pub mod storage;

pub use cache::{
    AssetCacheManager, CacheEvent, CacheManifest, CacheStatus, CacheStore, ControlMessage,
    LifecycleState,
};
pub use error::{CacheError, FetchError, ReaderError, Result, ShelfError, StorageError};
pub use fetch::{AssetRequest, AssetResponse, Destination, Fetcher};
pub use progress::{ProgressRecord, ProgressStore};
pub use reader::{BookConfig, ReaderConfig, ReaderSession, ReaderView};
pub use storage::{LocalStorage, MemoryStorage, StorageProvider};
