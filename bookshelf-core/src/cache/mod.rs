//! Offline asset cache
//!
//! A fixed manifest is cached into a versioned generation at install time,
//! stale generations are evicted at activation, and requests are then
//! answered cache-first with a network fallback that re-caches successful
//! responses.

mod manager;
mod manifest;
mod store;

pub use manager::{AssetCacheManager, CacheEvent, CacheStatus, ControlMessage, LifecycleState};
pub use manifest::{CacheManifest, DEFAULT_GENERATION, DEFAULT_ROOT_DOCUMENT};
pub use store::CacheStore;
