//! Install manifest: which generation to build and what goes into it

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Generation tag used when no manifest is supplied
pub const DEFAULT_GENERATION: &str = "bookshelf-v1";

/// Page served when a top-level navigation fails offline
pub const DEFAULT_ROOT_DOCUMENT: &str = "/index.html";

/// Description of one cache generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheManifest {
    /// Version tag; any other generation found at activation is deleted
    pub generation: String,

    /// Assets fetched and stored at install, in order
    pub assets: Vec<String>,

    /// Cached page returned for failed document requests
    pub root_document: String,

    /// Take over immediately after install instead of waiting
    pub skip_waiting_on_install: bool,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION.to_string(),
            assets: [
                "/",
                "/index.html",
                "/src/css/styles.css",
                "/src/js/script.js",
                "/src/js/pdf-reader.js",
                "/src/assets/icon.jpg",
                "/src/books/iseeyoureyes/frontiseeyoureyes.png",
                "/src/books/iseeyoureyes/backiseeyoureyes.png",
                "/src/books/iseeyoureyes/iseeonyoureyes.pdf",
                "/manifest.json",
                "https://fonts.googleapis.com/css2?family=Playfair+Display:wght@400;500;600;700&family=Inter:wght@300;400;500;600&display=swap",
                "https://cdnjs.cloudflare.com/ajax/libs/pdf.js/3.11.174/pdf.min.js",
                "https://cdnjs.cloudflare.com/ajax/libs/pdf.js/3.11.174/pdf.worker.min.js",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            root_document: DEFAULT_ROOT_DOCUMENT.to_string(),
            skip_waiting_on_install: true,
        }
    }
}

impl CacheManifest {
    /// Manifest for a generation with the given assets and default settings
    pub fn new(generation: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            generation: generation.into(),
            assets,
            ..Self::default()
        }
    }

    /// Load a manifest from a JSON file; missing fields take their defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let manifest = serde_json::from_slice(&data).map_err(StorageError::from)?;
        Ok(manifest)
    }
}
