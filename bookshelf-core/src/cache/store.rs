//! Generation-partitioned response store

use crate::error::{CacheError, StorageError};
use crate::fetch::AssetResponse;
use crate::storage::StorageProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Marker written when a generation is opened, so empty generations are enumerable
const GENERATION_MARKER: &str = ".generation";

/// A cached response as laid out on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    status: u16,
    content_type: Option<String>,
    #[serde(with = "base64_serde")]
    body: Vec<u8>,
}

/// Named cache generations holding exact request-key to response entries
///
/// Layout: `{generation}/{sha256(key)}`, one JSON document per entry.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn StorageProvider>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    fn validate_tag(tag: &str) -> Result<(), CacheError> {
        let valid = !tag.is_empty()
            && !tag.starts_with('.')
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(CacheError::InvalidGeneration(tag.to_string()))
        }
    }

    fn entry_path(tag: &str, key: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}/{}", tag, hex::encode(hasher.finalize()))
    }

    fn marker_path(tag: &str) -> String {
        format!("{}/{}", tag, GENERATION_MARKER)
    }

    /// Open (or create) a generation. Returns true if it was created.
    pub async fn open(&self, tag: &str) -> Result<bool, CacheError> {
        Self::validate_tag(tag)?;
        let marker = Self::marker_path(tag);
        if self.storage.exists(&marker).await? {
            return Ok(false);
        }
        self.storage.write(&marker, tag.as_bytes().to_vec()).await?;
        Ok(true)
    }

    /// Whether a generation exists
    pub async fn has(&self, tag: &str) -> Result<bool, CacheError> {
        Self::validate_tag(tag)?;
        Ok(self.storage.exists(&Self::marker_path(tag)).await?)
    }

    /// All generation tags present in storage
    pub async fn generations(&self) -> Result<Vec<String>, CacheError> {
        let mut tags = Vec::new();
        for name in self.storage.list("").await? {
            if Self::validate_tag(&name).is_err() {
                continue;
            }
            // Stray files and foreign directories carry no marker
            if let Ok(true) = self.storage.exists(&Self::marker_path(&name)).await {
                tags.push(name);
            }
        }
        Ok(tags)
    }

    /// Delete a generation and all of its entries. Returns false if it did not exist.
    pub async fn delete(&self, tag: &str) -> Result<bool, CacheError> {
        Self::validate_tag(tag)?;
        match self.storage.delete_prefix(tag).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an entry by exact request key
    pub async fn get(&self, tag: &str, key: &str) -> Result<Option<AssetResponse>, CacheError> {
        Self::validate_tag(tag)?;
        let data = match self.storage.read(&Self::entry_path(tag, key)).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry = serde_json::from_slice(&data)
            .map_err(|e| CacheError::Corrupt(format!("{}: {}", key, e)))?;
        Ok(Some(AssetResponse::new(
            entry.status,
            entry.content_type,
            entry.body,
        )))
    }

    /// Write an entry, replacing any previous response for the key wholesale
    pub async fn put(
        &self,
        tag: &str,
        key: &str,
        response: &AssetResponse,
    ) -> Result<(), CacheError> {
        Self::validate_tag(tag)?;
        let entry = StoredEntry {
            url: key.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            body: response.body.clone(),
        };
        let data = serde_json::to_vec(&entry).map_err(|e| CacheError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        self.storage
            .write(&Self::entry_path(tag, key), data)
            .await
            .map_err(|e| CacheError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Request keys stored in a generation
    pub async fn keys(&self, tag: &str) -> Result<Vec<String>, CacheError> {
        Self::validate_tag(tag)?;
        let mut keys = Vec::new();
        for name in self.storage.list(tag).await? {
            if name == GENERATION_MARKER {
                continue;
            }
            let data = self.storage.read(&format!("{}/{}", tag, name)).await?;
            match serde_json::from_slice::<StoredEntry>(&data) {
                Ok(entry) => keys.push(entry.url),
                Err(e) => tracing::warn!(generation = tag, entry = %name, "skipping corrupt entry: {}", e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Base64 serialization for binary data
mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
