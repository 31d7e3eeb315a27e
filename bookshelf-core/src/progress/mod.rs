//! Persisted reading progress
//!
//! One JSON record per book under `bookProgress_{bookId}`. The stored
//! percentage is redisplay-only; it is recomputed from the page numbers on
//! every write.

use crate::error::StorageError;
use crate::storage::StorageProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key prefix for progress records
pub const PROGRESS_KEY_PREFIX: &str = "bookProgress_";

/// Snapshot of reading position for one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub current_page: u32,
    pub total_pages: u32,
    pub last_read: DateTime<Utc>,
    pub percent_complete: u32,
}

impl ProgressRecord {
    pub fn new(current_page: u32, total_pages: u32, last_read: DateTime<Utc>) -> Self {
        Self {
            current_page,
            total_pages,
            last_read,
            percent_complete: percent_complete(current_page, total_pages),
        }
    }

    /// Record stamped with the current time
    pub fn now(current_page: u32, total_pages: u32) -> Self {
        Self::new(current_page, total_pages, Utc::now())
    }
}

/// `round(current / total * 100)`, 0 for an empty document
pub fn percent_complete(current_page: u32, total_pages: u32) -> u32 {
    if total_pages == 0 {
        return 0;
    }
    (f64::from(current_page) / f64::from(total_pages) * 100.0).round() as u32
}

/// Storage key for a book's record
pub fn progress_key(book_id: &str) -> String {
    format!("{}{}", PROGRESS_KEY_PREFIX, book_id)
}

/// Reads and writes progress records in a key-value store
#[derive(Clone)]
pub struct ProgressStore {
    storage: Arc<dyn StorageProvider>,
}

impl ProgressStore {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Saved progress for a book, if any
    ///
    /// A record that no longer parses is logged and treated as absent.
    pub async fn load(&self, book_id: &str) -> Result<Option<ProgressRecord>, StorageError> {
        let key = progress_key(book_id);
        let data = match self.storage.read(&key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(book = book_id, "ignoring unreadable progress record: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist a fresh record for the given position
    pub async fn save(
        &self,
        book_id: &str,
        current_page: u32,
        total_pages: u32,
    ) -> Result<ProgressRecord, StorageError> {
        let record = ProgressRecord::now(current_page, total_pages);
        self.storage
            .write(&progress_key(book_id), serde_json::to_vec(&record)?)
            .await?;
        tracing::debug!(
            book = book_id,
            page = current_page,
            total = total_pages,
            percent = record.percent_complete,
            "progress saved"
        );
        Ok(record)
    }

    /// Forget a book's progress. Returns false if nothing was stored.
    pub async fn remove(&self, book_id: &str) -> Result<bool, StorageError> {
        match self.storage.delete(&progress_key(book_id)).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All stored records, most recently read first
    pub async fn list(&self) -> Result<Vec<(String, ProgressRecord)>, StorageError> {
        let mut records = Vec::new();
        for name in self.storage.list("").await? {
            let Some(book_id) = name.strip_prefix(PROGRESS_KEY_PREFIX) else {
                continue;
            };
            if let Some(record) = self.load(book_id).await? {
                records.push((book_id.to_string(), record));
            }
        }
        records.sort_by(|a, b| b.1.last_read.cmp(&a.1.last_read));
        Ok(records)
    }
}
