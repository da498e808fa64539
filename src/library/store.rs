use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{
    DownloadStatus, LibraryItem, LibraryItemId, MediaId, MediaMetadata, NewLibraryItem,
};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("item not found: {0}")]
    NotFound(LibraryItemId),

    #[error("an item for media id {0} already exists")]
    Duplicate(MediaId),

    #[error("library storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for LibraryError {
    fn from(e: std::io::Error) -> Self {
        LibraryError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(e: serde_json::Error) -> Self {
        LibraryError::Storage(e.to_string())
    }
}

/// On-disk shape of the library. The whole document is rewritten on every
/// mutation; there are no partial-write transactions.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryDocument {
    #[serde(default)]
    items: Vec<LibraryItem>,
}

/// Partial update applied to a stored item. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct LibraryItemPatch {
    pub download_status: Option<DownloadStatus>,
    pub file_path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub download_started_at: Option<DateTime<Utc>>,
    pub download_completed_at: Option<DateTime<Utc>>,
    pub is_favorite: Option<bool>,
    pub play_count: Option<u32>,
    pub last_played_at: Option<DateTime<Utc>>,
    pub tags: Option<BTreeSet<String>>,
    pub cached_metadata: Option<MediaMetadata>,
}

impl LibraryItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: DownloadStatus) -> Self {
        self.download_status = Some(status);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size_bytes = Some(size);
        self
    }

    pub fn with_download_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.download_started_at = Some(at);
        self
    }

    pub fn with_download_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.download_completed_at = Some(at);
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.is_favorite = Some(favorite);
        self
    }

    pub fn with_play_count(mut self, count: u32) -> Self {
        self.play_count = Some(count);
        self
    }

    pub fn with_last_played_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_played_at = Some(at);
        self
    }

    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    fn apply(&self, item: &mut LibraryItem) {
        if let Some(status) = self.download_status {
            item.download_status = status;
        }
        if let Some(ref path) = self.file_path {
            item.file_path = Some(path.clone());
        }
        if let Some(ref name) = self.file_name {
            item.file_name = name.clone();
        }
        if let Some(size) = self.file_size_bytes {
            item.file_size_bytes = Some(size);
        }
        if let Some(at) = self.download_started_at {
            item.download_started_at = Some(at);
        }
        if let Some(at) = self.download_completed_at {
            item.download_completed_at = Some(at);
        }
        if let Some(favorite) = self.is_favorite {
            item.is_favorite = favorite;
        }
        if let Some(count) = self.play_count {
            item.play_count = count;
        }
        if let Some(at) = self.last_played_at {
            item.last_played_at = Some(at);
        }
        if let Some(ref tags) = self.tags {
            item.tags = tags.clone();
        }
        if let Some(ref metadata) = self.cached_metadata {
            item.cached_metadata = Some(metadata.clone());
        }
    }
}

/// Persisted library of media items, one JSON document on disk.
///
/// Concurrent writers are serialized through the in-memory lock; the
/// document is last-writer-wins by design (single-user application, and
/// observers re-read via the notification bus).
#[derive(Debug)]
pub struct LibraryStore {
    path: PathBuf,
    items: RwLock<Vec<LibraryItem>>,
}

impl LibraryStore {
    /// Open the store at `path`, creating an empty document if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();

        let document = if tokio::fs::try_exists(&path).await? {
            debug!("Loading library from {:?}", path);
            let contents = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<LibraryDocument>(&contents)?
        } else {
            info!("No library document found at {:?}, starting empty", path);
            LibraryDocument::default()
        };

        info!("Library loaded with {} items", document.items.len());
        Ok(Self {
            path,
            items: RwLock::new(document.items),
        })
    }

    /// All items in insertion order.
    pub async fn get_all(&self) -> Vec<LibraryItem> {
        self.items.read().await.clone()
    }

    pub async fn get_by_id(&self, id: &LibraryItemId) -> Option<LibraryItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| &item.id == id)
            .cloned()
    }

    pub async fn find_by_media_id(&self, media_id: &MediaId) -> Option<LibraryItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| &item.media_id == media_id)
            .cloned()
    }

    /// Insert a new item, assigning id and date_added. Rejects a second
    /// item for the same media id.
    pub async fn add(&self, new: NewLibraryItem) -> Result<LibraryItem, LibraryError> {
        let mut items = self.items.write().await;

        if items.iter().any(|item| item.media_id == new.media_id) {
            return Err(LibraryError::Duplicate(new.media_id));
        }

        let item = LibraryItem {
            id: LibraryItemId::new(uuid::Uuid::new_v4().to_string()),
            media_id: new.media_id,
            title: new.title,
            channel: new.channel,
            thumbnail_url: new.thumbnail_url,
            source_url: new.source_url,
            file_path: None,
            file_name: new.file_name,
            file_size_bytes: None,
            duration_seconds: new.duration_seconds,
            tags: BTreeSet::new(),
            is_favorite: false,
            play_count: 0,
            last_played_at: None,
            date_added: Utc::now(),
            download_status: new.download_status,
            download_started_at: None,
            download_completed_at: None,
            cached_metadata: new.cached_metadata,
            source: new.source,
        };

        items.push(item.clone());
        self.persist(&items).await?;

        debug!("Added library item {} ({})", item.id, item.title);
        Ok(item)
    }

    /// Apply a partial update to an existing item.
    pub async fn update(
        &self,
        id: &LibraryItemId,
        patch: LibraryItemPatch,
    ) -> Result<LibraryItem, LibraryError> {
        let mut items = self.items.write().await;

        let item = items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.clone()))?;

        patch.apply(item);
        let updated = item.clone();

        self.persist(&items).await?;
        Ok(updated)
    }

    /// Remove an item, returning the removed record.
    pub async fn remove(&self, id: &LibraryItemId) -> Result<LibraryItem, LibraryError> {
        let mut items = self.items.write().await;

        let position = items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.clone()))?;

        let removed = items.remove(position);
        self.persist(&items).await?;

        debug!("Removed library item {} ({})", removed.id, removed.title);
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the whole document atomically (temp file + rename).
    async fn persist(&self, items: &[LibraryItem]) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = LibraryDocument {
            items: items.to_vec(),
        };
        let contents = serde_json::to_string_pretty(&document)?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}
