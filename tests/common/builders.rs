use chrono::Utc;
use serde_json::json;
use spool::models::{DownloadStatus, LibraryItem, LibraryItemId, MediaId};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct LibraryItemBuilder {
    media_id: String,
    title: String,
    download_status: DownloadStatus,
    file_path: Option<PathBuf>,
    file_size_bytes: Option<u64>,
}

impl LibraryItemBuilder {
    pub fn new(media_id: &str) -> Self {
        Self {
            media_id: media_id.to_string(),
            title: format!("Video {}", media_id),
            download_status: DownloadStatus::Pending,
            file_path: None,
            file_size_bytes: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_status(mut self, status: DownloadStatus) -> Self {
        self.download_status = status;
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size_bytes = Some(size);
        self
    }

    pub fn build(self) -> LibraryItem {
        LibraryItem {
            id: LibraryItemId::new(uuid::Uuid::new_v4().to_string()),
            media_id: MediaId::new(self.media_id.clone()),
            title: self.title,
            channel: Some("Test Channel".to_string()),
            thumbnail_url: None,
            source_url: None,
            file_path: self.file_path,
            file_name: format!("{}.mp4", self.media_id),
            file_size_bytes: self.file_size_bytes,
            duration_seconds: Some(60),
            tags: BTreeSet::new(),
            is_favorite: false,
            play_count: 0,
            last_played_at: None,
            date_added: Utc::now(),
            download_status: self.download_status,
            download_started_at: None,
            download_completed_at: None,
            cached_metadata: None,
            source: "mock".to_string(),
        }
    }
}

/// Write a library document directly, simulating state left behind by a
/// previous session.
pub async fn write_library_document(path: &Path, items: &[LibraryItem]) {
    let document = json!({ "items": items });
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, serde_json::to_string_pretty(&document).unwrap())
        .await
        .unwrap();
}
