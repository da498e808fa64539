mod identifiers;

pub use identifiers::{LibraryItemId, MediaId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Download lifecycle of a library item.
///
/// Transitions: `Pending -> Downloading -> {Completed, Failed}`; a failed
/// item may re-enter `Downloading` on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    /// Terminal statuses require an explicit retry to leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }
}

/// A persisted record for one media item the user has added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: LibraryItemId,
    pub media_id: MediaId,
    pub title: String,
    pub channel: Option<String>,
    pub thumbnail_url: Option<String>,
    pub source_url: Option<String>,
    pub file_path: Option<PathBuf>,
    pub file_name: String,
    pub file_size_bytes: Option<u64>,
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub play_count: u32,
    pub last_played_at: Option<DateTime<Utc>>,
    pub date_added: DateTime<Utc>,
    pub download_status: DownloadStatus,
    pub download_started_at: Option<DateTime<Utc>>,
    pub download_completed_at: Option<DateTime<Utc>>,
    pub cached_metadata: Option<MediaMetadata>,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "unknown".to_string()
}

impl LibraryItem {
    /// Expected on-disk size, used as the integrity-check hint.
    pub fn expected_size(&self) -> Option<u64> {
        self.file_size_bytes
    }
}

/// Fields supplied by the caller when inserting a new item; the store
/// assigns `id` and `date_added`.
#[derive(Debug, Clone)]
pub struct NewLibraryItem {
    pub media_id: MediaId,
    pub title: String,
    pub channel: Option<String>,
    pub thumbnail_url: Option<String>,
    pub source_url: Option<String>,
    pub file_name: String,
    pub duration_seconds: Option<u64>,
    pub download_status: DownloadStatus,
    pub cached_metadata: Option<MediaMetadata>,
    pub source: String,
}

/// Descriptive metadata captured from the source platform, snapshotted on
/// items at add-time for instant display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub duration_seconds: Option<u64>,
    pub view_count: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailInfo>,
    #[serde(default)]
    pub format_options: Vec<FormatOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailInfo {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub label: String,
    pub container: Option<String>,
    pub approx_size_bytes: Option<u64>,
}

/// A single hit returned by a source search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub media_id: MediaId,
    pub title: String,
    pub author: Option<String>,
    pub duration_seconds: Option<u64>,
    pub view_count_display: Option<String>,
    pub thumbnail_url: Option<String>,
    pub source_url: Option<String>,
}
