use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{MediaId, MediaMetadata, SearchResult};

/// Errors surfaced by a media source.
///
/// `Clone` is required: a settlement is shared verbatim with every caller
/// joined on the same in-flight download.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("media not found: {0}")]
    NotFound(String),

    #[error("rate limited by source")]
    RateLimited,

    #[error("io error: {0}")]
    Io(String),

    #[error("operation not supported by this source: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

/// Result of a finished download operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size_bytes: u64,
    /// True when the source short-circuited because a valid file was
    /// already present at the destination.
    pub already_existed: bool,
}

/// A platform the application can search and download media from.
///
/// Media ids are opaque to everything above this trait; only the source
/// that minted an id may interpret it.
#[async_trait]
pub trait MediaSource: Send + Sync + fmt::Debug {
    /// Search the platform. Sources without search support should return
    /// an empty list rather than an error.
    async fn search(&self, query: &str, limit: usize)
    -> Result<Vec<SearchResult>, SourceError>;

    /// Fetch descriptive metadata for a media id.
    async fn fetch_metadata(&self, media_id: &MediaId) -> Result<MediaMetadata, SourceError>;

    /// Download the media behind `media_id` into `destination_dir`.
    ///
    /// Safe to invoke once per coordinator cycle; implementations may
    /// short-circuit when a complete file already exists.
    async fn download(
        &self,
        media_id: &MediaId,
        destination_dir: &Path,
    ) -> Result<DownloadOutcome, SourceError>;

    /// Platform tag stored on library items produced from this source.
    fn source_tag(&self) -> &str;
}

/// Best-effort file removal; an already-absent file is success.
pub async fn delete_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("Failed to delete {:?}: {}", path, e);
            false
        }
    }
}
