use async_trait::async_trait;
use spool::models::{MediaId, MediaMetadata, SearchResult};
use spool::source::{DownloadOutcome, MediaSource, SourceError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted media source for exercising the download pipeline without a
/// network. Downloads succeed with the scripted size, or fail with the
/// injected error.
#[derive(Debug)]
pub struct MockMediaSource {
    sizes: HashMap<String, u64>,
    errors: Mutex<HashMap<String, String>>,
    op_delay: Duration,
    download_log: Mutex<Vec<String>>,
}

impl MockMediaSource {
    pub fn new() -> Self {
        Self {
            sizes: HashMap::new(),
            errors: Mutex::new(HashMap::new()),
            op_delay: Duration::ZERO,
            download_log: Mutex::new(Vec::new()),
        }
    }

    /// Script a successful download of `size` bytes for `media_id`.
    pub fn with_media(mut self, media_id: &str, size: u64) -> Self {
        self.sizes.insert(media_id.to_string(), size);
        self
    }

    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    pub fn inject_error(&self, media_id: &str, error: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(media_id.to_string(), error.to_string());
    }

    pub fn clear_error(&self, media_id: &str) {
        self.errors.lock().unwrap().remove(media_id);
    }

    /// Media ids in download order.
    pub fn download_log(&self) -> Vec<String> {
        self.download_log.lock().unwrap().clone()
    }
}

impl Default for MockMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        Ok(Vec::new())
    }

    async fn fetch_metadata(&self, media_id: &MediaId) -> Result<MediaMetadata, SourceError> {
        if !self.sizes.contains_key(media_id.as_str()) {
            return Err(SourceError::NotFound(media_id.to_string()));
        }
        Ok(MediaMetadata {
            title: format!("Mock {}", media_id),
            description: None,
            author: Some("Mock Channel".to_string()),
            duration_seconds: Some(60),
            view_count: Some(100),
            published_at: None,
            thumbnails: Vec::new(),
            format_options: Vec::new(),
        })
    }

    async fn download(
        &self,
        media_id: &MediaId,
        destination_dir: &Path,
    ) -> Result<DownloadOutcome, SourceError> {
        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }

        self.download_log
            .lock()
            .unwrap()
            .push(media_id.to_string());

        if let Some(error) = self.errors.lock().unwrap().get(media_id.as_str()) {
            return Err(SourceError::Network(error.clone()));
        }

        let size = self
            .sizes
            .get(media_id.as_str())
            .copied()
            .ok_or_else(|| SourceError::NotFound(media_id.to_string()))?;

        let file_name = format!("{}.mp4", media_id);
        Ok(DownloadOutcome {
            file_path: destination_dir.join(&file_name),
            file_name,
            file_size_bytes: size,
            already_existed: false,
        })
    }

    fn source_tag(&self) -> &str {
        "mock"
    }
}
