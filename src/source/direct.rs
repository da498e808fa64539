use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::traits::{DownloadOutcome, MediaSource, SourceError};
use crate::models::{FormatOption, MediaId, MediaMetadata, SearchResult};
use crate::utils::sanitize_filename;

/// A source for direct media URLs.
///
/// For this source the opaque media id *is* the URL of the file. There is
/// no search index behind it, so `search` always returns an empty list.
#[derive(Debug)]
pub struct DirectSource {
    http_client: Client,
}

impl DirectSource {
    pub fn new(request_timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client }
    }

    fn parse_media_url(media_id: &MediaId) -> Result<Url, SourceError> {
        Url::parse(media_id.as_str())
            .map_err(|e| SourceError::NotFound(format!("{}: {}", media_id, e)))
    }

    /// Derive a local file name from the URL's last path segment.
    fn file_name_for(url: &Url) -> String {
        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("media.bin");
        sanitize_filename(segment)
    }

    /// Size reported by the server, if it answers a HEAD request.
    ///
    /// Read from the Content-Length header; a HEAD response carries no
    /// body for `content_length()` to measure.
    async fn remote_size(&self, url: &Url) -> Option<u64> {
        match self.http_client.head(url.clone()).send().await {
            Ok(response) if response.status().is_success() => response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok()),
            Ok(response) => {
                debug!("HEAD {} answered {}", url, response.status());
                None
            }
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl MediaSource for DirectSource {
    async fn search(
        &self,
        query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, SourceError> {
        debug!("Direct source has no search index, query ignored: {}", query);
        Ok(Vec::new())
    }

    async fn fetch_metadata(&self, media_id: &MediaId) -> Result<MediaMetadata, SourceError> {
        let url = Self::parse_media_url(media_id)?;
        let file_name = Self::file_name_for(&url);
        let size = self.remote_size(&url).await;

        let title = Path::new(&file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&file_name)
            .to_string();
        let container = Path::new(&file_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());

        Ok(MediaMetadata {
            title,
            description: None,
            author: url.host_str().map(|h| h.to_string()),
            duration_seconds: None,
            view_count: None,
            published_at: None,
            thumbnails: Vec::new(),
            format_options: vec![FormatOption {
                format_id: "direct".to_string(),
                label: "Original file".to_string(),
                container,
                approx_size_bytes: size,
            }],
        })
    }

    async fn download(
        &self,
        media_id: &MediaId,
        destination_dir: &Path,
    ) -> Result<DownloadOutcome, SourceError> {
        let url = Self::parse_media_url(media_id)?;
        let file_name = Self::file_name_for(&url);
        let final_path = destination_dir.join(&file_name);

        tokio::fs::create_dir_all(destination_dir).await?;

        // Short-circuit when a complete file is already in place
        if let Ok(existing) = tokio::fs::metadata(&final_path).await
            && let Some(expected) = self.remote_size(&url).await
            && existing.len() == expected
        {
            info!(
                "File already complete, skipping transfer: {:?} ({} bytes)",
                final_path, expected
            );
            return Ok(DownloadOutcome {
                file_path: final_path,
                file_name,
                file_size_bytes: expected,
                already_existed: true,
            });
        }

        debug!("Starting transfer: {} -> {:?}", url, final_path);
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(SourceError::NotFound(media_id.to_string()));
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SourceError::RateLimited);
            }
            return Err(SourceError::Network(format!("HTTP error: {}", status)));
        }

        let total_size = response.content_length();

        // Stream into a partial file, rename into place only when complete
        let part_path = destination_dir.join(format!("{}.part", file_name));
        let mut file = tokio::fs::File::create(&part_path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| SourceError::Network(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);

        if let Some(total) = total_size
            && written != total
        {
            warn!(
                "Truncated transfer for {}: {} of {} bytes",
                url, written, total
            );
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(SourceError::Network(format!(
                "incomplete response: {} of {} bytes",
                written, total
            )));
        }

        tokio::fs::rename(&part_path, &final_path).await?;

        info!(
            "Transfer complete: {:?} ({} bytes)",
            final_path, written
        );
        Ok(DownloadOutcome {
            file_path: final_path,
            file_name,
            file_size_bytes: written,
            already_existed: false,
        })
    }

    fn source_tag(&self) -> &str {
        "direct"
    }
}
