use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::downloads::DownloadCoordinator;
use crate::events::{DownloadEventOutcome, EventBus};
use crate::library::{LibraryItemPatch, LibraryStore};
use crate::models::{
    DownloadStatus, LibraryItem, LibraryItemId, NewLibraryItem, SearchResult,
};
use crate::source::{MediaSource, delete_file};
use crate::utils::fuzzy_match;

/// User-facing library operations: everything the UI surfaces call.
///
/// All mutations go through the store and publish on the bus so every
/// observer re-derives its view from persisted state.
pub struct LibraryService {
    store: Arc<LibraryStore>,
    source: Arc<dyn MediaSource>,
    coordinator: DownloadCoordinator,
    events: Arc<EventBus>,
    download_dir: PathBuf,
}

impl LibraryService {
    pub fn new(
        store: Arc<LibraryStore>,
        source: Arc<dyn MediaSource>,
        coordinator: DownloadCoordinator,
        events: Arc<EventBus>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            source,
            coordinator,
            events,
            download_dir,
        }
    }

    /// Search the source platform, ranking hits against the query with
    /// the fuzzy matcher. Hits that don't match at all keep their
    /// source-given position after the matching ones.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let results = self
            .source
            .search(query, limit)
            .await
            .context("Search against source failed")?;

        let mut scored: Vec<(usize, Option<i64>, SearchResult)> = results
            .into_iter()
            .enumerate()
            .map(|(position, result)| (position, fuzzy_match(query, &result.title), result))
            .collect();

        scored.sort_by(|(pos_a, score_a, _), (pos_b, score_b, _)| match (score_a, score_b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => pos_a.cmp(pos_b),
        });

        Ok(scored.into_iter().map(|(_, _, result)| result).collect())
    }

    /// Add a search hit to the library as a pending item.
    ///
    /// Metadata is snapshotted best-effort for instant display; a
    /// metadata failure never blocks the add.
    pub async fn add_to_library(&self, result: SearchResult) -> Result<LibraryItem> {
        let cached_metadata = match self.source.fetch_metadata(&result.media_id).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!("No metadata snapshot for {}: {}", result.media_id, e);
                None
            }
        };

        let file_name = format!(
            "{}.mp4",
            crate::utils::sanitize_filename(&result.title)
        );

        let item = self
            .store
            .add(NewLibraryItem {
                media_id: result.media_id,
                title: result.title,
                channel: result.author,
                thumbnail_url: result.thumbnail_url,
                source_url: result.source_url,
                file_name,
                duration_seconds: result.duration_seconds,
                download_status: DownloadStatus::Pending,
                cached_metadata,
                source: self.source.source_tag().to_string(),
            })
            .await?;

        info!("Added {} ({}) to library", item.title, item.media_id);
        self.events
            .emit_item_added(item.id.clone(), item.media_id.clone())
            .await?;
        self.events.emit_library_changed().await?;

        Ok(item)
    }

    /// Foreground download of a library item through the coordinator.
    ///
    /// Joins an already in-flight download for the same media id instead
    /// of starting a second transfer. Errors surface to the caller after
    /// the failure has been persisted and published.
    pub async fn download_item(&self, id: &LibraryItemId) -> Result<LibraryItem> {
        let item = self
            .store
            .get_by_id(id)
            .await
            .with_context(|| format!("No library item {}", id))?;

        self.store
            .update(
                id,
                LibraryItemPatch::new()
                    .with_status(DownloadStatus::Downloading)
                    .with_download_started_at(Utc::now()),
            )
            .await?;
        self.events
            .emit_download_started(item.id.clone(), item.media_id.clone())
            .await?;

        let operation = {
            let source = Arc::clone(&self.source);
            let media_id = item.media_id.clone();
            let destination = self.download_dir.clone();
            async move { source.download(&media_id, &destination).await }
        };

        match self
            .coordinator
            .start_download(&item.media_id, operation)
            .await
        {
            Ok(outcome) => {
                let updated = self
                    .store
                    .update(
                        id,
                        LibraryItemPatch::new()
                            .with_status(DownloadStatus::Completed)
                            .with_file_path(outcome.file_path.clone())
                            .with_file_name(outcome.file_name.clone())
                            .with_file_size(outcome.file_size_bytes)
                            .with_download_completed_at(Utc::now()),
                    )
                    .await?;
                self.events
                    .emit_download_settled(
                        item.id.clone(),
                        item.media_id.clone(),
                        DownloadEventOutcome::Completed {
                            file_path: outcome.file_path,
                            file_size_bytes: outcome.file_size_bytes,
                        },
                    )
                    .await?;
                self.events.emit_library_changed().await?;
                Ok(updated)
            }
            Err(e) => {
                self.store
                    .update(id, LibraryItemPatch::new().with_status(DownloadStatus::Failed))
                    .await?;
                self.events
                    .emit_download_settled(
                        item.id.clone(),
                        item.media_id.clone(),
                        DownloadEventOutcome::Failed {
                            error: e.to_string(),
                        },
                    )
                    .await?;
                self.events.emit_library_changed().await?;
                Err(e).with_context(|| format!("Download failed for {}", item.title))
            }
        }
    }

    /// Retry a failed item. Same path as a fresh foreground download;
    /// if the media id is somehow still in flight, the retry joins it.
    pub async fn retry_download(&self, id: &LibraryItemId) -> Result<LibraryItem> {
        self.download_item(id).await
    }

    /// Remove an item and best-effort delete its backing file.
    pub async fn remove_item(&self, id: &LibraryItemId) -> Result<()> {
        let removed = self.store.remove(id).await?;

        if let Some(ref path) = removed.file_path {
            if !delete_file(path).await {
                warn!("Leaving orphaned file behind: {:?}", path);
            }
        }

        info!("Removed {} ({}) from library", removed.title, removed.id);
        self.events
            .emit_item_removed(removed.id.clone(), removed.media_id.clone())
            .await?;
        self.events.emit_library_changed().await?;

        Ok(())
    }

    pub async fn toggle_favorite(&self, id: &LibraryItemId) -> Result<LibraryItem> {
        let item = self
            .store
            .get_by_id(id)
            .await
            .with_context(|| format!("No library item {}", id))?;

        let updated = self
            .store
            .update(
                id,
                LibraryItemPatch::new().with_favorite(!item.is_favorite),
            )
            .await?;
        self.events
            .emit_item_updated(updated.id.clone(), updated.media_id.clone())
            .await?;

        Ok(updated)
    }

    /// Record a playback: bump the play count and stamp the time.
    pub async fn record_playback(&self, id: &LibraryItemId) -> Result<LibraryItem> {
        let item = self
            .store
            .get_by_id(id)
            .await
            .with_context(|| format!("No library item {}", id))?;

        let updated = self
            .store
            .update(
                id,
                LibraryItemPatch::new()
                    .with_play_count(item.play_count + 1)
                    .with_last_played_at(Utc::now()),
            )
            .await?;
        self.events
            .emit_item_updated(updated.id.clone(), updated.media_id.clone())
            .await?;

        Ok(updated)
    }

    /// Whether a download for this item is currently in flight.
    pub fn is_downloading(&self, item: &LibraryItem) -> bool {
        self.coordinator.is_downloading(&item.media_id)
    }
}
