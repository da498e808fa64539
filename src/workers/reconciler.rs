use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::downloads::{DownloadCoordinator, FileValidator};
use crate::events::{DownloadEventOutcome, EventBus, SweepProgress, SweepSummary};
use crate::library::{LibraryItemPatch, LibraryStore};
use crate::models::{DownloadStatus, LibraryItem};
use crate::source::MediaSource;

/// Default pause between drained items, to stay clear of source rate
/// limits and avoid saturating disk and network at once.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Scanning,
    Draining,
}

/// Background sweep that brings every library record claiming to be
/// downloadable to a valid local file.
///
/// Items are drained strictly one at a time. The downstream source is a
/// shared, rate-limited resource; a faster sweep is worth less than each
/// individual transfer finishing reliably.
pub struct LibraryReconciler {
    store: Arc<LibraryStore>,
    source: Arc<dyn MediaSource>,
    coordinator: DownloadCoordinator,
    validator: FileValidator,
    events: Arc<EventBus>,
    download_dir: PathBuf,
    item_delay: Duration,
    phase: Mutex<SweepPhase>,
    cancel: Mutex<CancellationToken>,
}

impl LibraryReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<LibraryStore>,
        source: Arc<dyn MediaSource>,
        coordinator: DownloadCoordinator,
        validator: FileValidator,
        events: Arc<EventBus>,
        download_dir: PathBuf,
        item_delay: Duration,
    ) -> Self {
        Self {
            store,
            source,
            coordinator,
            validator,
            events,
            download_dir,
            item_delay,
            phase: Mutex::new(SweepPhase::Idle),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn phase(&self) -> SweepPhase {
        *self.phase.lock().expect("sweep phase lock poisoned")
    }

    /// Run one full sweep. Returns `None` when a sweep is already active
    /// (the request is a no-op; the running sweep carries on).
    pub async fn run(&self) -> Result<Option<SweepSummary>> {
        let cancel = {
            let mut phase = self.phase.lock().expect("sweep phase lock poisoned");
            if *phase != SweepPhase::Idle {
                debug!("Sweep already active ({:?}), ignoring request", *phase);
                return Ok(None);
            }
            *phase = SweepPhase::Scanning;

            let mut token = self.cancel.lock().expect("sweep cancel lock poisoned");
            *token = CancellationToken::new();
            token.clone()
        };

        info!("Starting library reconciliation sweep");
        let queue = self.scan().await;
        let total = queue.len();

        if total == 0 {
            info!("Library is consistent, nothing to download");
            let summary = SweepSummary {
                completed: 0,
                failed: 0,
                total: 0,
            };
            self.events.emit_sweep_completed(summary.clone()).await?;
            self.set_phase(SweepPhase::Idle);
            return Ok(Some(summary));
        }

        info!("Sweep found {} items needing download", total);
        self.set_phase(SweepPhase::Draining);
        self.events.emit_sweep_started(total).await?;

        let mut completed = 0usize;
        let mut failed = 0usize;

        for (index, item) in queue.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Sweep stopped with {} of {} items processed",
                    index, total
                );
                break;
            }

            match self.drain_item(&item).await {
                Ok(()) => completed += 1,
                Err(e) => {
                    // One item's failure must not abort the rest of the queue
                    warn!("Sweep failed to repair {} ({}): {}", item.id, item.title, e);
                    failed += 1;
                }
            }

            self.events
                .emit_sweep_progress(SweepProgress {
                    current_item: item.id.clone(),
                    current_title: item.title.clone(),
                    completed,
                    failed,
                    remaining: total - (index + 1),
                    total,
                })
                .await?;

            if index + 1 < total && !cancel.is_cancelled() {
                tokio::time::sleep(self.item_delay).await;
            }
        }

        let summary = SweepSummary {
            completed,
            failed,
            total,
        };
        info!(
            "Sweep finished: {} completed, {} failed of {}",
            summary.completed, summary.failed, summary.total
        );
        self.events.emit_library_changed().await?;
        self.events.emit_sweep_completed(summary.clone()).await?;
        self.set_phase(SweepPhase::Idle);

        Ok(Some(summary))
    }

    /// Stop the active sweep. The item currently in flight settles first;
    /// completed updates are not rolled back.
    pub fn stop(&self) {
        let token = self.cancel.lock().expect("sweep cancel lock poisoned");
        if !token.is_cancelled() {
            info!("Stopping library sweep after in-flight item settles");
            token.cancel();
        }
    }

    fn set_phase(&self, phase: SweepPhase) {
        *self.phase.lock().expect("sweep phase lock poisoned") = phase;
    }

    /// Read all items and collect the drain queue in original order.
    async fn scan(&self) -> Vec<LibraryItem> {
        let mut queue = Vec::new();
        for item in self.store.get_all().await {
            if self.needs_download(&item).await {
                queue.push(item);
            }
        }
        queue
    }

    /// A record needs repair when its status never reached a usable
    /// terminal state, or its file is missing or fails validation.
    ///
    /// `pending` and `downloading` here mean a prior session was
    /// interrupted before settling; both take the same re-download path
    /// as `failed`.
    async fn needs_download(&self, item: &LibraryItem) -> bool {
        match item.download_status {
            DownloadStatus::Pending | DownloadStatus::Downloading | DownloadStatus::Failed => {
                return true;
            }
            DownloadStatus::Completed => {}
        }

        match &item.file_path {
            None => true,
            Some(path) => !self.validator.validate(path, item.expected_size()).await,
        }
    }

    /// Drive one item through the coordinator and record the outcome.
    async fn drain_item(&self, item: &LibraryItem) -> Result<()> {
        debug!("Repairing library item {} ({})", item.id, item.title);

        // Reflect the attempt immediately so concurrent UI reads see it
        self.store
            .update(
                &item.id,
                LibraryItemPatch::new()
                    .with_status(DownloadStatus::Downloading)
                    .with_download_started_at(Utc::now()),
            )
            .await?;

        let operation = {
            let source = Arc::clone(&self.source);
            let media_id = item.media_id.clone();
            let destination = self.download_dir.clone();
            async move { source.download(&media_id, &destination).await }
        };

        let result = self
            .coordinator
            .start_download(&item.media_id, operation)
            .await;

        match result {
            Ok(outcome) => {
                self.store
                    .update(
                        &item.id,
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
                Ok(())
            }
            Err(e) => {
                if let Err(store_err) = self
                    .store
                    .update(
                        &item.id,
                        LibraryItemPatch::new().with_status(DownloadStatus::Failed),
                    )
                    .await
                {
                    warn!("Could not record failure for {}: {}", item.id, store_err);
                }
                self.events
                    .emit_download_settled(
                        item.id.clone(),
                        item.media_id.clone(),
                        DownloadEventOutcome::Failed {
                            error: e.to_string(),
                        },
                    )
                    .await?;
                Err(e.into())
            }
        }
    }
}
