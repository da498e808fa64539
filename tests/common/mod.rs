pub mod builders;
pub mod mocks;

use spool::downloads::{DownloadCoordinator, FileValidator};
use spool::events::EventBus;
use spool::library::LibraryStore;
use spool::source::MediaSource;
use spool::workers::LibraryReconciler;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Everything a sweep test needs, wired the way the application wires it.
pub struct TestContext {
    pub store: Arc<LibraryStore>,
    pub events: Arc<EventBus>,
    pub reconciler: Arc<LibraryReconciler>,
    pub temp_dir: TempDir,
}

impl TestContext {
    pub async fn new(source: Arc<dyn MediaSource>) -> Self {
        Self::with_item_delay(source, Duration::ZERO).await
    }

    /// Start from a library document left behind by a "previous session".
    pub async fn seeded(
        source: Arc<dyn MediaSource>,
        items: &[spool::models::LibraryItem],
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        builders::write_library_document(&temp_dir.path().join("library.json"), items).await;
        Self::build(source, Duration::ZERO, temp_dir).await
    }

    pub async fn with_item_delay(source: Arc<dyn MediaSource>, item_delay: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::build(source, item_delay, temp_dir).await
    }

    async fn build(source: Arc<dyn MediaSource>, item_delay: Duration, temp_dir: TempDir) -> Self {
        let store = Arc::new(
            LibraryStore::open(temp_dir.path().join("library.json"))
                .await
                .expect("Failed to open test library"),
        );
        let events = Arc::new(EventBus::new(128));
        let reconciler = Arc::new(LibraryReconciler::new(
            Arc::clone(&store),
            source,
            DownloadCoordinator::new(),
            FileValidator::default(),
            Arc::clone(&events),
            temp_dir.path().join("downloads"),
            item_delay,
        ));

        Self {
            store,
            events,
            reconciler,
            temp_dir,
        }
    }

    pub fn library_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("library.json")
    }
}
