use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use spool::config::Config;
use spool::downloads::{DownloadCoordinator, FileValidator};
use spool::events::{EventBus, EventPayload, EventType};
use spool::library::LibraryStore;
use spool::source::{DirectSource, MediaSource};
use spool::workers::LibraryReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("spool=debug")
        .init();

    info!("Starting Spool");

    let config = Config::load()?;
    let store = Arc::new(LibraryStore::open(config.library_path()?).await?);
    info!("Library has {} items", store.len().await);

    let events = Arc::new(EventBus::new(256));
    let source: Arc<dyn MediaSource> = Arc::new(DirectSource::new(config.request_timeout()));

    let reconciler = Arc::new(LibraryReconciler::new(
        Arc::clone(&store),
        source,
        DownloadCoordinator::new(),
        FileValidator::default(),
        Arc::clone(&events),
        config.download_dir()?,
        config.sweep_item_delay(),
    ));

    // Surface sweep activity on the console
    let mut sweep_events = events.subscribe_to_types(vec![
        EventType::SweepProgress,
        EventType::SweepCompleted,
    ]);
    tokio::spawn(async move {
        while let Ok(event) = sweep_events.recv().await {
            match event.payload {
                EventPayload::Sweep(progress) => {
                    info!(
                        "Sweep: {} ({} done, {} failed, {} remaining)",
                        progress.current_title,
                        progress.completed,
                        progress.failed,
                        progress.remaining
                    );
                }
                EventPayload::SweepSummary(summary) => {
                    info!(
                        "Sweep complete: {} downloaded, {} failed of {}",
                        summary.completed, summary.failed, summary.total
                    );
                }
                _ => {}
            }
        }
    });

    // Ctrl-C stops the sweep after the in-flight item settles
    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                reconciler.stop();
            }
        });
    }

    if config.downloads.sweep_on_startup {
        reconciler.run().await?;
    }

    info!("Spool finished, library has {} items", store.len().await);
    Ok(())
}
