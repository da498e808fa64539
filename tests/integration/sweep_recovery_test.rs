use crate::common::TestContext;
use crate::common::builders::LibraryItemBuilder;
use crate::common::mocks::MockMediaSource;
use spool::events::{EventPayload, EventType};
use spool::library::LibraryItemPatch;
use spool::models::{DownloadStatus, MediaId};
use spool::source::MediaSource;
use std::sync::Arc;

/// A crash mid-download leaves `downloading` with no file. The startup
/// sweep must classify it as repairable, re-download, and settle the
/// record with the real outcome.
#[tokio::test]
async fn test_sweep_recovers_item_interrupted_mid_download() {
    let source = Arc::new(MockMediaSource::new().with_media("abc", 10_485_760));
    let crashed = LibraryItemBuilder::new("abc")
        .with_status(DownloadStatus::Downloading)
        .build();
    let ctx = TestContext::seeded(
        Arc::clone(&source) as Arc<dyn MediaSource>,
        std::slice::from_ref(&crashed),
    )
    .await;

    let mut completed_sub = ctx
        .events
        .subscribe_to_types(vec![EventType::SweepCompleted]);

    let summary = ctx.reconciler.run().await.unwrap().unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total, 1);

    let repaired = ctx
        .store
        .find_by_media_id(&MediaId::from("abc"))
        .await
        .unwrap();
    assert_eq!(repaired.download_status, DownloadStatus::Completed);
    assert_eq!(repaired.file_size_bytes, Some(10_485_760));
    assert!(repaired.file_path.is_some());
    assert!(repaired.download_completed_at.is_some());

    let event = completed_sub.recv().await.unwrap();
    match event.payload {
        EventPayload::SweepSummary(s) => {
            assert_eq!((s.completed, s.failed, s.total), (1, 0, 1));
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    assert_eq!(source.download_log(), vec!["abc".to_string()]);
}

/// A file that exists but fails integrity checks is treated the same as
/// one that was never downloaded, and silently replaced.
#[tokio::test]
async fn test_sweep_replaces_corrupt_file() {
    let expected_size: u64 = 5 * 1024 * 1024;
    let source = Arc::new(MockMediaSource::new().with_media("bad", expected_size));
    let ctx = TestContext::new(Arc::clone(&source) as Arc<dyn MediaSource>).await;

    // Truncated leftover, far below the validator floor
    let corrupt_path = ctx.temp_dir.path().join("bad.mp4");
    tokio::fs::write(&corrupt_path, vec![0u8; 100 * 1024])
        .await
        .unwrap();

    let item = ctx
        .store
        .add(spool::models::NewLibraryItem {
            media_id: MediaId::from("bad"),
            title: "Corrupted Video".to_string(),
            channel: None,
            thumbnail_url: None,
            source_url: None,
            file_name: "bad.mp4".to_string(),
            duration_seconds: None,
            download_status: DownloadStatus::Pending,
            cached_metadata: None,
            source: "mock".to_string(),
        })
        .await
        .unwrap();
    ctx.store
        .update(
            &item.id,
            LibraryItemPatch::new()
                .with_status(DownloadStatus::Completed)
                .with_file_path(&corrupt_path)
                .with_file_size(expected_size),
        )
        .await
        .unwrap();

    let summary = ctx.reconciler.run().await.unwrap().unwrap();
    assert_eq!((summary.completed, summary.failed, summary.total), (1, 0, 1));

    let repaired = ctx.store.get_by_id(&item.id).await.unwrap();
    assert_eq!(repaired.download_status, DownloadStatus::Completed);
    assert_eq!(repaired.file_size_bytes, Some(expected_size));
    assert_eq!(source.download_log(), vec!["bad".to_string()]);
}

/// Healthy items are skipped; broken ones are repaired in scan order.
#[tokio::test]
async fn test_sweep_skips_healthy_items() {
    let source = Arc::new(
        MockMediaSource::new()
            .with_media("broken", 2 * 1024 * 1024)
            .with_media("never-started", 3 * 1024 * 1024),
    );
    let ctx = TestContext::new(Arc::clone(&source) as Arc<dyn MediaSource>).await;

    // A genuinely healthy item: completed, file present and matching
    let healthy_size: usize = 2 * 1024 * 1024;
    let healthy_path = ctx.temp_dir.path().join("healthy.mp4");
    tokio::fs::write(&healthy_path, vec![0u8; healthy_size])
        .await
        .unwrap();
    let healthy = ctx
        .store
        .add(spool::models::NewLibraryItem {
            media_id: MediaId::from("healthy"),
            title: "Healthy Video".to_string(),
            channel: None,
            thumbnail_url: None,
            source_url: None,
            file_name: "healthy.mp4".to_string(),
            duration_seconds: None,
            download_status: DownloadStatus::Pending,
            cached_metadata: None,
            source: "mock".to_string(),
        })
        .await
        .unwrap();
    ctx.store
        .update(
            &healthy.id,
            LibraryItemPatch::new()
                .with_status(DownloadStatus::Completed)
                .with_file_path(&healthy_path)
                .with_file_size(healthy_size as u64),
        )
        .await
        .unwrap();

    let broken = ctx
        .store
        .add(spool::models::NewLibraryItem {
            media_id: MediaId::from("broken"),
            title: "Broken Video".to_string(),
            channel: None,
            thumbnail_url: None,
            source_url: None,
            file_name: "broken.mp4".to_string(),
            duration_seconds: None,
            download_status: DownloadStatus::Pending,
            cached_metadata: None,
            source: "mock".to_string(),
        })
        .await
        .unwrap();
    ctx.store
        .update(
            &broken.id,
            LibraryItemPatch::new().with_status(DownloadStatus::Failed),
        )
        .await
        .unwrap();

    ctx.store
        .add(spool::models::NewLibraryItem {
            media_id: MediaId::from("never-started"),
            title: "Pending Video".to_string(),
            channel: None,
            thumbnail_url: None,
            source_url: None,
            file_name: "never-started.mp4".to_string(),
            duration_seconds: None,
            download_status: DownloadStatus::Pending,
            cached_metadata: None,
            source: "mock".to_string(),
        })
        .await
        .unwrap();

    let summary = ctx.reconciler.run().await.unwrap().unwrap();
    assert_eq!((summary.completed, summary.failed, summary.total), (2, 0, 2));

    // Drained in scan order, healthy item untouched
    assert_eq!(
        source.download_log(),
        vec!["broken".to_string(), "never-started".to_string()]
    );
    let healthy_after = ctx.store.get_by_id(&healthy.id).await.unwrap();
    assert_eq!(healthy_after.file_path.as_deref(), Some(healthy_path.as_path()));
}

/// A failure in one sweep is repairable by the next.
#[tokio::test]
async fn test_failed_item_recovers_on_next_sweep() {
    let source = Arc::new(MockMediaSource::new().with_media("abc", 1_000_000));
    source.inject_error("abc", "simulated outage");

    let pending = LibraryItemBuilder::new("abc").build();
    let ctx = TestContext::seeded(
        Arc::clone(&source) as Arc<dyn MediaSource>,
        std::slice::from_ref(&pending),
    )
    .await;

    let summary = ctx.reconciler.run().await.unwrap().unwrap();
    assert_eq!((summary.completed, summary.failed, summary.total), (0, 1, 1));
    let item = ctx
        .store
        .find_by_media_id(&MediaId::from("abc"))
        .await
        .unwrap();
    assert_eq!(item.download_status, DownloadStatus::Failed);

    // Outage clears; the next sweep classifies `failed` as repairable
    source.clear_error("abc");
    let summary = ctx.reconciler.run().await.unwrap().unwrap();
    assert_eq!((summary.completed, summary.failed, summary.total), (1, 0, 1));
    let item = ctx
        .store
        .find_by_media_id(&MediaId::from("abc"))
        .await
        .unwrap();
    assert_eq!(item.download_status, DownloadStatus::Completed);
    assert_eq!(item.file_size_bytes, Some(1_000_000));
}
