use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{LibraryItemId, MediaId};

/// Main event type carried on the notification bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEvent {
    pub id: String,
    pub event_type: EventType,
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub priority: EventPriority,
}

impl LibraryEvent {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            payload,
            timestamp: chrono::Utc::now(),
            priority: EventPriority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EventType {
    // Library events — observers should re-read the store
    LibraryChanged,
    ItemAdded,
    ItemUpdated,
    ItemRemoved,

    // Per-item download events
    DownloadStarted,
    DownloadSettled,

    // Background sweep events
    SweepStarted,
    SweepProgress,
    SweepCompleted,
}

impl EventType {
    /// String form used for filtering/routing and stats keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LibraryChanged => "library.changed",
            EventType::ItemAdded => "item.added",
            EventType::ItemUpdated => "item.updated",
            EventType::ItemRemoved => "item.removed",
            EventType::DownloadStarted => "download.started",
            EventType::DownloadSettled => "download.settled",
            EventType::SweepStarted => "sweep.started",
            EventType::SweepProgress => "sweep.progress",
            EventType::SweepCompleted => "sweep.completed",
        }
    }
}

/// Event payload containing specific data for each event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Library,
    Item {
        item_id: LibraryItemId,
        media_id: MediaId,
    },
    Download {
        item_id: LibraryItemId,
        media_id: MediaId,
        outcome: DownloadEventOutcome,
    },
    Sweep(SweepProgress),
    SweepSummary(SweepSummary),
}

/// Terminal outcome attached to a download-settled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DownloadEventOutcome {
    Completed {
        file_path: PathBuf,
        file_size_bytes: u64,
    },
    Failed {
        error: String,
    },
}

impl DownloadEventOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadEventOutcome::Completed { .. })
    }
}

/// Progress snapshot emitted after every drained item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepProgress {
    pub current_item: LibraryItemId,
    pub current_title: String,
    pub completed: usize,
    pub failed: usize,
    pub remaining: usize,
    pub total: usize,
}

/// Aggregate counts emitted when a sweep finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Event priority for subscriber-side filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum EventPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}
