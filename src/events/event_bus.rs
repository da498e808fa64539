use super::types::{
    DownloadEventOutcome, EventPayload, EventPriority, EventType, LibraryEvent, SweepProgress,
    SweepSummary,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::trace;

use crate::models::{LibraryItemId, MediaId};

/// Event subscriber handle. Dropping the handle unsubscribes.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<LibraryEvent>,
    filter: Option<EventFilter>,
}

impl EventSubscriber {
    /// Create a new subscriber with an optional filter
    pub fn new(receiver: broadcast::Receiver<LibraryEvent>, filter: Option<EventFilter>) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next event matching the filter
    pub async fn recv(&mut self) -> Result<LibraryEvent> {
        loop {
            let event = self.receiver.recv().await?;

            if let Some(ref filter) = self.filter {
                if filter.matches(&event) {
                    return Ok(event);
                }
            } else {
                return Ok(event);
            }
        }
    }

    /// Try to receive without blocking
    pub fn try_recv(&mut self) -> Result<Option<LibraryEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(ref filter) = self.filter {
                        if filter.matches(&event) {
                            return Ok(Some(event));
                        }
                        // Continue to next event
                    } else {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    event_types: Option<Vec<EventType>>,
    min_priority: Option<EventPriority>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            event_types: None,
            min_priority: None,
        }
    }

    pub fn with_types(mut self, types: Vec<EventType>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn with_min_priority(mut self, priority: EventPriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn matches(&self, event: &LibraryEvent) -> bool {
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }

        if let Some(min_priority) = self.min_priority
            && event.priority < min_priority
        {
            return false;
        }

        true
    }
}

/// Process-local notification bus decoupling state-change producers
/// (coordinator, reconciler, user actions) from observers.
///
/// Delivery is best-effort in-process: events are not persisted and not
/// replayed to late subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<LibraryEvent>,
    stats: Arc<RwLock<EventBusStats>>,
    event_history: Arc<RwLock<Vec<LibraryEvent>>>,
    max_history_size: usize,
}

#[derive(Debug, Default)]
pub struct EventBusStats {
    pub total_events: u64,
    pub events_by_type: HashMap<String, u64>,
    pub subscriber_count: usize,
    pub dropped_events: u64,
}

impl EventBus {
    /// Create a new event bus with specified buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            stats: Arc::new(RwLock::new(EventBusStats::default())),
            event_history: Arc::new(RwLock::new(Vec::new())),
            max_history_size: 100, // Keep last 100 events for debugging
        }
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: LibraryEvent) -> Result<()> {
        trace!(
            "Publishing event: {:?} with priority {:?}",
            event.event_type, event.priority
        );

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            let event_type_str = event.event_type.as_str().to_string();
            *stats.events_by_type.entry(event_type_str).or_insert(0) += 1;
        }

        {
            let mut history = self.event_history.write().await;
            history.push(event.clone());

            if history.len() > self.max_history_size {
                let excess = history.len() - self.max_history_size;
                history.drain(0..excess);
            }
        }

        match self.sender.send(event) {
            Ok(_count) => Ok(()),
            Err(_) => {
                // No subscribers is normal, don't log
                let mut stats = self.stats.write().await;
                stats.dropped_events += 1;
                Ok(())
            }
        }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber::new(self.sender.subscribe(), None)
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter) -> EventSubscriber {
        EventSubscriber::new(self.sender.subscribe(), Some(filter))
    }

    /// Subscribe to specific event types
    pub fn subscribe_to_types(&self, types: Vec<EventType>) -> EventSubscriber {
        let filter = EventFilter::new().with_types(types);
        self.subscribe_filtered(filter)
    }

    /// Get current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get event bus statistics
    pub async fn get_stats(&self) -> EventBusStats {
        let stats = self.stats.read().await;
        EventBusStats {
            total_events: stats.total_events,
            events_by_type: stats.events_by_type.clone(),
            subscriber_count: self.subscriber_count(),
            dropped_events: stats.dropped_events,
        }
    }

    /// Get event history for debugging
    pub async fn get_history(&self) -> Vec<LibraryEvent> {
        self.event_history.read().await.clone()
    }

    /// Clear event history
    pub async fn clear_history(&self) {
        self.event_history.write().await.clear();
    }

    /// Emit a library-changed event; observers should re-read the store.
    pub async fn emit_library_changed(&self) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::LibraryChanged,
            EventPayload::Library,
        ))
        .await
    }

    pub async fn emit_item_added(&self, item_id: LibraryItemId, media_id: MediaId) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::ItemAdded,
            EventPayload::Item { item_id, media_id },
        ))
        .await
    }

    pub async fn emit_item_updated(&self, item_id: LibraryItemId, media_id: MediaId) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::ItemUpdated,
            EventPayload::Item { item_id, media_id },
        ))
        .await
    }

    pub async fn emit_item_removed(&self, item_id: LibraryItemId, media_id: MediaId) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::ItemRemoved,
            EventPayload::Item { item_id, media_id },
        ))
        .await
    }

    pub async fn emit_download_started(
        &self,
        item_id: LibraryItemId,
        media_id: MediaId,
    ) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::DownloadStarted,
            EventPayload::Item { item_id, media_id },
        ))
        .await
    }

    /// Emit a download-settled event carrying the terminal outcome.
    pub async fn emit_download_settled(
        &self,
        item_id: LibraryItemId,
        media_id: MediaId,
        outcome: DownloadEventOutcome,
    ) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::DownloadSettled,
            EventPayload::Download {
                item_id,
                media_id,
                outcome,
            },
        ))
        .await
    }

    pub async fn emit_sweep_started(&self, total: usize) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::SweepStarted,
            EventPayload::SweepSummary(SweepSummary {
                completed: 0,
                failed: 0,
                total,
            }),
        ))
        .await
    }

    pub async fn emit_sweep_progress(&self, progress: SweepProgress) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::SweepProgress,
            EventPayload::Sweep(progress),
        ))
        .await
    }

    pub async fn emit_sweep_completed(&self, summary: SweepSummary) -> Result<()> {
        self.publish(LibraryEvent::new(
            EventType::SweepCompleted,
            EventPayload::SweepSummary(summary),
        ))
        .await
    }
}
