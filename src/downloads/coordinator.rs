use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::MediaId;
use crate::source::{DownloadOutcome, SourceError};

/// Settlement of a download operation, shared verbatim with every joined
/// caller.
pub type DownloadResult = Result<DownloadOutcome, SourceError>;

type SharedFlight = Shared<BoxFuture<'static, DownloadResult>>;

const DEFAULT_RETENTION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Downloading,
    Completed,
    Failed,
}

/// Diagnostic snapshot of a download, in flight or recently settled.
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub media_id: MediaId,
    pub phase: DownloadPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

enum FlightSlot {
    InFlight {
        epoch: u64,
        record: DownloadRecord,
        shared: SharedFlight,
    },
    Settled {
        epoch: u64,
        record: DownloadRecord,
    },
}

#[derive(Default)]
struct FlightTable {
    slots: HashMap<MediaId, FlightSlot>,
    next_epoch: u64,
}

/// Guarantees at most one outstanding download operation per media id.
///
/// Every download-initiating call site goes through [`start_download`].
/// A caller arriving while an operation for the same id is in flight
/// joins it: the underlying operation runs exactly once and all callers
/// observe the identical settlement.
///
/// Terminal outcomes are retained for a short diagnostic window and then
/// discarded; the in-flight marker itself is always cleared on
/// settlement so a later call may retry.
///
/// [`start_download`]: DownloadCoordinator::start_download
#[derive(Clone)]
pub struct DownloadCoordinator {
    flights: Arc<Mutex<FlightTable>>,
    retention: Duration,
}

impl Default for DownloadCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadCoordinator {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Retention window for terminal state snapshots, tunable for tests.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            flights: Arc::new(Mutex::new(FlightTable::default())),
            retention,
        }
    }

    /// Start (or join) the download for `media_id`.
    ///
    /// The flight is registered before this returns, so `is_downloading`
    /// cannot race to "not downloading" for an unsettled operation. The
    /// operation is spawned onto the runtime and runs to settlement even
    /// if the returned future is dropped.
    ///
    /// A normal download failure is not a coordinator error: the
    /// operation's outcome is passed through unchanged to every caller.
    pub fn start_download<F>(
        &self,
        media_id: &MediaId,
        operation: F,
    ) -> impl Future<Output = DownloadResult> + Send + 'static
    where
        F: Future<Output = DownloadResult> + Send + 'static,
    {
        let mut flights = self.flights.lock().expect("flight table lock poisoned");

        if let Some(FlightSlot::InFlight { shared, .. }) = flights.slots.get(media_id) {
            debug!("Joining in-flight download for {}", media_id);
            return shared.clone();
        }

        let epoch = flights.next_epoch;
        flights.next_epoch += 1;

        let started_at = Utc::now();
        let record = DownloadRecord {
            media_id: media_id.clone(),
            phase: DownloadPhase::Downloading,
            started_at,
            finished_at: None,
            error: None,
        };

        let (settled_tx, settled_rx) = tokio::sync::oneshot::channel();
        let table = Arc::clone(&self.flights);
        let id = media_id.clone();
        let retention = self.retention;

        // The operation runs regardless of whether any caller keeps
        // awaiting; settlement is recorded at true settle time.
        tokio::spawn(async move {
            let result = operation.await;
            let finished_at = Utc::now();

            let terminal = DownloadRecord {
                media_id: id.clone(),
                phase: match &result {
                    Ok(_) => DownloadPhase::Completed,
                    Err(_) => DownloadPhase::Failed,
                },
                started_at,
                finished_at: Some(finished_at),
                error: result.as_ref().err().map(|e| e.to_string()),
            };

            {
                let mut flights = table.lock().expect("flight table lock poisoned");
                // Only settle our own flight; a cancel followed by a
                // retry may have installed a newer one.
                let still_ours = matches!(
                    flights.slots.get(&id),
                    Some(FlightSlot::InFlight { epoch: current, .. }) if *current == epoch
                );
                if still_ours {
                    flights
                        .slots
                        .insert(id.clone(), FlightSlot::Settled { epoch, record: terminal });
                } else {
                    debug!("Download for {} settled after cancellation", id);
                }
            }

            // Purge the terminal snapshot after the diagnostic window
            let purge_table = Arc::clone(&table);
            let purge_id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(retention).await;
                let mut flights = purge_table.lock().expect("flight table lock poisoned");
                let expired = matches!(
                    flights.slots.get(&purge_id),
                    Some(FlightSlot::Settled { epoch: current, .. }) if *current == epoch
                );
                if expired {
                    flights.slots.remove(&purge_id);
                }
            });

            if settled_tx.send(result).is_err() {
                debug!("No caller left awaiting download for {}", id);
            }
        });

        let shared: SharedFlight = {
            let id = media_id.clone();
            async move {
                match settled_rx.await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Download task for {} vanished before settling", id);
                        Err(SourceError::Io("download task aborted".to_string()))
                    }
                }
            }
            .boxed()
            .shared()
        };

        flights.slots.insert(
            media_id.clone(),
            FlightSlot::InFlight {
                epoch,
                record,
                shared: shared.clone(),
            },
        );

        shared
    }

    /// Whether an operation for `media_id` is currently in flight.
    pub fn is_downloading(&self, media_id: &MediaId) -> bool {
        let flights = self.flights.lock().expect("flight table lock poisoned");
        matches!(flights.slots.get(media_id), Some(FlightSlot::InFlight { .. }))
    }

    /// Current snapshot for `media_id`: in-flight, or terminal while the
    /// retention window lasts.
    pub fn get_state(&self, media_id: &MediaId) -> Option<DownloadRecord> {
        let flights = self.flights.lock().expect("flight table lock poisoned");
        flights.slots.get(media_id).map(|slot| match slot {
            FlightSlot::InFlight { record, .. } => record.clone(),
            FlightSlot::Settled { record, .. } => record.clone(),
        })
    }

    /// Best-effort cancellation: drops the in-flight marker so new
    /// callers no longer join and a retry may start. Does not interrupt
    /// the underlying transfer.
    pub fn cancel_download(&self, media_id: &MediaId) -> bool {
        let mut flights = self.flights.lock().expect("flight table lock poisoned");
        if matches!(flights.slots.get(media_id), Some(FlightSlot::InFlight { .. })) {
            flights.slots.remove(media_id);
            debug!("Cancelled download marker for {}", media_id);
            true
        } else {
            false
        }
    }
}
