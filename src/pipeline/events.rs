//! In-process event bus
//!
//! Typed events over a tokio channel. The sending half is injected into
//! whatever needs to announce; the dispatcher owns the receiving half and
//! the registered handlers. No global mutable state.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::stats::StatisticsUpdater;
use super::coordinator::CallCompletionCoordinator;

/// Pipeline events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    /// A call reached a terminal status and its record was persisted
    CallFinished { record_id: i64 },
    /// The call's analysis step finished; rollups may now run
    AnalysisCompleted { record_id: i64 },
}

/// Sending half of the event bus
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<HealthEvent>,
}

impl EventBus {
    /// Create a bus and the receiver the dispatcher will drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HealthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. Only fails when the dispatcher is gone, in which
    /// case the event is logged and dropped.
    pub fn publish(&self, event: HealthEvent) {
        if self.tx.send(event).is_err() {
            warn!(?event, "event bus has no dispatcher, dropping event");
        }
    }
}

/// Drains the bus and routes each event to its handler.
///
/// Handler errors are logged and never stop the loop; an analysis failure
/// simply leaves that call's statistics absent until a later call's signal
/// recomputes them.
pub struct Dispatcher {
    coordinator: CallCompletionCoordinator,
    statistics: StatisticsUpdater,
}

impl Dispatcher {
    pub fn new(coordinator: CallCompletionCoordinator, statistics: StatisticsUpdater) -> Self {
        Self {
            coordinator,
            statistics,
        }
    }

    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<HealthEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                HealthEvent::CallFinished { record_id } => {
                    if let Err(e) = self.coordinator.handle_call_finished(record_id).await {
                        error!(record_id, "call-finished handling failed: {e}");
                    }
                }
                HealthEvent::AnalysisCompleted { record_id } => {
                    if let Err(e) = self.statistics.update_statistics(record_id).await {
                        error!(record_id, "statistics update failed: {e}");
                    }
                }
            }
        }

        info!("event bus closed, dispatcher stopping");
    }
}
