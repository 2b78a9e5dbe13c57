//! Call completion coordinator
//!
//! Handles each call-finished event: completed calls go through
//! extraction and persistence, missed calls take the immediate
//! weekly-counter side path, and every successfully analyzed call is
//! announced so the rollups can run. A failed analysis is not announced;
//! that call's statistics stay absent until a later call's signal
//! recomputes the same keys.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::ai::{ExtractionRequest, HealthDataExtractor, SummaryGenerator};
use crate::db::{Database, DbError};
use crate::models::{CallRecord, MedicationSchedule};
use crate::stats::WeeklyStatisticsService;
use super::events::{EventBus, HealthEvent};
use super::persister::{AnalysisResultPersister, ProcessingError};

/// Pipeline error types
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("call record not found: {0}")]
    RecordNotFound(i64),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Entry point for call-finished events
pub struct CallCompletionCoordinator {
    db: Database,
    extractor: Arc<dyn HealthDataExtractor>,
    persister: AnalysisResultPersister,
    weekly: WeeklyStatisticsService,
    bus: EventBus,
}

impl CallCompletionCoordinator {
    pub fn new(
        db: Database,
        extractor: Arc<dyn HealthDataExtractor>,
        summaries: Arc<dyn SummaryGenerator>,
        bus: EventBus,
    ) -> Self {
        Self {
            persister: AnalysisResultPersister::new(db.clone(), summaries.clone()),
            weekly: WeeklyStatisticsService::new(db.clone(), summaries),
            db,
            extractor,
            bus,
        }
    }

    /// Process one finished call.
    ///
    /// The missed-call side path runs first so the caregiver view
    /// reflects the miss immediately; it may race the full weekly upsert,
    /// which is fine because the upsert recomputes the counter from raw
    /// records and overwrites it with the true value.
    pub async fn handle_call_finished(&self, record_id: i64) -> Result<(), PipelineError> {
        let record = self
            .db
            .with_conn(|conn| CallRecord::get_by_id(conn, record_id))?
            .ok_or(PipelineError::RecordNotFound(record_id))?;

        info!(
            record_id,
            elder_id = record.elder_id,
            status = record.call_status.as_str(),
            "call finished"
        );

        if record.call_status.is_missed() {
            if let Err(e) = self.weekly.increment_missed_calls(&record) {
                error!(record_id, "missed-call fast path failed: {e}");
            }
        }

        match self.analyze(&record).await {
            Ok(()) => {
                self.bus.publish(HealthEvent::AnalysisCompleted { record_id });
                Ok(())
            }
            Err(e) => {
                error!(
                    record_id,
                    "call analysis failed, skipping completion announcement: {e}"
                );
                Err(e.into())
            }
        }
    }

    /// Run extraction and persistence. No-ops for calls without a
    /// transcript (unanswered calls and completed calls with no text).
    async fn analyze(&self, record: &CallRecord) -> Result<(), ProcessingError> {
        let Some(transcript) = record
            .transcript
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Ok(());
        };

        let medication_names = self
            .db
            .with_conn(|conn| MedicationSchedule::medication_names(conn, record.elder_id))?;

        let request = ExtractionRequest {
            transcript: transcript.to_string(),
            call_date: record.called_at.date(),
            medication_names,
        };

        let extraction = self.extractor.extract(&request).await;
        self.persister.persist(record, &extraction).await
    }
}
