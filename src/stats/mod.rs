//! Statistics rollups
//!
//! Daily and weekly derived projections over the raw call data, plus the
//! updater that runs them in order for each analyzed call.

pub mod aggregate;
pub mod daily;
pub mod weekly;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

use crate::ai::SummaryGenerator;
use crate::db::{Database, DbError};
use crate::models::CallRecord;

pub use aggregate::{aggregate_week, WeeklyStatsAggregate};
pub use daily::{completed_dose_slots, medication_breakdown, DailyStatisticsService};
pub use weekly::{week_start_of, WeeklyStatisticsService};

/// Statistics error types
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("call record not found: {0}")]
    RecordNotFound(i64),

    #[error("no completed call for elder {elder_id} in week starting {start_date}")]
    NoDataForWeek {
        elder_id: i64,
        start_date: NaiveDate,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Per-elder lock map serializing rollup recomputes.
///
/// Two calls finishing for the same elder must not race the
/// read-recompute-write cycle on the same daily or weekly row; one lock
/// per elder covers both keys.
#[derive(Default)]
struct ElderLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ElderLocks {
    fn for_elder(&self, elder_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("elder lock map poisoned");
        map.entry(elder_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Runs the daily and weekly upserts for one analyzed call
pub struct StatisticsUpdater {
    db: Database,
    daily: DailyStatisticsService,
    weekly: WeeklyStatisticsService,
    locks: ElderLocks,
}

impl StatisticsUpdater {
    pub fn new(db: Database, summaries: Arc<dyn SummaryGenerator>) -> Self {
        Self {
            daily: DailyStatisticsService::new(db.clone(), summaries.clone()),
            weekly: WeeklyStatisticsService::new(db.clone(), summaries),
            db,
            locks: ElderLocks::default(),
        }
    }

    /// Upsert the daily rollup, then the weekly rollup, for the call's
    /// elder. Serialized per elder; a week without a completed call skips
    /// the weekly upsert without failing.
    pub async fn update_statistics(&self, record_id: i64) -> Result<(), StatsError> {
        let record = self
            .db
            .with_conn(|conn| CallRecord::get_by_id(conn, record_id))?
            .ok_or(StatsError::RecordNotFound(record_id))?;

        let lock = self.locks.for_elder(record.elder_id);
        let _guard = lock.lock().await;

        info!(record_id, elder_id = record.elder_id, "statistics update started");

        self.daily.upsert_daily_statistics(&record).await?;

        match self.weekly.upsert_weekly_statistics(&record).await {
            Ok(_) => {}
            Err(StatsError::NoDataForWeek {
                elder_id,
                start_date,
            }) => {
                info!(
                    elder_id,
                    %start_date,
                    "weekly rollup skipped, no completed call in the window yet"
                );
            }
            Err(e) => return Err(e),
        }

        info!(record_id, "statistics update finished");
        Ok(())
    }
}
