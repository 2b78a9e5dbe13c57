//! Weekly statistics service
//!
//! Upserts the (elder, week-start) rollup and exposes the narrow
//! missed-call fast path. Weeks anchor on Monday.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use tracing::info;

use crate::ai::SummaryGenerator;
use crate::db::Database;
use crate::models::{
    BloodSugarRecord, CallRecord, DailyStatistics, WeeklyStatistics, WeeklyStatisticsUpsert,
};
use super::aggregate::aggregate_week;
use super::StatsError;

/// Monday of the week containing the given date
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Weekly rollup service
#[derive(Clone)]
pub struct WeeklyStatisticsService {
    db: Database,
    summaries: Arc<dyn SummaryGenerator>,
}

impl WeeklyStatisticsService {
    pub fn new(db: Database, summaries: Arc<dyn SummaryGenerator>) -> Self {
        Self { db, summaries }
    }

    /// Recompute and upsert the weekly rollup for the week of this call.
    ///
    /// Requires at least one completed call in the window; a week of
    /// nothing but missed calls has no data to roll up yet.
    pub async fn upsert_weekly_statistics(
        &self,
        record: &CallRecord,
    ) -> Result<WeeklyStatistics, StatsError> {
        let elder_id = record.elder_id;
        let start_date = week_start_of(record.called_at.date());
        let end_date = start_date + Days::new(6);

        let (daily_rows, blood_sugar, calls) = self.db.with_conn(|conn| {
            Ok((
                DailyStatistics::list_for_elder_between(conn, elder_id, start_date, end_date)?,
                BloodSugarRecord::list_for_elder_between(conn, elder_id, start_date, end_date)?,
                CallRecord::list_for_elder_between(conn, elder_id, start_date, end_date)?,
            ))
        })?;

        if !calls.iter().any(|c| c.call_status.is_completed()) {
            return Err(StatsError::NoDataForWeek {
                elder_id,
                start_date,
            });
        }

        let aggregate = aggregate_week(start_date, end_date, &daily_rows, &blood_sugar, &calls);
        let ai_summary = self.summaries.weekly_summary(&aggregate).await;

        let upsert = WeeklyStatisticsUpsert {
            elder_id,
            start_date,
            end_date,
            breakfast_count: aggregate.breakfast_count,
            lunch_count: aggregate.lunch_count,
            dinner_count: aggregate.dinner_count,
            meal_goal_count: aggregate.meal_goal_count,
            meal_rate: aggregate.meal_rate,
            medication_taken_count: aggregate.medication_taken_count,
            medication_goal_count: aggregate.medication_goal_count,
            medication_scheduled_count: aggregate.medication_scheduled_count,
            medication_rate: aggregate.medication_rate,
            medication_stats: aggregate.medication_by_name,
            avg_sleep_hours: aggregate.avg_sleep_minutes.map(|m| m / 60),
            avg_sleep_minutes: aggregate.avg_sleep_minutes.map(|m| m % 60),
            psych_good_count: aggregate.psych_good_count,
            psych_normal_count: aggregate.psych_normal_count,
            psych_bad_count: aggregate.psych_bad_count,
            health_signals: aggregate.health_signals,
            missed_calls: aggregate.missed_calls,
            blood_sugar_stats: aggregate.blood_sugar,
            ai_summary: Some(ai_summary),
        };

        Ok(self
            .db
            .with_conn(|conn| WeeklyStatistics::upsert(conn, &upsert))?)
    }

    /// Missed-call fast path. Bumps the counter on an existing weekly row
    /// so the caregiver view reflects the miss immediately; when no row
    /// exists yet this is a no-op, since the next full upsert recomputes
    /// the count from raw records anyway.
    pub fn increment_missed_calls(&self, record: &CallRecord) -> Result<bool, StatsError> {
        let start_date = week_start_of(record.called_at.date());

        let updated = self.db.with_conn(|conn| {
            WeeklyStatistics::increment_missed_calls(conn, record.elder_id, start_date)
        })?;

        if updated {
            info!(elder_id = record.elder_id, %start_date, "missed-call counter bumped");
        } else {
            info!(
                elder_id = record.elder_id,
                %start_date,
                "no weekly row yet, missed call will surface on the next full rollup"
            );
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_start_is_monday() {
        let monday: NaiveDate = "2025-03-03".parse().expect("date");
        let wednesday: NaiveDate = "2025-03-05".parse().expect("date");
        let sunday: NaiveDate = "2025-03-09".parse().expect("date");

        assert_eq!(week_start_of(monday), monday);
        assert_eq!(week_start_of(wednesday), monday);
        assert_eq!(week_start_of(sunday), monday);
        assert_eq!(week_start_of("2025-03-10".parse().expect("date")), "2025-03-10".parse::<NaiveDate>().expect("date"));
    }
}
