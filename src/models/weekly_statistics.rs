//! Weekly statistics model
//!
//! Derived rollup, one row per (elder, week-start Monday). Recomputed in
//! full by the weekly upsert; the missed-call counter is additionally
//! bumped by a fast path between recomputes and overwritten by the next
//! full recompute.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// Weekly adherence sums for one medication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationWeeklyStats {
    pub taken: i64,
    pub goal: i64,
    pub scheduled: i64,
}

/// Bucket counts for one measurement relation (before or after meal)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodSugarTypeStats {
    pub normal: i64,
    pub high: i64,
    pub low: i64,
}

/// Blood-sugar bucket counts for the week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodSugarWeeklyStats {
    pub before_meal: BloodSugarTypeStats,
    pub after_meal: BloodSugarTypeStats,
}

/// Weekly rollup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyStatistics {
    pub id: i64,
    pub elder_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub breakfast_count: i64,
    pub lunch_count: i64,
    pub dinner_count: i64,
    pub meal_goal_count: i64,
    pub meal_rate: i64,
    pub medication_taken_count: i64,
    pub medication_goal_count: i64,
    pub medication_scheduled_count: i64,
    pub medication_rate: i64,
    pub medication_stats: BTreeMap<String, MedicationWeeklyStats>,
    pub avg_sleep_hours: Option<i64>,
    pub avg_sleep_minutes: Option<i64>,
    pub psych_good_count: i64,
    pub psych_normal_count: i64,
    pub psych_bad_count: i64,
    pub health_signals: i64,
    pub missed_calls: i64,
    pub blood_sugar_stats: BloodSugarWeeklyStats,
    pub ai_summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Full recomputed field set for an upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyStatisticsUpsert {
    pub elder_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub breakfast_count: i64,
    pub lunch_count: i64,
    pub dinner_count: i64,
    pub meal_goal_count: i64,
    pub meal_rate: i64,
    pub medication_taken_count: i64,
    pub medication_goal_count: i64,
    pub medication_scheduled_count: i64,
    pub medication_rate: i64,
    pub medication_stats: BTreeMap<String, MedicationWeeklyStats>,
    pub avg_sleep_hours: Option<i64>,
    pub avg_sleep_minutes: Option<i64>,
    pub psych_good_count: i64,
    pub psych_normal_count: i64,
    pub psych_bad_count: i64,
    pub health_signals: i64,
    pub missed_calls: i64,
    pub blood_sugar_stats: BloodSugarWeeklyStats,
    pub ai_summary: Option<String>,
}

impl WeeklyStatistics {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let medication_stats: String = row.get("medication_stats")?;
        let medication_stats: BTreeMap<String, MedicationWeeklyStats> =
            serde_json::from_str(&medication_stats).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        let blood_sugar_stats: String = row.get("blood_sugar_stats")?;
        let blood_sugar_stats: BloodSugarWeeklyStats = serde_json::from_str(&blood_sugar_stats)
            .unwrap_or_default();

        Ok(Self {
            id: row.get("id")?,
            elder_id: row.get("elder_id")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            breakfast_count: row.get("breakfast_count")?,
            lunch_count: row.get("lunch_count")?,
            dinner_count: row.get("dinner_count")?,
            meal_goal_count: row.get("meal_goal_count")?,
            meal_rate: row.get("meal_rate")?,
            medication_taken_count: row.get("medication_taken_count")?,
            medication_goal_count: row.get("medication_goal_count")?,
            medication_scheduled_count: row.get("medication_scheduled_count")?,
            medication_rate: row.get("medication_rate")?,
            medication_stats,
            avg_sleep_hours: row.get("avg_sleep_hours")?,
            avg_sleep_minutes: row.get("avg_sleep_minutes")?,
            psych_good_count: row.get("psych_good_count")?,
            psych_normal_count: row.get("psych_normal_count")?,
            psych_bad_count: row.get("psych_bad_count")?,
            health_signals: row.get("health_signals")?,
            missed_calls: row.get("missed_calls")?,
            blood_sugar_stats,
            ai_summary: row.get("ai_summary")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Get the row for an (elder, week-start) key
    pub fn get_by_elder_and_start(
        conn: &Connection,
        elder_id: i64,
        start_date: NaiveDate,
    ) -> DbResult<Option<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM weekly_statistics WHERE elder_id = ?1 AND start_date = ?2")?;

        let result = stmt.query_row(params![elder_id, start_date], Self::from_row);
        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert-or-update by (elder, week-start). An existing row is mutated
    /// in place; every field is overwritten with the recomputed values,
    /// including the missed-call counter.
    pub fn upsert(conn: &Connection, data: &WeeklyStatisticsUpsert) -> DbResult<Self> {
        let medication_stats =
            serde_json::to_string(&data.medication_stats).unwrap_or_else(|_| "{}".to_string());
        let blood_sugar_stats =
            serde_json::to_string(&data.blood_sugar_stats).unwrap_or_else(|_| "{}".to_string());

        let existing = Self::get_by_elder_and_start(conn, data.elder_id, data.start_date)?;

        if let Some(existing) = existing {
            conn.execute(
                r#"
                UPDATE weekly_statistics SET
                    end_date = ?1,
                    breakfast_count = ?2,
                    lunch_count = ?3,
                    dinner_count = ?4,
                    meal_goal_count = ?5,
                    meal_rate = ?6,
                    medication_taken_count = ?7,
                    medication_goal_count = ?8,
                    medication_scheduled_count = ?9,
                    medication_rate = ?10,
                    medication_stats = ?11,
                    avg_sleep_hours = ?12,
                    avg_sleep_minutes = ?13,
                    psych_good_count = ?14,
                    psych_normal_count = ?15,
                    psych_bad_count = ?16,
                    health_signals = ?17,
                    missed_calls = ?18,
                    blood_sugar_stats = ?19,
                    ai_summary = ?20,
                    updated_at = datetime('now')
                WHERE id = ?21
                "#,
                params![
                    data.end_date,
                    data.breakfast_count,
                    data.lunch_count,
                    data.dinner_count,
                    data.meal_goal_count,
                    data.meal_rate,
                    data.medication_taken_count,
                    data.medication_goal_count,
                    data.medication_scheduled_count,
                    data.medication_rate,
                    medication_stats,
                    data.avg_sleep_hours,
                    data.avg_sleep_minutes,
                    data.psych_good_count,
                    data.psych_normal_count,
                    data.psych_bad_count,
                    data.health_signals,
                    data.missed_calls,
                    blood_sugar_stats,
                    data.ai_summary,
                    existing.id,
                ],
            )?;

            return Self::get_by_elder_and_start(conn, data.elder_id, data.start_date)?
                .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }

        conn.execute(
            r#"
            INSERT INTO weekly_statistics (
                elder_id, start_date, end_date,
                breakfast_count, lunch_count, dinner_count, meal_goal_count, meal_rate,
                medication_taken_count, medication_goal_count, medication_scheduled_count,
                medication_rate, medication_stats,
                avg_sleep_hours, avg_sleep_minutes,
                psych_good_count, psych_normal_count, psych_bad_count,
                health_signals, missed_calls, blood_sugar_stats, ai_summary
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            params![
                data.elder_id,
                data.start_date,
                data.end_date,
                data.breakfast_count,
                data.lunch_count,
                data.dinner_count,
                data.meal_goal_count,
                data.meal_rate,
                data.medication_taken_count,
                data.medication_goal_count,
                data.medication_scheduled_count,
                data.medication_rate,
                medication_stats,
                data.avg_sleep_hours,
                data.avg_sleep_minutes,
                data.psych_good_count,
                data.psych_normal_count,
                data.psych_bad_count,
                data.health_signals,
                data.missed_calls,
                blood_sugar_stats,
                data.ai_summary,
            ],
        )?;

        Self::get_by_elder_and_start(conn, data.elder_id, data.start_date)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Fast-path missed-call bump. Touches nothing but the counter and
    /// never creates a row; returns whether a row was updated.
    pub fn increment_missed_calls(
        conn: &Connection,
        elder_id: i64,
        start_date: NaiveDate,
    ) -> DbResult<bool> {
        let rows = conn.execute(
            "UPDATE weekly_statistics
             SET missed_calls = missed_calls + 1, updated_at = datetime('now')
             WHERE elder_id = ?1 AND start_date = ?2",
            params![elder_id, start_date],
        )?;
        Ok(rows > 0)
    }
}
