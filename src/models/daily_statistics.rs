//! Daily statistics model
//!
//! Derived rollup, one row per (elder, calendar date). Every upsert
//! recomputes the full field set from raw records; the row is mutated in
//! place once it exists.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::{ConditionStatus, DoseTime};

/// Taken flag for one planned dose slot; None when the day produced no
/// usable answer for that slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseStatus {
    pub time: DoseTime,
    pub taken: Option<bool>,
}

/// Per-medication adherence breakdown for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationInfo {
    pub name: String,
    /// Planned doses for the day, regardless of call outcomes
    pub scheduled: i64,
    /// Planned doses whose call slot was actually attempted
    pub goal: i64,
    /// Doses reported taken
    pub taken: i64,
    pub doses: Vec<DoseStatus>,
}

/// Daily rollup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStatistics {
    pub id: i64,
    pub elder_id: i64,
    pub date: NaiveDate,
    pub breakfast_eaten: Option<bool>,
    pub lunch_eaten: Option<bool>,
    pub dinner_eaten: Option<bool>,
    pub medication_total_goal: i64,
    pub medication_total_taken: i64,
    pub medication_list: Vec<MedicationInfo>,
    pub avg_sleep_minutes: Option<i64>,
    pub health_status: Option<ConditionStatus>,
    pub psych_status: Option<ConditionStatus>,
    pub avg_blood_sugar: Option<i64>,
    pub ai_summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Full recomputed field set for an upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStatisticsUpsert {
    pub elder_id: i64,
    pub date: NaiveDate,
    pub breakfast_eaten: Option<bool>,
    pub lunch_eaten: Option<bool>,
    pub dinner_eaten: Option<bool>,
    pub medication_total_goal: i64,
    pub medication_total_taken: i64,
    pub medication_list: Vec<MedicationInfo>,
    pub avg_sleep_minutes: Option<i64>,
    pub health_status: Option<ConditionStatus>,
    pub psych_status: Option<ConditionStatus>,
    pub avg_blood_sugar: Option<i64>,
    pub ai_summary: Option<String>,
}

impl DailyStatistics {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let medication_list: String = row.get("medication_list")?;
        let medication_list: Vec<MedicationInfo> = serde_json::from_str(&medication_list)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        let health_status: Option<String> = row.get("health_status")?;
        let psych_status: Option<String> = row.get("psych_status")?;

        Ok(Self {
            id: row.get("id")?,
            elder_id: row.get("elder_id")?,
            date: row.get("date")?,
            breakfast_eaten: row.get::<_, Option<i64>>("breakfast_eaten")?.map(|v| v != 0),
            lunch_eaten: row.get::<_, Option<i64>>("lunch_eaten")?.map(|v| v != 0),
            dinner_eaten: row.get::<_, Option<i64>>("dinner_eaten")?.map(|v| v != 0),
            medication_total_goal: row.get("medication_total_goal")?,
            medication_total_taken: row.get("medication_total_taken")?,
            medication_list,
            avg_sleep_minutes: row.get("avg_sleep_minutes")?,
            health_status: health_status.as_deref().and_then(ConditionStatus::from_str),
            psych_status: psych_status.as_deref().and_then(ConditionStatus::from_str),
            avg_blood_sugar: row.get("avg_blood_sugar")?,
            ai_summary: row.get("ai_summary")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Get the row for an (elder, date) key
    pub fn get_by_elder_and_date(
        conn: &Connection,
        elder_id: i64,
        date: NaiveDate,
    ) -> DbResult<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM daily_statistics WHERE elder_id = ?1 AND date = ?2")?;

        let result = stmt.query_row(params![elder_id, date], Self::from_row);
        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get rows for an elder in a closed date range, oldest first
    pub fn list_for_elder_between(
        conn: &Connection,
        elder_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM daily_statistics
             WHERE elder_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;

        let rows = stmt
            .query_map(params![elder_id, start, end], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Insert-or-update by (elder, date). An existing row is mutated in
    /// place; every field is overwritten with the recomputed values.
    pub fn upsert(conn: &Connection, data: &DailyStatisticsUpsert) -> DbResult<Self> {
        let medication_list = serde_json::to_string(&data.medication_list)
            .unwrap_or_else(|_| "[]".to_string());

        let existing = Self::get_by_elder_and_date(conn, data.elder_id, data.date)?;

        if let Some(existing) = existing {
            conn.execute(
                r#"
                UPDATE daily_statistics SET
                    breakfast_eaten = ?1,
                    lunch_eaten = ?2,
                    dinner_eaten = ?3,
                    medication_total_goal = ?4,
                    medication_total_taken = ?5,
                    medication_list = ?6,
                    avg_sleep_minutes = ?7,
                    health_status = ?8,
                    psych_status = ?9,
                    avg_blood_sugar = ?10,
                    ai_summary = ?11,
                    updated_at = datetime('now')
                WHERE id = ?12
                "#,
                params![
                    data.breakfast_eaten.map(i64::from),
                    data.lunch_eaten.map(i64::from),
                    data.dinner_eaten.map(i64::from),
                    data.medication_total_goal,
                    data.medication_total_taken,
                    medication_list,
                    data.avg_sleep_minutes,
                    data.health_status.map(|s| s.as_str()),
                    data.psych_status.map(|s| s.as_str()),
                    data.avg_blood_sugar,
                    data.ai_summary,
                    existing.id,
                ],
            )?;

            return Self::get_by_elder_and_date(conn, data.elder_id, data.date)?
                .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }

        conn.execute(
            r#"
            INSERT INTO daily_statistics (
                elder_id, date, breakfast_eaten, lunch_eaten, dinner_eaten,
                medication_total_goal, medication_total_taken, medication_list,
                avg_sleep_minutes, health_status, psych_status, avg_blood_sugar,
                ai_summary
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                data.elder_id,
                data.date,
                data.breakfast_eaten.map(i64::from),
                data.lunch_eaten.map(i64::from),
                data.dinner_eaten.map(i64::from),
                data.medication_total_goal,
                data.medication_total_taken,
                medication_list,
                data.avg_sleep_minutes,
                data.health_status.map(|s| s.as_str()),
                data.psych_status.map(|s| s.as_str()),
                data.avg_blood_sugar,
                data.ai_summary,
            ],
        )?;

        Self::get_by_elder_and_date(conn, data.elder_id, data.date)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}
