//! Medication taken record model
//!
//! Dose-taken mentions extracted from calls. A record links to the best
//! matching schedule entry when the mentioned take time is covered by one;
//! otherwise the medication was taken but cannot be attributed to a
//! planned dose and the link stays empty.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::{column_parse_err, DoseTime};

/// Tri-state taken flag; Unknown means the call gave no usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakenStatus {
    Taken,
    NotTaken,
    Unknown,
}

impl TakenStatus {
    /// Parse an extractor label; anything other than the two fixed answers
    /// is treated as unknown.
    pub fn from_label(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("복용함") | Some("taken") => TakenStatus::Taken,
            Some("복용하지 않음") | Some("not_taken") | Some("not taken") => TakenStatus::NotTaken,
            _ => TakenStatus::Unknown,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TakenStatus::Taken => Some(true),
            TakenStatus::NotTaken => Some(false),
            TakenStatus::Unknown => None,
        }
    }

    fn to_db(self) -> Option<i64> {
        self.as_bool().map(i64::from)
    }

    fn from_db(value: Option<i64>) -> Self {
        match value {
            Some(v) if v != 0 => TakenStatus::Taken,
            Some(_) => TakenStatus::NotTaken,
            None => TakenStatus::Unknown,
        }
    }
}

/// A dose-taken mention extracted from a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationTakenRecord {
    pub id: i64,
    pub call_record_id: i64,
    pub schedule_id: Option<i64>,
    pub name: String,
    pub taken: TakenStatus,
    pub dose_time: Option<DoseTime>,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

/// Data for creating a medication taken record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationTakenRecordCreate {
    pub call_record_id: i64,
    pub schedule_id: Option<i64>,
    pub name: String,
    pub taken: TakenStatus,
    pub dose_time: Option<DoseTime>,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

impl MedicationTakenRecord {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let dose_time: Option<String> = row.get("dose_time")?;
        let dose_time = match dose_time {
            Some(s) => Some(DoseTime::from_str(&s).ok_or_else(|| column_parse_err("dose_time", &s))?),
            None => None,
        };

        Ok(Self {
            id: row.get("id")?,
            call_record_id: row.get("call_record_id")?,
            schedule_id: row.get("schedule_id")?,
            name: row.get("name")?,
            taken: TakenStatus::from_db(row.get("taken")?),
            dose_time,
            response_summary: row.get("response_summary")?,
            recorded_at: row.get("recorded_at")?,
        })
    }

    /// Create a new medication taken record
    pub fn create(conn: &Connection, data: &MedicationTakenRecordCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO medication_taken_records (
                call_record_id, schedule_id, name, taken, dose_time,
                response_summary, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.call_record_id,
                data.schedule_id,
                data.name,
                data.taken.to_db(),
                data.dose_time.map(|t| t.as_str()),
                data.response_summary,
                data.recorded_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a medication taken record by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medication_taken_records WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all medication taken records for an elder on a calendar date.
    /// The date is the call's date, not the row's audit timestamp.
    pub fn list_for_elder_on(
        conn: &Connection,
        elder_id: i64,
        date: NaiveDate,
    ) -> DbResult<Vec<Self>> {
        let range_start = date.and_hms_opt(0, 0, 0).expect("midnight");
        let range_end = date
            .succ_opt()
            .unwrap_or(date)
            .and_hms_opt(0, 0, 0)
            .expect("midnight");

        let mut stmt = conn.prepare(
            "SELECT m.* FROM medication_taken_records m
             JOIN call_records c ON c.id = m.call_record_id
             WHERE c.elder_id = ?1 AND c.called_at >= ?2 AND c.called_at < ?3
             ORDER BY c.called_at, m.id",
        )?;

        let records = stmt
            .query_map(params![elder_id, range_start, range_end], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taken_label_defaults_to_unknown() {
        assert_eq!(TakenStatus::from_label(Some("복용함")), TakenStatus::Taken);
        assert_eq!(
            TakenStatus::from_label(Some("복용하지 않음")),
            TakenStatus::NotTaken
        );
        assert_eq!(TakenStatus::from_label(Some("later")), TakenStatus::Unknown);
        assert_eq!(TakenStatus::from_label(None), TakenStatus::Unknown);
    }

    #[test]
    fn test_taken_db_round_trip() {
        for taken in [TakenStatus::Taken, TakenStatus::NotTaken, TakenStatus::Unknown] {
            assert_eq!(TakenStatus::from_db(taken.to_db()), taken);
        }
    }
}
