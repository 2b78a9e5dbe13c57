//! Blood sugar record model
//!
//! One row per extracted blood-sugar reading.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::column_parse_err;

/// Reading classified as low when below this bound (mg/dL)
pub const LOW_THRESHOLD: f64 = 70.0;
/// Reading classified as high when above this bound (mg/dL)
pub const HIGH_THRESHOLD: f64 = 200.0;

/// Whether the reading was taken before or after a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    BeforeMeal,
    AfterMeal,
}

impl MeasurementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::BeforeMeal => "before_meal",
            MeasurementType::AfterMeal => "after_meal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "before_meal" | "before" => Some(MeasurementType::BeforeMeal),
            "after_meal" | "after" => Some(MeasurementType::AfterMeal),
            _ => None,
        }
    }

    /// Parse an extractor label (Korean per the extraction prompt, or English)
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "식전" => Some(MeasurementType::BeforeMeal),
            "식후" => Some(MeasurementType::AfterMeal),
            other => Self::from_str(other),
        }
    }
}

/// Classified blood-sugar status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloodSugarStatus {
    Low,
    Normal,
    High,
}

impl BloodSugarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodSugarStatus::Low => "low",
            BloodSugarStatus::Normal => "normal",
            BloodSugarStatus::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(BloodSugarStatus::Low),
            "normal" => Some(BloodSugarStatus::Normal),
            "high" => Some(BloodSugarStatus::High),
            _ => None,
        }
    }

    /// Classify a reading by the fixed thresholds. Used only when the
    /// extractor did not supply a status of its own.
    pub fn classify(value: f64) -> Self {
        if value < LOW_THRESHOLD {
            BloodSugarStatus::Low
        } else if value > HIGH_THRESHOLD {
            BloodSugarStatus::High
        } else {
            BloodSugarStatus::Normal
        }
    }
}

/// An extracted blood-sugar reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodSugarRecord {
    pub id: i64,
    pub call_record_id: i64,
    pub value: f64,
    pub measurement_type: Option<MeasurementType>,
    pub status: Option<BloodSugarStatus>,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

/// Data for creating a blood sugar record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodSugarRecordCreate {
    pub call_record_id: i64,
    pub value: f64,
    pub measurement_type: Option<MeasurementType>,
    pub status: Option<BloodSugarStatus>,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

impl BloodSugarRecord {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let measurement_type: Option<String> = row.get("measurement_type")?;
        let measurement_type = match measurement_type {
            Some(s) => Some(
                MeasurementType::from_str(&s)
                    .ok_or_else(|| column_parse_err("measurement_type", &s))?,
            ),
            None => None,
        };

        let status: Option<String> = row.get("status")?;
        let status = match status {
            Some(s) => {
                Some(BloodSugarStatus::from_str(&s).ok_or_else(|| column_parse_err("status", &s))?)
            }
            None => None,
        };

        Ok(Self {
            id: row.get("id")?,
            call_record_id: row.get("call_record_id")?,
            value: row.get("value")?,
            measurement_type,
            status,
            response_summary: row.get("response_summary")?,
            recorded_at: row.get("recorded_at")?,
        })
    }

    /// Create a new blood sugar record
    pub fn create(conn: &Connection, data: &BloodSugarRecordCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO blood_sugar_records (
                call_record_id, value, measurement_type, status,
                response_summary, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.call_record_id,
                data.value,
                data.measurement_type.map(|t| t.as_str()),
                data.status.map(|s| s.as_str()),
                data.response_summary,
                data.recorded_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a blood sugar record by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM blood_sugar_records WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all blood sugar records for an elder on a calendar date
    pub fn list_for_elder_on(
        conn: &Connection,
        elder_id: i64,
        date: NaiveDate,
    ) -> DbResult<Vec<Self>> {
        Self::list_for_elder_between(conn, elder_id, date, date)
    }

    /// Get all blood sugar records for an elder in a closed date range.
    /// The date is the call's date, not the row's audit timestamp.
    pub fn list_for_elder_between(
        conn: &Connection,
        elder_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Self>> {
        let range_start = start.and_hms_opt(0, 0, 0).expect("midnight");
        let range_end = end
            .succ_opt()
            .unwrap_or(end)
            .and_hms_opt(0, 0, 0)
            .expect("midnight");

        let mut stmt = conn.prepare(
            "SELECT b.* FROM blood_sugar_records b
             JOIN call_records c ON c.id = b.call_record_id
             WHERE c.elder_id = ?1 AND c.called_at >= ?2 AND c.called_at < ?3
             ORDER BY c.called_at, b.id",
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
    fn test_classify_thresholds() {
        assert_eq!(BloodSugarStatus::classify(69.9), BloodSugarStatus::Low);
        assert_eq!(BloodSugarStatus::classify(70.0), BloodSugarStatus::Normal);
        assert_eq!(BloodSugarStatus::classify(120.0), BloodSugarStatus::Normal);
        assert_eq!(BloodSugarStatus::classify(200.0), BloodSugarStatus::Normal);
        assert_eq!(BloodSugarStatus::classify(200.1), BloodSugarStatus::High);
    }

    #[test]
    fn test_measurement_type_labels() {
        assert_eq!(
            MeasurementType::from_label("식전"),
            Some(MeasurementType::BeforeMeal)
        );
        assert_eq!(
            MeasurementType::from_label("식후"),
            Some(MeasurementType::AfterMeal)
        );
        assert_eq!(
            MeasurementType::from_label("before"),
            Some(MeasurementType::BeforeMeal)
        );
        assert_eq!(MeasurementType::from_label("fasting"), None);
    }
}
