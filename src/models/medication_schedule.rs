//! Medication schedule model
//!
//! Planned medication doses per elder. A schedule entry names one
//! medication and the dose-time categories it is taken at; an entry may
//! cover several categories (e.g. a blood-pressure pill taken morning and
//! dinner).

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::column_parse_err;

/// Dose-time category matching a part of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseTime {
    Morning,
    Lunch,
    Dinner,
}

impl DoseTime {
    pub const ALL: [DoseTime; 3] = [DoseTime::Morning, DoseTime::Lunch, DoseTime::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            DoseTime::Morning => "morning",
            DoseTime::Lunch => "lunch",
            DoseTime::Dinner => "dinner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "morning" => Some(DoseTime::Morning),
            "lunch" => Some(DoseTime::Lunch),
            "dinner" => Some(DoseTime::Dinner),
            _ => None,
        }
    }

    /// Parse an extractor label (Korean per the extraction prompt, or English)
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "아침" => Some(DoseTime::Morning),
            "점심" => Some(DoseTime::Lunch),
            "저녁" => Some(DoseTime::Dinner),
            other => Self::from_str(other),
        }
    }
}

/// A planned medication dose schedule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: i64,
    pub elder_id: i64,
    pub name: String,
    pub schedule_times: Vec<DoseTime>,
    pub created_at: String,
}

/// Data for creating a schedule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationScheduleCreate {
    pub elder_id: i64,
    pub name: String,
    pub schedule_times: Vec<DoseTime>,
}

impl MedicationSchedule {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let times: String = row.get("schedule_times")?;
        let schedule_times = times
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| DoseTime::from_str(s.trim()).ok_or_else(|| column_parse_err("schedule_times", &times)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: row.get("id")?,
            elder_id: row.get("elder_id")?,
            name: row.get("name")?,
            schedule_times,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a new schedule entry
    pub fn create(conn: &Connection, data: &MedicationScheduleCreate) -> DbResult<Self> {
        let times = data
            .schedule_times
            .iter()
            .map(DoseTime::as_str)
            .collect::<Vec<_>>()
            .join(",");

        conn.execute(
            "INSERT INTO medication_schedules (elder_id, name, schedule_times) VALUES (?1, ?2, ?3)",
            params![data.elder_id, data.name, times],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a schedule entry by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medication_schedules WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(schedule) => Ok(Some(schedule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all schedule entries for an elder
    pub fn list_for_elder(conn: &Connection, elder_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM medication_schedules WHERE elder_id = ?1 ORDER BY name, id",
        )?;

        let schedules = stmt
            .query_map([elder_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(schedules)
    }

    /// Distinct medication names known for an elder
    pub fn medication_names(conn: &Connection, elder_id: i64) -> DbResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT name FROM medication_schedules WHERE elder_id = ?1 ORDER BY name",
        )?;

        let names = stmt
            .query_map([elder_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }

    /// Number of planned doses this entry covers
    pub fn dose_count(&self) -> usize {
        self.schedule_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_time_labels() {
        assert_eq!(DoseTime::from_label("아침"), Some(DoseTime::Morning));
        assert_eq!(DoseTime::from_label("점심"), Some(DoseTime::Lunch));
        assert_eq!(DoseTime::from_label("저녁"), Some(DoseTime::Dinner));
        assert_eq!(DoseTime::from_label("MORNING"), Some(DoseTime::Morning));
        assert_eq!(DoseTime::from_label("midnight"), None);
    }
}
