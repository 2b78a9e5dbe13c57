//! Meal record model
//!
//! One row per meal mention extracted from a call. Never updated.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::column_parse_err;

/// Meal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            _ => None,
        }
    }

    /// Parse an extractor label (Korean per the extraction prompt, or English)
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "아침" => Some(MealType::Breakfast),
            "점심" => Some(MealType::Lunch),
            "저녁" => Some(MealType::Dinner),
            other => Self::from_str(other),
        }
    }
}

/// Tri-state eaten flag.
///
/// Unreported means the call gave no usable answer for that meal; it is a
/// distinct state, not a euphemism for "skipped the meal".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealEaten {
    Eaten,
    NotEaten,
    Unreported,
}

impl MealEaten {
    /// Parse an extractor label; anything other than the two fixed answers
    /// is treated as unreported.
    pub fn from_label(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("섭취함") | Some("eaten") => MealEaten::Eaten,
            Some("섭취하지 않음") | Some("not_eaten") | Some("not eaten") => MealEaten::NotEaten,
            _ => MealEaten::Unreported,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MealEaten::Eaten => Some(true),
            MealEaten::NotEaten => Some(false),
            MealEaten::Unreported => None,
        }
    }

    fn to_db(self) -> Option<i64> {
        self.as_bool().map(i64::from)
    }

    fn from_db(value: Option<i64>) -> Self {
        match value {
            Some(v) if v != 0 => MealEaten::Eaten,
            Some(_) => MealEaten::NotEaten,
            None => MealEaten::Unreported,
        }
    }
}

/// A meal mention extracted from a single call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: i64,
    pub call_record_id: i64,
    pub meal_type: MealType,
    pub eaten: MealEaten,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

/// Data for creating a meal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRecordCreate {
    pub call_record_id: i64,
    pub meal_type: MealType,
    pub eaten: MealEaten,
    pub response_summary: Option<String>,
    pub recorded_at: NaiveDateTime,
}

impl MealRecord {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let meal_type: String = row.get("meal_type")?;
        Ok(Self {
            id: row.get("id")?,
            call_record_id: row.get("call_record_id")?,
            meal_type: MealType::from_str(&meal_type)
                .ok_or_else(|| column_parse_err("meal_type", &meal_type))?,
            eaten: MealEaten::from_db(row.get("eaten")?),
            response_summary: row.get("response_summary")?,
            recorded_at: row.get("recorded_at")?,
        })
    }

    /// Create a new meal record
    pub fn create(conn: &Connection, data: &MealRecordCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO meal_records (
                call_record_id, meal_type, eaten, response_summary, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.call_record_id,
                data.meal_type.as_str(),
                data.eaten.to_db(),
                data.response_summary,
                data.recorded_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a meal record by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM meal_records WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all meal records for an elder on a calendar date, oldest first.
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
            "SELECT m.* FROM meal_records m
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
    fn test_meal_type_labels() {
        assert_eq!(MealType::from_label("아침"), Some(MealType::Breakfast));
        assert_eq!(MealType::from_label("점심"), Some(MealType::Lunch));
        assert_eq!(MealType::from_label("저녁"), Some(MealType::Dinner));
        assert_eq!(MealType::from_label("dinner"), Some(MealType::Dinner));
        assert_eq!(MealType::from_label("brunch"), None);
    }

    #[test]
    fn test_eaten_label_defaults_to_unreported() {
        assert_eq!(MealEaten::from_label(Some("섭취함")), MealEaten::Eaten);
        assert_eq!(
            MealEaten::from_label(Some("섭취하지 않음")),
            MealEaten::NotEaten
        );
        assert_eq!(MealEaten::from_label(Some("maybe")), MealEaten::Unreported);
        assert_eq!(MealEaten::from_label(None), MealEaten::Unreported);
    }

    #[test]
    fn test_eaten_db_round_trip_keeps_unreported_null() {
        for eaten in [MealEaten::Eaten, MealEaten::NotEaten, MealEaten::Unreported] {
            assert_eq!(MealEaten::from_db(eaten.to_db()), eaten);
        }
        assert_eq!(MealEaten::Unreported.to_db(), None);
    }
}
