//! Call setting model
//!
//! Per-elder scheduled call slots. Each elder has up to three daily call
//! times; the slot a completed call lands in decides which dose-time
//! category that call covers (first slot = morning, second = lunch,
//! third = dinner).

use chrono::NaiveTime;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::DoseTime;

/// Scheduled call slots for an elder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSetting {
    pub id: i64,
    pub elder_id: i64,
    pub first_call_time: NaiveTime,
    pub second_call_time: Option<NaiveTime>,
    pub third_call_time: Option<NaiveTime>,
    pub recurrence: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a call setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSettingCreate {
    pub elder_id: i64,
    pub first_call_time: NaiveTime,
    pub second_call_time: Option<NaiveTime>,
    pub third_call_time: Option<NaiveTime>,
    pub recurrence: i64,
}

impl CallSetting {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            elder_id: row.get("elder_id")?,
            first_call_time: row.get("first_call_time")?,
            second_call_time: row.get("second_call_time")?,
            third_call_time: row.get("third_call_time")?,
            recurrence: row.get("recurrence")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Create a new call setting
    pub fn create(conn: &Connection, data: &CallSettingCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO call_settings (
                elder_id, first_call_time, second_call_time, third_call_time, recurrence
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.elder_id,
                data.first_call_time,
                data.second_call_time,
                data.third_call_time,
                data.recurrence,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a call setting by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM call_settings WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(setting) => Ok(Some(setting)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the call setting for an elder
    pub fn get_by_elder(conn: &Connection, elder_id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM call_settings WHERE elder_id = ?1")?;

        let result = stmt.query_row([elder_id], Self::from_row);
        match result {
            Ok(setting) => Ok(Some(setting)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update the call slot times
    pub fn update_times(
        conn: &Connection,
        id: i64,
        first: NaiveTime,
        second: Option<NaiveTime>,
        third: Option<NaiveTime>,
    ) -> DbResult<Option<Self>> {
        conn.execute(
            r#"
            UPDATE call_settings SET
                first_call_time = ?1,
                second_call_time = ?2,
                third_call_time = ?3,
                updated_at = datetime('now')
            WHERE id = ?4
            "#,
            params![first, second, third, id],
        )?;

        Self::get_by_id(conn, id)
    }

    /// Whether a call at this time of day falls inside the slot window
    /// for the given dose-time category.
    ///
    /// A category's window runs from its own slot time up to the next
    /// slot's time; a missing next slot leaves the window open-ended.
    /// Categories whose slot is not configured cover nothing, and calls
    /// earlier than the first slot belong to no category.
    pub fn covers(&self, category: DoseTime, call_time: NaiveTime) -> bool {
        match category {
            DoseTime::Morning => {
                call_time >= self.first_call_time
                    && self.second_call_time.map_or(true, |t| call_time < t)
            }
            DoseTime::Lunch => self.second_call_time.map_or(false, |t| {
                call_time >= t && self.third_call_time.map_or(true, |t| call_time < t)
            }),
            DoseTime::Dinner => self.third_call_time.map_or(false, |t| call_time >= t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(first: &str, second: Option<&str>, third: Option<&str>) -> CallSetting {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").expect("time");
        CallSetting {
            id: 1,
            elder_id: 1,
            first_call_time: t(first),
            second_call_time: second.map(t),
            third_call_time: third.map(t),
            recurrence: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_covers_three_slots() {
        let s = setting("09:00", Some("12:30"), Some("18:00"));
        let t = |v: &str| NaiveTime::parse_from_str(v, "%H:%M").expect("time");

        assert!(!s.covers(DoseTime::Morning, t("08:59")));
        assert!(s.covers(DoseTime::Morning, t("09:00")));
        assert!(s.covers(DoseTime::Morning, t("12:29")));
        assert!(!s.covers(DoseTime::Morning, t("12:30")));

        assert!(s.covers(DoseTime::Lunch, t("12:30")));
        assert!(s.covers(DoseTime::Lunch, t("17:59")));
        assert!(!s.covers(DoseTime::Lunch, t("18:00")));

        assert!(s.covers(DoseTime::Dinner, t("18:00")));
        assert!(s.covers(DoseTime::Dinner, t("23:30")));
        assert!(!s.covers(DoseTime::Dinner, t("17:00")));
    }

    #[test]
    fn test_covers_missing_middle_slot_leaves_morning_open() {
        let s = setting("09:00", None, Some("18:00"));
        let t = |v: &str| NaiveTime::parse_from_str(v, "%H:%M").expect("time");

        assert!(s.covers(DoseTime::Morning, t("17:59")));
        // No second slot configured: an evening call still satisfies the
        // open-ended morning window, exactly like the dinner one.
        assert!(s.covers(DoseTime::Morning, t("19:00")));
        assert!(s.covers(DoseTime::Dinner, t("19:00")));
        assert!(!s.covers(DoseTime::Lunch, t("13:00")));
    }

    #[test]
    fn test_covers_single_slot() {
        let s = setting("09:00", None, None);
        let t = |v: &str| NaiveTime::parse_from_str(v, "%H:%M").expect("time");

        assert!(!s.covers(DoseTime::Morning, t("08:00")));
        assert!(s.covers(DoseTime::Morning, t("21:00")));
        assert!(!s.covers(DoseTime::Lunch, t("21:00")));
        assert!(!s.covers(DoseTime::Dinner, t("21:00")));
    }
}
