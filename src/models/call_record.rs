//! Call record model
//!
//! One row per attempted care call. Created when the call finishes and
//! mutated exactly once by the analysis persister to attach extracted
//! health fields; after that it is a permanent audit record.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// Terminal status of an attempted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Completed,
    NoAnswer,
    Busy,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Completed => "completed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Busy => "busy",
            CallStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => CallStatus::Completed,
            "no-answer" | "no_answer" => CallStatus::NoAnswer,
            "busy" => CallStatus::Busy,
            _ => CallStatus::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CallStatus::Completed)
    }

    /// Whether this status counts toward the missed-call counter.
    ///
    /// Only "no-answer" does; busy and failed calls are invisible to the
    /// counter on both the fast path and the weekly recompute.
    pub fn is_missed(&self) -> bool {
        matches!(self, CallStatus::NoAnswer)
    }
}

/// Coarse good/bad classification of a health or mood observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStatus {
    Good,
    Bad,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::Good => "good",
            ConditionStatus::Bad => "bad",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "good" => Some(ConditionStatus::Good),
            "bad" => Some(ConditionStatus::Bad),
            _ => None,
        }
    }

    /// Parse an extractor label. The extraction provider answers with the
    /// fixed Korean labels from its prompt; English is accepted as well.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "좋음" => Some(ConditionStatus::Good),
            "나쁨" => Some(ConditionStatus::Bad),
            other => Self::from_str(other),
        }
    }

    fn to_db(self) -> i64 {
        match self {
            ConditionStatus::Good => 1,
            ConditionStatus::Bad => 0,
        }
    }

    fn from_db(value: Option<i64>) -> Option<Self> {
        value.map(|v| {
            if v == 1 {
                ConditionStatus::Good
            } else {
                ConditionStatus::Bad
            }
        })
    }
}

/// An attempted care call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub elder_id: i64,
    pub setting_id: Option<i64>,
    pub called_at: NaiveDateTime,
    pub responded: bool,
    pub call_status: CallStatus,
    pub transcript: Option<String>,
    pub sleep_start: Option<NaiveDateTime>,
    pub sleep_end: Option<NaiveDateTime>,
    pub health_status: Option<ConditionStatus>,
    pub psych_status: Option<ConditionStatus>,
    pub health_details: Option<String>,
    pub psych_details: Option<String>,
    pub ai_health_comment: Option<String>,
    pub extracted_json: Option<String>,
    pub created_at: String,
}

/// Data for creating a call record when a call finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecordCreate {
    pub elder_id: i64,
    pub setting_id: Option<i64>,
    pub called_at: NaiveDateTime,
    pub responded: bool,
    pub call_status: CallStatus,
    pub transcript: Option<String>,
}

/// Extracted fields attached by the analysis persister
#[derive(Debug, Clone, Default)]
pub struct CallAnalysisUpdate {
    pub sleep_start: Option<NaiveDateTime>,
    pub sleep_end: Option<NaiveDateTime>,
    pub health_status: Option<ConditionStatus>,
    pub psych_status: Option<ConditionStatus>,
    pub health_details: Option<String>,
    pub psych_details: Option<String>,
    pub ai_health_comment: Option<String>,
    pub extracted_json: Option<String>,
}

impl CallRecord {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get("call_status")?;
        Ok(Self {
            id: row.get("id")?,
            elder_id: row.get("elder_id")?,
            setting_id: row.get("setting_id")?,
            called_at: row.get("called_at")?,
            responded: row.get::<_, i64>("responded")? != 0,
            call_status: CallStatus::from_str(&status),
            transcript: row.get("transcript")?,
            sleep_start: row.get("sleep_start")?,
            sleep_end: row.get("sleep_end")?,
            health_status: ConditionStatus::from_db(row.get("health_status")?),
            psych_status: ConditionStatus::from_db(row.get("psych_status")?),
            health_details: row.get("health_details")?,
            psych_details: row.get("psych_details")?,
            ai_health_comment: row.get("ai_health_comment")?,
            extracted_json: row.get("extracted_json")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a new call record
    pub fn create(conn: &Connection, data: &CallRecordCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO call_records (
                elder_id, setting_id, called_at, responded, call_status, transcript
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.elder_id,
                data.setting_id,
                data.called_at,
                data.responded as i64,
                data.call_status.as_str(),
                data.transcript,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a call record by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM call_records WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all call records for an elder on a calendar date, oldest first
    pub fn list_for_elder_on(
        conn: &Connection,
        elder_id: i64,
        date: NaiveDate,
    ) -> DbResult<Vec<Self>> {
        Self::list_for_elder_between(conn, elder_id, date, date)
    }

    /// Get all call records for an elder in a closed date range, oldest first
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
            "SELECT * FROM call_records
             WHERE elder_id = ?1 AND called_at >= ?2 AND called_at < ?3
             ORDER BY called_at, id",
        )?;

        let records = stmt
            .query_map(params![elder_id, range_start, range_end], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Attach extracted analysis fields. Called once per record by the
    /// analysis persister; the update always writes the full field set.
    pub fn apply_analysis(conn: &Connection, id: i64, data: &CallAnalysisUpdate) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE call_records SET
                sleep_start = ?1,
                sleep_end = ?2,
                health_status = ?3,
                psych_status = ?4,
                health_details = ?5,
                psych_details = ?6,
                ai_health_comment = ?7,
                extracted_json = ?8
            WHERE id = ?9
            "#,
            params![
                data.sleep_start,
                data.sleep_end,
                data.health_status.map(ConditionStatus::to_db),
                data.psych_status.map(ConditionStatus::to_db),
                data.health_details,
                data.psych_details,
                data.ai_health_comment,
                data.extracted_json,
                id,
            ],
        )?;
        Ok(())
    }

    /// Sleep duration in minutes, when both bounds are present
    pub fn sleep_minutes(&self) -> Option<i64> {
        match (self.sleep_start, self.sleep_end) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_status_round_trip() {
        for status in [
            CallStatus::Completed,
            CallStatus::NoAnswer,
            CallStatus::Busy,
            CallStatus::Failed,
        ] {
            assert_eq!(CallStatus::from_str(status.as_str()), status);
        }
        assert_eq!(CallStatus::from_str("canceled"), CallStatus::Failed);
    }

    #[test]
    fn test_only_no_answer_is_missed() {
        assert!(CallStatus::NoAnswer.is_missed());
        assert!(!CallStatus::Busy.is_missed());
        assert!(!CallStatus::Failed.is_missed());
        assert!(!CallStatus::Completed.is_missed());
    }

    #[test]
    fn test_condition_status_labels() {
        assert_eq!(ConditionStatus::from_label("좋음"), Some(ConditionStatus::Good));
        assert_eq!(ConditionStatus::from_label("나쁨"), Some(ConditionStatus::Bad));
        assert_eq!(ConditionStatus::from_label("good"), Some(ConditionStatus::Good));
        assert_eq!(ConditionStatus::from_label("so-so"), None);
    }

    #[test]
    fn test_sleep_minutes() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 2)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let record = CallRecord {
            id: 1,
            elder_id: 1,
            setting_id: None,
            called_at: start,
            responded: true,
            call_status: CallStatus::Completed,
            transcript: None,
            sleep_start: Some(start),
            sleep_end: Some(end),
            health_status: None,
            psych_status: None,
            health_details: None,
            psych_details: None,
            ai_health_comment: None,
            extracted_json: None,
            created_at: String::new(),
        };
        assert_eq!(record.sleep_minutes(), Some(480));
    }
}
