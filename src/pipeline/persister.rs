//! Analysis result persister
//!
//! Converts one call's extracted health-data object into raw per-category
//! records and attaches the call-level fields. All writes for a call
//! happen in one transaction: a data-integrity error (an unrecognized
//! medication) aborts the whole analysis step with nothing persisted.

use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::extraction::{BloodSugarData, HealthDataExtraction, MealData, MedicationData, SleepData};
use crate::ai::SummaryGenerator;
use crate::db::{Database, DbError};
use crate::models::{
    BloodSugarRecordCreate, BloodSugarRecord, BloodSugarStatus, CallAnalysisUpdate, CallRecord,
    ConditionStatus, DoseTime, MealEaten, MealRecord, MealRecordCreate, MealType,
    MeasurementType, MedicationSchedule, MedicationTakenRecord, MedicationTakenRecordCreate,
    TakenStatus,
};

/// Stored as the meal summary when the call gave no usable answer
pub const MEAL_STATUS_UNKNOWN_MESSAGE: &str =
    "Could not confirm whether this meal was eaten.";

/// Analysis persistence error types
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The extractor mentioned a medication the elder's schedule does not
    /// know. Treated as a data-integrity condition, not silently dropped.
    #[error("medication not recognized: {0}")]
    MedicationNotRecognized(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for ProcessingError {
    fn from(e: rusqlite::Error) -> Self {
        ProcessingError::Db(DbError::Sqlite(e))
    }
}

/// Persists one call's extraction result
#[derive(Clone)]
pub struct AnalysisResultPersister {
    db: Database,
    summaries: Arc<dyn SummaryGenerator>,
}

impl AnalysisResultPersister {
    pub fn new(db: Database, summaries: Arc<dyn SummaryGenerator>) -> Self {
        Self { db, summaries }
    }

    /// Persist the extracted object for a finished call. A call without a
    /// transcript has nothing to analyze and this is a no-op; an empty
    /// extraction (including every provider-failure case) writes nothing
    /// but the audit fields.
    pub async fn persist(
        &self,
        record: &CallRecord,
        extraction: &HealthDataExtraction,
    ) -> Result<(), ProcessingError> {
        if record
            .transcript
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
        {
            return Ok(());
        }

        let (psych_details, psych_status) = detail_fields(
            extraction.psychological_state.as_deref(),
            extraction.psychological_status.as_deref(),
        );
        let (health_details, health_status) = detail_fields(
            extraction.health_signs.as_deref(),
            extraction.health_status.as_deref(),
        );

        // The symptom comment is the only provider call in here; make it
        // before the transaction opens.
        let ai_health_comment = match &health_details {
            Some(details) => {
                let signs: Vec<String> =
                    details.split(", ").map(str::to_string).collect();
                self.summaries.symptom_comment(&signs).await
            }
            None => None,
        };

        let (sleep_start, sleep_end) = extraction
            .sleep_data
            .as_ref()
            .map(|s| parse_sleep_window(s, record.called_at.date()))
            .unwrap_or((None, None));

        let update = CallAnalysisUpdate {
            sleep_start,
            sleep_end,
            health_status,
            psych_status,
            health_details,
            psych_details,
            ai_health_comment,
            extracted_json: serde_json::to_string(extraction).ok(),
        };

        let now = Utc::now().naive_utc();
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;

        if let Some(meals) = &extraction.meal_data {
            save_meals(&tx, record.id, meals, now)?;
        }
        if let Some(readings) = &extraction.blood_sugar_data {
            save_blood_sugar(&tx, record.id, readings, now)?;
        }
        if let Some(medications) = &extraction.medication_data {
            let schedules = MedicationSchedule::list_for_elder(&tx, record.elder_id)?;
            save_medications(&tx, record.id, &schedules, medications, now)?;
        }

        CallRecord::apply_analysis(&tx, record.id, &update)?;
        tx.commit()?;

        info!(call_id = record.id, "extracted health data persisted");
        Ok(())
    }
}

/// Join a detail list into one string and parse the coarse status label.
/// Both stay empty when the list has no usable entries; the status label
/// is the extractor's own and is passed through, never re-derived.
fn detail_fields(
    details: Option<&[String]>,
    status_label: Option<&str>,
) -> (Option<String>, Option<ConditionStatus>) {
    let details: Vec<&str> = details
        .unwrap_or(&[])
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if details.is_empty() {
        return (None, None);
    }

    let status = status_label.and_then(ConditionStatus::from_label);
    (Some(details.join(", ")), status)
}

/// Parse the extracted HH:MM sleep window against the call's date. A wake
/// time earlier than the bed time rolls over to the next day.
fn parse_sleep_window(
    sleep: &SleepData,
    call_date: NaiveDate,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let parse = |value: Option<&str>, label: &str| -> Option<NaiveTime> {
        let value = value?;
        match NaiveTime::parse_from_str(value.trim(), "%H:%M") {
            Ok(t) => Some(t),
            Err(_) => {
                warn!("unparseable {label} time: {value}");
                None
            }
        }
    };

    let start = parse(sleep.sleep_start_time.as_deref(), "sleep start")
        .map(|t| call_date.and_time(t));
    let end = parse(sleep.sleep_end_time.as_deref(), "sleep end").map(|t| {
        let end = call_date.and_time(t);
        match start {
            Some(start) if end < start => end + Days::new(1),
            _ => end,
        }
    });

    (start, end)
}

fn save_meals(
    conn: &Connection,
    call_record_id: i64,
    meals: &[MealData],
    now: NaiveDateTime,
) -> Result<(), ProcessingError> {
    for meal in meals {
        let Some(meal_type) = meal.meal_type.as_deref().and_then(MealType::from_label) else {
            warn!(call_record_id, "unknown meal type: {:?}", meal.meal_type);
            continue;
        };

        let eaten = MealEaten::from_label(meal.meal_eaten_status.as_deref());
        let response_summary = if eaten == MealEaten::Unreported {
            Some(MEAL_STATUS_UNKNOWN_MESSAGE.to_string())
        } else {
            meal.meal_summary.clone()
        };

        MealRecord::create(
            conn,
            &MealRecordCreate {
                call_record_id,
                meal_type,
                eaten,
                response_summary,
                recorded_at: now,
            },
        )?;
    }

    Ok(())
}

fn save_blood_sugar(
    conn: &Connection,
    call_record_id: i64,
    readings: &[BloodSugarData],
    now: NaiveDateTime,
) -> Result<(), ProcessingError> {
    for reading in readings {
        let Some(value) = reading.blood_sugar_value else {
            warn!(call_record_id, "blood sugar reading without a value, skipping");
            continue;
        };

        let measurement_type = reading
            .meal_time
            .as_deref()
            .and_then(MeasurementType::from_label);

        // The extractor's status is authoritative; classify by threshold
        // only when it gave none.
        let status = reading
            .status
            .as_deref()
            .and_then(BloodSugarStatus::from_str)
            .or_else(|| Some(BloodSugarStatus::classify(value)));

        let response_summary = Some(format!(
            "measured: {}, relation to meal: {}",
            reading.measurement_time.as_deref().unwrap_or("unknown"),
            measurement_type.map_or("unknown", |t| t.as_str()),
        ));

        BloodSugarRecord::create(
            conn,
            &BloodSugarRecordCreate {
                call_record_id,
                value,
                measurement_type,
                status,
                response_summary,
                recorded_at: now,
            },
        )?;
    }

    Ok(())
}

fn save_medications(
    conn: &Connection,
    call_record_id: i64,
    schedules: &[MedicationSchedule],
    medications: &[MedicationData],
    now: NaiveDateTime,
) -> Result<(), ProcessingError> {
    for medication in medications {
        let Some(name) = medication
            .medication_type
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            warn!(call_record_id, "medication mention without a name, skipping");
            continue;
        };

        if !schedules.iter().any(|s| s.name == name) {
            return Err(ProcessingError::MedicationNotRecognized(name.to_string()));
        }

        let dose_time = medication.taken_time.as_deref().and_then(DoseTime::from_label);

        // Dose matching: the first schedule entry for this medication whose
        // category set covers the mentioned take time. No match leaves the
        // link empty - taken, but not attributable to a planned dose.
        let schedule_id = dose_time.and_then(|t| {
            schedules
                .iter()
                .find(|s| s.name == name && s.schedule_times.contains(&t))
                .map(|s| s.id)
        });

        let taken = TakenStatus::from_label(medication.taken.as_deref());
        let response_summary = Some(format!(
            "take time: {}, taken: {}",
            medication.taken_time.as_deref().unwrap_or("unknown"),
            medication.taken.as_deref().unwrap_or("unknown"),
        ));

        MedicationTakenRecord::create(
            conn,
            &MedicationTakenRecordCreate {
                call_record_id,
                schedule_id,
                name: name.to_string(),
                taken,
                dose_time,
                response_summary,
                recorded_at: now,
            },
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::NoopSummaryGenerator;
    use crate::db::migrations;
    use crate::models::{
        CallRecordCreate, CallStatus, Elder, MedicationScheduleCreate,
    };

    fn test_db() -> Database {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        let db = Database::new(path).expect("open");
        db.with_conn(|conn| migrations::run_migrations(conn)).expect("migrate");
        db
    }

    fn persister(db: &Database) -> AnalysisResultPersister {
        AnalysisResultPersister::new(db.clone(), Arc::new(NoopSummaryGenerator))
    }

    fn completed_call(db: &Database, elder_id: i64, transcript: Option<&str>) -> CallRecord {
        db.with_conn(|conn| {
            CallRecord::create(
                conn,
                &CallRecordCreate {
                    elder_id,
                    setting_id: None,
                    called_at: "2025-03-03T18:05:00".parse().expect("datetime"),
                    responded: true,
                    call_status: CallStatus::Completed,
                    transcript: transcript.map(String::from),
                },
            )
        })
        .expect("call record")
    }

    fn extraction_json(json: &str) -> HealthDataExtraction {
        serde_json::from_str(json).expect("extraction json")
    }

    #[tokio::test]
    async fn test_no_transcript_is_a_noop() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, None);

        let extraction = extraction_json(
            r#"{"mealData": [{"mealType": "아침", "mealEatenStatus": "섭취함"}]}"#,
        );
        persister(&db).persist(&record, &extraction).await.expect("persist");

        let meals = db
            .with_conn(|conn| MealRecord::list_for_elder_on(conn, elder.id, record.called_at.date()))
            .expect("meals");
        assert!(meals.is_empty());
    }

    #[tokio::test]
    async fn test_empty_extraction_writes_only_audit_fields() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, Some("잘 지냈어요"));

        persister(&db)
            .persist(&record, &HealthDataExtraction::empty())
            .await
            .expect("persist");

        let reloaded = db
            .with_conn(|conn| CallRecord::get_by_id(conn, record.id))
            .expect("reload")
            .expect("row");
        assert!(reloaded.extracted_json.is_some());
        assert!(reloaded.health_status.is_none());
        assert!(reloaded.sleep_start.is_none());
    }

    #[tokio::test]
    async fn test_unreported_meal_keeps_null_flag_and_fixed_message() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, Some("밥은 글쎄요"));

        let extraction = extraction_json(
            r#"{"mealData": [
                {"mealType": "아침", "mealEatenStatus": "섭취함", "mealSummary": "미역국"},
                {"mealType": "점심"}
            ]}"#,
        );
        persister(&db).persist(&record, &extraction).await.expect("persist");

        let meals = db
            .with_conn(|conn| MealRecord::list_for_elder_on(conn, elder.id, record.called_at.date()))
            .expect("meals");
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].eaten, MealEaten::Eaten);
        assert_eq!(meals[0].response_summary.as_deref(), Some("미역국"));
        assert_eq!(meals[1].eaten, MealEaten::Unreported);
        assert_eq!(
            meals[1].response_summary.as_deref(),
            Some(MEAL_STATUS_UNKNOWN_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_blood_sugar_classified_only_when_extractor_silent() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, Some("혈당 얘기"));

        let extraction = extraction_json(
            r#"{"bloodSugarData": [
                {"mealTime": "식전", "bloodSugarValue": 65},
                {"mealTime": "식후", "bloodSugarValue": 65, "status": "NORMAL"}
            ]}"#,
        );
        persister(&db).persist(&record, &extraction).await.expect("persist");

        let readings = db
            .with_conn(|conn| {
                BloodSugarRecord::list_for_elder_on(conn, elder.id, record.called_at.date())
            })
            .expect("readings");
        assert_eq!(readings.len(), 2);
        // No extractor status: thresholds classify 65 as low
        assert_eq!(readings[0].status, Some(BloodSugarStatus::Low));
        // Extractor-supplied status wins over the thresholds
        assert_eq!(readings[1].status, Some(BloodSugarStatus::Normal));
    }

    #[tokio::test]
    async fn test_dose_matching_links_covering_schedule() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let schedule = db
            .with_conn(|conn| {
                MedicationSchedule::create(
                    conn,
                    &MedicationScheduleCreate {
                        elder_id: elder.id,
                        name: "혈압약".to_string(),
                        schedule_times: vec![DoseTime::Morning, DoseTime::Dinner],
                    },
                )
            })
            .expect("schedule");
        let record = completed_call(&db, elder.id, Some("저녁 약 먹었어요, 점심에도 먹었고"));

        let extraction = extraction_json(
            r#"{"medicationData": [
                {"medicationType": "혈압약", "taken": "복용함", "takenTime": "저녁"},
                {"medicationType": "혈압약", "taken": "복용함", "takenTime": "점심"}
            ]}"#,
        );
        persister(&db).persist(&record, &extraction).await.expect("persist");

        let records = db
            .with_conn(|conn| {
                MedicationTakenRecord::list_for_elder_on(conn, elder.id, record.called_at.date())
            })
            .expect("records");
        assert_eq!(records.len(), 2);
        // Dinner is covered by the schedule entry; lunch is not planned
        assert_eq!(records[0].schedule_id, Some(schedule.id));
        assert_eq!(records[0].dose_time, Some(DoseTime::Dinner));
        assert_eq!(records[1].schedule_id, None);
        assert_eq!(records[1].taken, TakenStatus::Taken);
    }

    #[tokio::test]
    async fn test_unrecognized_medication_aborts_without_partial_writes() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, Some("아침 먹고 이상한 약도 먹었어요"));

        let extraction = extraction_json(
            r#"{
                "mealData": [{"mealType": "아침", "mealEatenStatus": "섭취함"}],
                "medicationData": [{"medicationType": "정체불명약", "taken": "복용함", "takenTime": "아침"}]
            }"#,
        );

        let err = persister(&db).persist(&record, &extraction).await.expect_err("abort");
        assert!(matches!(err, ProcessingError::MedicationNotRecognized(name) if name == "정체불명약"));

        // The meal written earlier in the same analysis rolled back with it
        let meals = db
            .with_conn(|conn| MealRecord::list_for_elder_on(conn, elder.id, record.called_at.date()))
            .expect("meals");
        assert!(meals.is_empty());
        let reloaded = db
            .with_conn(|conn| CallRecord::get_by_id(conn, record.id))
            .expect("reload")
            .expect("row");
        assert!(reloaded.extracted_json.is_none());
    }

    #[tokio::test]
    async fn test_sleep_window_rolls_past_midnight() {
        let db = test_db();
        let elder = db.with_conn(|conn| Elder::create(conn, "test elder")).expect("elder");
        let record = completed_call(&db, elder.id, Some("10시에 자서 6시에 일어났어요"));

        let extraction = extraction_json(
            r#"{"sleepData": {"sleepStartTime": "22:00", "sleepEndTime": "06:00"}}"#,
        );
        persister(&db).persist(&record, &extraction).await.expect("persist");

        let reloaded = db
            .with_conn(|conn| CallRecord::get_by_id(conn, record.id))
            .expect("reload")
            .expect("row");
        assert_eq!(reloaded.sleep_minutes(), Some(480));
    }
}
