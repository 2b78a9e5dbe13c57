//! Daily statistics service
//!
//! Upserts the (elder, date) rollup. Every invocation recomputes the full
//! field set from the day's raw records; running it again with no new raw
//! data converges to the same values, so it is safe to trigger once per
//! finished call.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::ai::{DailySummaryFacts, SummaryGenerator};
use crate::db::Database;
use crate::models::{
    BloodSugarRecord, CallRecord, CallSetting, ConditionStatus, DailyStatistics,
    DailyStatisticsUpsert, DoseStatus, DoseTime, MealRecord, MealType, MedicationInfo,
    MedicationSchedule, MedicationTakenRecord, TakenStatus,
};
use super::StatsError;

/// Medication goal/taken totals plus the per-medication breakdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicationDayStatus {
    pub total_goal: i64,
    pub total_taken: i64,
    pub list: Vec<MedicationInfo>,
}

/// Daily rollup service
#[derive(Clone)]
pub struct DailyStatisticsService {
    db: Database,
    summaries: Arc<dyn SummaryGenerator>,
}

impl DailyStatisticsService {
    pub fn new(db: Database, summaries: Arc<dyn SummaryGenerator>) -> Self {
        Self { db, summaries }
    }

    /// Recompute and upsert the daily rollup for the day of this call
    pub async fn upsert_daily_statistics(
        &self,
        record: &CallRecord,
    ) -> Result<DailyStatistics, StatsError> {
        let elder_id = record.elder_id;
        let day = record.called_at.date();

        let (meals, schedules, taken, setting, calls, blood_sugar) =
            self.db.with_conn(|conn| {
                Ok((
                    MealRecord::list_for_elder_on(conn, elder_id, day)?,
                    MedicationSchedule::list_for_elder(conn, elder_id)?,
                    MedicationTakenRecord::list_for_elder_on(conn, elder_id, day)?,
                    CallSetting::get_by_elder(conn, elder_id)?,
                    CallRecord::list_for_elder_on(conn, elder_id, day)?,
                    BloodSugarRecord::list_for_elder_on(conn, elder_id, day)?,
                ))
            })?;

        let (breakfast_eaten, lunch_eaten, dinner_eaten) = resolve_meal_status(&meals);

        let attempted = completed_dose_slots(setting.as_ref(), &calls);
        let medication = medication_breakdown(&schedules, &attempted, &taken);

        let avg_sleep_minutes = average_sleep_minutes(&calls);
        let health_status = latest_status(&calls, |c| c.health_status);
        let psych_status = latest_status(&calls, |c| c.psych_status);
        let avg_blood_sugar = average_blood_sugar(&blood_sugar);

        let has_data = !meals.is_empty()
            || !taken.is_empty()
            || avg_sleep_minutes.is_some()
            || avg_blood_sugar.is_some()
            || health_status.is_some()
            || psych_status.is_some();

        let ai_summary = if has_data {
            let facts = DailySummaryFacts {
                breakfast: breakfast_eaten,
                lunch: lunch_eaten,
                dinner: dinner_eaten,
                medication_total_taken: medication.total_taken,
                medication_total_goal: medication.total_goal,
                sleep_hours: avg_sleep_minutes.map(|m| m / 60),
                sleep_minutes: avg_sleep_minutes.map(|m| m % 60),
                avg_blood_sugar,
                health_status,
                psych_status,
            };
            Some(self.summaries.daily_summary(&facts).await)
        } else {
            info!(elder_id, %day, "no daily data yet, skipping summary generation");
            None
        };

        let upsert = DailyStatisticsUpsert {
            elder_id,
            date: day,
            breakfast_eaten,
            lunch_eaten,
            dinner_eaten,
            medication_total_goal: medication.total_goal,
            medication_total_taken: medication.total_taken,
            medication_list: medication.list,
            avg_sleep_minutes,
            health_status,
            psych_status,
            avg_blood_sugar,
            ai_summary,
        };

        Ok(self.db.with_conn(|conn| DailyStatistics::upsert(conn, &upsert))?)
    }
}

/// Which dose-time categories were actually attempted today.
///
/// An elder without a call setting has no slot-to-category mapping, so
/// every category counts as attempted and the goal is the full schedule.
/// With a setting, a category counts once any completed call landed in
/// its slot window.
pub fn completed_dose_slots(
    setting: Option<&CallSetting>,
    calls: &[CallRecord],
) -> BTreeSet<DoseTime> {
    let Some(setting) = setting else {
        return DoseTime::ALL.into_iter().collect();
    };

    let completed_times: Vec<_> = calls
        .iter()
        .filter(|c| c.call_status.is_completed())
        .map(|c| c.called_at.time())
        .collect();

    DoseTime::ALL
        .into_iter()
        .filter(|category| completed_times.iter().any(|t| setting.covers(*category, *t)))
        .collect()
}

/// Dynamic-goal computation over (schedules, attempted categories, day's
/// taken records). Planned doses whose category was never attempted
/// contribute to neither the goal nor the taken count.
pub fn medication_breakdown(
    schedules: &[MedicationSchedule],
    attempted: &BTreeSet<DoseTime>,
    taken_records: &[MedicationTakenRecord],
) -> MedicationDayStatus {
    let attempted_or_unattributed = |dose_time: Option<DoseTime>| {
        dose_time.map_or(true, |t| attempted.contains(&t))
    };

    let total_goal = schedules
        .iter()
        .flat_map(|s| s.schedule_times.iter())
        .filter(|t| attempted.contains(*t))
        .count() as i64;

    let total_taken = taken_records
        .iter()
        .filter(|r| r.taken == TakenStatus::Taken && attempted_or_unattributed(r.dose_time))
        .count() as i64;

    let mut names: Vec<&str> = schedules.iter().map(|s| s.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    let list = names
        .into_iter()
        .map(|name| {
            let entries: Vec<_> = schedules.iter().filter(|s| s.name == name).collect();

            let scheduled = entries.iter().map(|s| s.dose_count() as i64).sum();
            let goal = entries
                .iter()
                .flat_map(|s| s.schedule_times.iter())
                .filter(|t| attempted.contains(*t))
                .count() as i64;
            let taken = taken_records
                .iter()
                .filter(|r| {
                    r.name == name
                        && r.taken == TakenStatus::Taken
                        && attempted_or_unattributed(r.dose_time)
                })
                .count() as i64;

            let doses = entries
                .iter()
                .flat_map(|s| s.schedule_times.iter().copied())
                .map(|time| {
                    let flag = taken_records
                        .iter()
                        .find(|r| r.name == name && r.dose_time == Some(time))
                        .and_then(|r| r.taken.as_bool());
                    DoseStatus { time, taken: flag }
                })
                .collect();

            MedicationInfo {
                name: name.to_string(),
                scheduled,
                goal,
                taken,
                doses,
            }
        })
        .collect();

    MedicationDayStatus {
        total_goal,
        total_taken,
        list,
    }
}

/// Fold the day's meal records into per-category flags; for duplicate
/// mentions of the same meal the last record wins, even an unreported one.
fn resolve_meal_status(meals: &[MealRecord]) -> (Option<bool>, Option<bool>, Option<bool>) {
    let mut breakfast = None;
    let mut lunch = None;
    let mut dinner = None;

    for meal in meals {
        let flag = meal.eaten.as_bool();
        match meal.meal_type {
            MealType::Breakfast => breakfast = flag,
            MealType::Lunch => lunch = flag,
            MealType::Dinner => dinner = flag,
        }
    }

    (breakfast, lunch, dinner)
}

/// Latest-non-null resolution over the day's calls (oldest first): take
/// the most recent record, walking backward past nulls.
fn latest_status(
    calls: &[CallRecord],
    field: impl Fn(&CallRecord) -> Option<ConditionStatus>,
) -> Option<ConditionStatus> {
    calls.iter().rev().find_map(field)
}

/// Mean sleep duration over calls with a full sleep window
fn average_sleep_minutes(calls: &[CallRecord]) -> Option<i64> {
    let durations: Vec<i64> = calls.iter().filter_map(CallRecord::sleep_minutes).collect();

    if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<i64>() / durations.len() as i64)
    }
}

/// Mean blood-sugar reading, rounded half-up to a whole mg/dL
fn average_blood_sugar(records: &[BloodSugarRecord]) -> Option<i64> {
    if records.is_empty() {
        return None;
    }

    let sum: f64 = records.iter().map(|r| r.value).sum();
    Some((sum / records.len() as f64).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, NaiveTime};
    use crate::models::CallStatus;

    fn call_at(time: &str, status: CallStatus) -> CallRecord {
        let called_at: NaiveDateTime = format!("2025-03-03T{time}:00").parse().expect("datetime");
        CallRecord {
            id: 0,
            elder_id: 1,
            setting_id: None,
            called_at,
            responded: status == CallStatus::Completed,
            call_status: status,
            transcript: None,
            sleep_start: None,
            sleep_end: None,
            health_status: None,
            psych_status: None,
            health_details: None,
            psych_details: None,
            ai_health_comment: None,
            extracted_json: None,
            created_at: String::new(),
        }
    }

    fn setting(first: &str, second: &str, third: &str) -> CallSetting {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").expect("time");
        CallSetting {
            id: 1,
            elder_id: 1,
            first_call_time: t(first),
            second_call_time: Some(t(second)),
            third_call_time: Some(t(third)),
            recurrence: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn schedule(name: &str, times: &[DoseTime]) -> MedicationSchedule {
        MedicationSchedule {
            id: 0,
            elder_id: 1,
            name: name.to_string(),
            schedule_times: times.to_vec(),
            created_at: String::new(),
        }
    }

    fn taken_record(name: &str, dose_time: Option<DoseTime>, taken: TakenStatus) -> MedicationTakenRecord {
        MedicationTakenRecord {
            id: 0,
            call_record_id: 0,
            schedule_id: None,
            name: name.to_string(),
            taken,
            dose_time,
            response_summary: None,
            recorded_at: "2025-03-03T10:00:00".parse().expect("datetime"),
        }
    }

    #[test]
    fn test_no_call_setting_counts_every_category() {
        let calls = [call_at("10:00", CallStatus::NoAnswer)];
        let attempted = completed_dose_slots(None, &calls);
        assert_eq!(attempted.len(), 3);
    }

    #[test]
    fn test_only_completed_calls_open_slots() {
        let s = setting("09:00", "12:30", "18:00");
        let calls = [
            call_at("09:10", CallStatus::Completed),
            call_at("12:40", CallStatus::NoAnswer),
            call_at("18:10", CallStatus::Busy),
        ];

        let attempted = completed_dose_slots(Some(&s), &calls);

        assert!(attempted.contains(&DoseTime::Morning));
        assert!(!attempted.contains(&DoseTime::Lunch));
        assert!(!attempted.contains(&DoseTime::Dinner));
    }

    #[test]
    fn test_full_goal_without_call_setting() {
        let schedules = [
            schedule("metformin", &[DoseTime::Morning, DoseTime::Dinner]),
            schedule("lisinopril", &[DoseTime::Morning]),
        ];
        let attempted: BTreeSet<DoseTime> = DoseTime::ALL.into_iter().collect();

        let status = medication_breakdown(&schedules, &attempted, &[]);

        // Every planned dose counts regardless of call outcomes
        assert_eq!(status.total_goal, 3);
        assert_eq!(status.total_taken, 0);
    }

    #[test]
    fn test_unattempted_category_excluded_from_goal_and_taken() {
        let schedules = [schedule("metformin", &[DoseTime::Dinner])];
        // Only the morning slot was completed today
        let attempted: BTreeSet<DoseTime> = [DoseTime::Morning].into_iter().collect();
        let records = [taken_record("metformin", Some(DoseTime::Dinner), TakenStatus::Taken)];

        let status = medication_breakdown(&schedules, &attempted, &records);

        assert_eq!(status.total_goal, 0);
        assert_eq!(status.total_taken, 0);
        assert_eq!(status.list[0].goal, 0);
        assert_eq!(status.list[0].taken, 0);
        // The dose flag still reflects the raw record for the caregiver view
        assert_eq!(status.list[0].doses[0].taken, Some(true));
    }

    #[test]
    fn test_dose_flags_unknown_without_record() {
        let schedules = [schedule("metformin", &[DoseTime::Morning, DoseTime::Dinner])];
        let attempted: BTreeSet<DoseTime> = DoseTime::ALL.into_iter().collect();
        let records = [taken_record("metformin", Some(DoseTime::Morning), TakenStatus::NotTaken)];

        let status = medication_breakdown(&schedules, &attempted, &records);

        assert_eq!(status.total_goal, 2);
        assert_eq!(status.total_taken, 0);
        let info = &status.list[0];
        assert_eq!(info.doses[0], DoseStatus { time: DoseTime::Morning, taken: Some(false) });
        assert_eq!(info.doses[1], DoseStatus { time: DoseTime::Dinner, taken: None });
    }

    #[test]
    fn test_latest_non_null_resolution() {
        let mut a = call_at("09:00", CallStatus::Completed);
        let mut b = call_at("13:00", CallStatus::Completed);
        let mut c = call_at("19:00", CallStatus::Completed);

        // [null, good, null] resolves to good
        b.health_status = Some(ConditionStatus::Good);
        let calls = [a.clone(), b.clone(), c.clone()];
        assert_eq!(
            latest_status(&calls, |r| r.health_status),
            Some(ConditionStatus::Good)
        );

        // [bad, null] resolves to bad
        a.health_status = Some(ConditionStatus::Bad);
        b.health_status = None;
        let calls = [a.clone(), b.clone()];
        assert_eq!(
            latest_status(&calls, |r| r.health_status),
            Some(ConditionStatus::Bad)
        );

        // [null, null] resolves to null
        a.health_status = None;
        c.health_status = None;
        let calls = [a, c];
        assert_eq!(latest_status(&calls, |r| r.health_status), None);
    }

    #[test]
    fn test_sleep_average() {
        let mut a = call_at("09:00", CallStatus::Completed);
        a.sleep_start = Some("2025-03-02T22:00:00".parse().expect("datetime"));
        a.sleep_end = Some("2025-03-03T06:00:00".parse().expect("datetime")); // 480 min
        let mut b = call_at("19:00", CallStatus::Completed);
        b.sleep_start = Some("2025-03-02T21:30:00".parse().expect("datetime"));
        b.sleep_end = Some("2025-03-03T06:00:00".parse().expect("datetime")); // 510 min
        let c = call_at("13:00", CallStatus::Completed);

        assert_eq!(average_sleep_minutes(&[a, b, c]), Some(495));
        assert_eq!(average_sleep_minutes(&[]), None);
    }

    #[test]
    fn test_blood_sugar_average_rounds_half_up() {
        let reading = |value: f64| BloodSugarRecord {
            id: 0,
            call_record_id: 0,
            value,
            measurement_type: None,
            status: None,
            response_summary: None,
            recorded_at: "2025-03-03T10:00:00".parse().expect("datetime"),
        };

        assert_eq!(average_blood_sugar(&[reading(100.0), reading(101.0)]), Some(101));
        assert_eq!(average_blood_sugar(&[]), None);
    }

    #[test]
    fn test_meal_resolution_last_writer_wins() {
        let meal = |meal_type, eaten| MealRecord {
            id: 0,
            call_record_id: 0,
            meal_type,
            eaten,
            response_summary: None,
            recorded_at: "2025-03-03T10:00:00".parse().expect("datetime"),
        };

        let meals = [
            meal(MealType::Breakfast, crate::models::MealEaten::NotEaten),
            meal(MealType::Breakfast, crate::models::MealEaten::Eaten),
            meal(MealType::Lunch, crate::models::MealEaten::Unreported),
        ];

        let (breakfast, lunch, dinner) = resolve_meal_status(&meals);
        assert_eq!(breakfast, Some(true));
        assert_eq!(lunch, None);
        assert_eq!(dinner, None);
    }
}
