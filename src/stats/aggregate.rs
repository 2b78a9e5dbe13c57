//! Weekly aggregation
//!
//! Pure rollup of one week of data into a `WeeklyStatsAggregate` value.
//! No storage access and no side effects; safe to call concurrently.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    BloodSugarRecord, BloodSugarStatus, BloodSugarWeeklyStats, CallRecord, ConditionStatus,
    DailyStatistics, MeasurementType, MedicationWeeklyStats,
};

/// One week of rolled-up health statistics
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyStatsAggregate {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub breakfast_count: i64,
    pub lunch_count: i64,
    pub dinner_count: i64,
    /// Three meals per day that produced a daily row; weeks with partial
    /// data get a proportionally smaller denominator, never a fixed 21.
    pub meal_goal_count: i64,
    pub meal_rate: i64,
    pub medication_taken_count: i64,
    pub medication_goal_count: i64,
    pub medication_scheduled_count: i64,
    pub medication_rate: i64,
    pub medication_by_name: BTreeMap<String, MedicationWeeklyStats>,
    pub avg_sleep_minutes: Option<i64>,
    pub psych_good_count: i64,
    pub psych_normal_count: i64,
    pub psych_bad_count: i64,
    pub health_signals: i64,
    pub missed_calls: i64,
    pub blood_sugar: BloodSugarWeeklyStats,
}

/// Roll one week of daily rows and raw records into an aggregate.
///
/// `daily_stats` holds only the days that produced a row; days without a
/// qualifying call are absent and excluded from every denominator.
pub fn aggregate_week(
    start_date: NaiveDate,
    end_date: NaiveDate,
    daily_stats: &[DailyStatistics],
    blood_sugar_records: &[BloodSugarRecord],
    call_records: &[CallRecord],
) -> WeeklyStatsAggregate {
    // Meals
    let breakfast_count = count_eaten(daily_stats, |d| d.breakfast_eaten);
    let lunch_count = count_eaten(daily_stats, |d| d.lunch_eaten);
    let dinner_count = count_eaten(daily_stats, |d| d.dinner_eaten);
    let meal_goal_count = daily_stats.len() as i64 * 3;
    let meal_rate = rate(breakfast_count + lunch_count + dinner_count, meal_goal_count);

    // Medication
    let mut medication_by_name: BTreeMap<String, MedicationWeeklyStats> = BTreeMap::new();
    let mut medication_taken_count = 0;
    let mut medication_goal_count = 0;
    let mut medication_scheduled_count = 0;

    for day in daily_stats {
        medication_taken_count += day.medication_total_taken;
        medication_goal_count += day.medication_total_goal;

        for info in &day.medication_list {
            medication_scheduled_count += info.scheduled;
            let entry = medication_by_name.entry(info.name.clone()).or_default();
            entry.taken += info.taken;
            entry.goal += info.goal;
            entry.scheduled += info.scheduled;
        }
    }

    let medication_rate = rate(medication_taken_count, medication_goal_count);

    // Sleep: mean over days that resolved a sleep figure
    let sleep_minutes: Vec<i64> = daily_stats
        .iter()
        .filter_map(|d| d.avg_sleep_minutes)
        .collect();
    let avg_sleep_minutes = if sleep_minutes.is_empty() {
        None
    } else {
        Some(sleep_minutes.iter().sum::<i64>() / sleep_minutes.len() as i64)
    };

    // Mood: days whose resolved status was good or bad. The normal bucket
    // is reserved for a future third category and stays 0 from this path.
    let psych_good_count = daily_stats
        .iter()
        .filter(|d| d.psych_status == Some(ConditionStatus::Good))
        .count() as i64;
    let psych_bad_count = daily_stats
        .iter()
        .filter(|d| d.psych_status == Some(ConditionStatus::Bad))
        .count() as i64;

    // Health signals: raw calls that carried any health detail text
    let health_signals = call_records
        .iter()
        .filter(|r| {
            r.health_details
                .as_deref()
                .map_or(false, |d| !d.trim().is_empty())
        })
        .count() as i64;

    // Missed calls: terminal status exactly no-answer
    let missed_calls = call_records
        .iter()
        .filter(|r| r.call_status.is_missed())
        .count() as i64;

    WeeklyStatsAggregate {
        start_date,
        end_date,
        breakfast_count,
        lunch_count,
        dinner_count,
        meal_goal_count,
        meal_rate,
        medication_taken_count,
        medication_goal_count,
        medication_scheduled_count,
        medication_rate,
        medication_by_name,
        avg_sleep_minutes,
        psych_good_count,
        psych_normal_count: 0,
        psych_bad_count,
        health_signals,
        missed_calls,
        blood_sugar: bucket_blood_sugar(blood_sugar_records),
    }
}

fn count_eaten(daily_stats: &[DailyStatistics], field: impl Fn(&DailyStatistics) -> Option<bool>) -> i64 {
    daily_stats.iter().filter(|d| field(d) == Some(true)).count() as i64
}

fn rate(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        0
    } else {
        (numerator as f64 / denominator as f64 * 100.0).round() as i64
    }
}

/// Bucket raw readings by (measurement relation x status). Readings with
/// an unknown relation or status are skipped.
fn bucket_blood_sugar(records: &[BloodSugarRecord]) -> BloodSugarWeeklyStats {
    let mut stats = BloodSugarWeeklyStats::default();

    for record in records {
        let bucket = match record.measurement_type {
            Some(MeasurementType::BeforeMeal) => &mut stats.before_meal,
            Some(MeasurementType::AfterMeal) => &mut stats.after_meal,
            None => continue,
        };
        match record.status {
            Some(BloodSugarStatus::Normal) => bucket.normal += 1,
            Some(BloodSugarStatus::High) => bucket.high += 1,
            Some(BloodSugarStatus::Low) => bucket.low += 1,
            None => {}
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use crate::models::CallStatus;

    fn day(date: &str) -> DailyStatistics {
        DailyStatistics {
            id: 0,
            elder_id: 1,
            date: date.parse().expect("date"),
            breakfast_eaten: None,
            lunch_eaten: None,
            dinner_eaten: None,
            medication_total_goal: 0,
            medication_total_taken: 0,
            medication_list: Vec::new(),
            avg_sleep_minutes: None,
            health_status: None,
            psych_status: None,
            avg_blood_sugar: None,
            ai_summary: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn call(status: CallStatus, health_details: Option<&str>) -> CallRecord {
        let called_at: NaiveDateTime = "2025-03-03T10:00:00".parse().expect("datetime");
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
            health_details: health_details.map(String::from),
            psych_details: None,
            ai_health_comment: None,
            extracted_json: None,
            created_at: String::new(),
        }
    }

    fn reading(mt: Option<MeasurementType>, status: Option<BloodSugarStatus>) -> BloodSugarRecord {
        BloodSugarRecord {
            id: 0,
            call_record_id: 0,
            value: 100.0,
            measurement_type: mt,
            status,
            response_summary: None,
            recorded_at: "2025-03-03T10:00:00".parse().expect("datetime"),
        }
    }

    fn week_bounds() -> (NaiveDate, NaiveDate) {
        ("2025-03-03".parse().expect("date"), "2025-03-09".parse().expect("date"))
    }

    #[test]
    fn test_meal_goal_scales_with_days_present() {
        let (start, end) = week_bounds();
        let mut d1 = day("2025-03-03");
        d1.breakfast_eaten = Some(true);
        d1.lunch_eaten = Some(false);
        let d2 = day("2025-03-04");
        let mut d3 = day("2025-03-05");
        d3.dinner_eaten = Some(true);

        let agg = aggregate_week(start, end, &[d1, d2, d3], &[], &[]);

        // 3 daily rows => goal is 9, not a fixed 21
        assert_eq!(agg.meal_goal_count, 9);
        assert_eq!(agg.breakfast_count, 1);
        assert_eq!(agg.lunch_count, 0);
        assert_eq!(agg.dinner_count, 1);
        assert_eq!(agg.meal_rate, 22); // 2/9 rounded
    }

    #[test]
    fn test_blood_sugar_bucketing_skips_unknowns() {
        let (start, end) = week_bounds();
        let records = vec![
            reading(Some(MeasurementType::BeforeMeal), Some(BloodSugarStatus::Normal)),
            reading(Some(MeasurementType::BeforeMeal), Some(BloodSugarStatus::High)),
            reading(Some(MeasurementType::AfterMeal), Some(BloodSugarStatus::Normal)),
            reading(Some(MeasurementType::AfterMeal), Some(BloodSugarStatus::Low)),
            reading(Some(MeasurementType::BeforeMeal), None),
        ];

        let agg = aggregate_week(start, end, &[], &records, &[]);

        assert_eq!(agg.blood_sugar.before_meal.normal, 1);
        assert_eq!(agg.blood_sugar.before_meal.high, 1);
        assert_eq!(agg.blood_sugar.before_meal.low, 0);
        assert_eq!(agg.blood_sugar.after_meal.normal, 1);
        assert_eq!(agg.blood_sugar.after_meal.high, 0);
        assert_eq!(agg.blood_sugar.after_meal.low, 1);
    }

    #[test]
    fn test_missed_calls_count_only_no_answer() {
        let (start, end) = week_bounds();
        let calls = vec![
            call(CallStatus::Completed, None),
            call(CallStatus::NoAnswer, None),
            call(CallStatus::NoAnswer, None),
            call(CallStatus::Busy, None),
            call(CallStatus::Failed, None),
        ];

        let agg = aggregate_week(start, end, &[], &[], &calls);
        assert_eq!(agg.missed_calls, 2);
    }

    #[test]
    fn test_health_signals_require_non_blank_details() {
        let (start, end) = week_bounds();
        let calls = vec![
            call(CallStatus::Completed, Some("dizzy in the morning")),
            call(CallStatus::Completed, Some("   ")),
            call(CallStatus::Completed, None),
        ];

        let agg = aggregate_week(start, end, &[], &[], &calls);
        assert_eq!(agg.health_signals, 1);
    }

    #[test]
    fn test_sleep_average_ignores_days_without_signal() {
        let (start, end) = week_bounds();
        let mut d1 = day("2025-03-03");
        d1.avg_sleep_minutes = Some(480);
        let d2 = day("2025-03-04");
        let mut d3 = day("2025-03-05");
        d3.avg_sleep_minutes = Some(510);

        let agg = aggregate_week(start, end, &[d1, d2, d3], &[], &[]);
        assert_eq!(agg.avg_sleep_minutes, Some(495));
    }

    #[test]
    fn test_medication_breakdowns_merge_by_name() {
        let (start, end) = week_bounds();
        let mut d1 = day("2025-03-03");
        d1.medication_total_goal = 2;
        d1.medication_total_taken = 1;
        d1.medication_list = vec![crate::models::MedicationInfo {
            name: "metformin".to_string(),
            scheduled: 2,
            goal: 2,
            taken: 1,
            doses: Vec::new(),
        }];
        let mut d2 = day("2025-03-04");
        d2.medication_total_goal = 2;
        d2.medication_total_taken = 2;
        d2.medication_list = vec![crate::models::MedicationInfo {
            name: "metformin".to_string(),
            scheduled: 2,
            goal: 2,
            taken: 2,
            doses: Vec::new(),
        }];

        let agg = aggregate_week(start, end, &[d1, d2], &[], &[]);

        assert_eq!(agg.medication_taken_count, 3);
        assert_eq!(agg.medication_goal_count, 4);
        assert_eq!(agg.medication_rate, 75);
        let merged = &agg.medication_by_name["metformin"];
        assert_eq!(merged.taken, 3);
        assert_eq!(merged.goal, 4);
        assert_eq!(merged.scheduled, 4);
    }

    #[test]
    fn test_mood_counts_from_daily_rows() {
        let (start, end) = week_bounds();
        let mut d1 = day("2025-03-03");
        d1.psych_status = Some(ConditionStatus::Good);
        let mut d2 = day("2025-03-04");
        d2.psych_status = Some(ConditionStatus::Bad);
        let mut d3 = day("2025-03-05");
        d3.psych_status = Some(ConditionStatus::Good);
        let d4 = day("2025-03-06");

        let agg = aggregate_week(start, end, &[d1, d2, d3, d4], &[], &[]);

        assert_eq!(agg.psych_good_count, 2);
        assert_eq!(agg.psych_bad_count, 1);
        assert_eq!(agg.psych_normal_count, 0);
    }
}
