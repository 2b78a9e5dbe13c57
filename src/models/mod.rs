//! Data models
//!
//! Rust structs representing database entities.

mod blood_sugar;
mod call_record;
mod call_setting;
mod daily_statistics;
mod elder;
mod meal_record;
mod medication_schedule;
mod medication_taken;
mod weekly_statistics;

pub use blood_sugar::{
    BloodSugarRecord, BloodSugarRecordCreate, BloodSugarStatus, MeasurementType,
};
pub use call_record::{
    CallAnalysisUpdate, CallRecord, CallRecordCreate, CallStatus, ConditionStatus,
};
pub use call_setting::{CallSetting, CallSettingCreate};
pub use daily_statistics::{DailyStatistics, DailyStatisticsUpsert, DoseStatus, MedicationInfo};
pub use elder::Elder;
pub use meal_record::{MealEaten, MealRecord, MealRecordCreate, MealType};
pub use medication_schedule::{DoseTime, MedicationSchedule, MedicationScheduleCreate};
pub use medication_taken::{MedicationTakenRecord, MedicationTakenRecordCreate, TakenStatus};
pub use weekly_statistics::{
    BloodSugarTypeStats, BloodSugarWeeklyStats, MedicationWeeklyStats, WeeklyStatistics,
    WeeklyStatisticsUpsert,
};

/// Build a rusqlite conversion error for an unparseable column value
pub(crate) fn column_parse_err(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("invalid {column}: {value}").into(),
    )
}
