//! Health data extraction provider
//!
//! Turns a call transcript into a structured health-data object. Every
//! field of the response is optional; a timeout, transport error,
//! malformed JSON body or empty choice list all normalize to the same
//! all-absent response, which downstream code treats as "nothing
//! extracted", never as an error.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::{strip_code_fences, ChatClient};

const SYSTEM_MESSAGE: &str = "You are an expert at extracting health data from \
care-call transcripts. Extract the requested health information from the \
transcript and answer with JSON only.";

/// Request handed to the extraction provider
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub transcript: String,
    pub call_date: NaiveDate,
    /// Medication names known for the elder, to anchor medication mentions
    pub medication_names: Vec<String>,
}

/// Structured extraction result; any field may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthDataExtraction {
    pub date: Option<String>,
    pub meal_data: Option<Vec<MealData>>,
    pub sleep_data: Option<SleepData>,
    pub psychological_state: Option<Vec<String>>,
    pub psychological_status: Option<String>,
    pub blood_sugar_data: Option<Vec<BloodSugarData>>,
    pub medication_data: Option<Vec<MedicationData>>,
    pub health_signs: Option<Vec<String>>,
    pub health_status: Option<String>,
}

/// One meal mention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealData {
    pub meal_type: Option<String>,
    pub meal_eaten_status: Option<String>,
    pub meal_summary: Option<String>,
}

/// Sleep window as HH:MM clock times
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SleepData {
    pub sleep_start_time: Option<String>,
    pub sleep_end_time: Option<String>,
    pub total_sleep_time: Option<String>,
}

/// One blood-sugar reading mention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BloodSugarData {
    pub measurement_time: Option<String>,
    pub meal_time: Option<String>,
    pub blood_sugar_value: Option<f64>,
    pub status: Option<String>,
}

/// One dose-taken mention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationData {
    pub medication_type: Option<String>,
    pub taken: Option<String>,
    pub taken_time: Option<String>,
}

impl HealthDataExtraction {
    /// The all-absent response every provider failure normalizes to
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extraction provider contract
#[async_trait]
pub trait HealthDataExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> HealthDataExtraction;
}

/// Extraction through an OpenAI-compatible chat model
pub struct OpenAiHealthExtractor {
    client: ChatClient,
}

impl OpenAiHealthExtractor {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    fn build_prompt(request: &ExtractionRequest) -> String {
        format!(
            r#"Extract health data from the following care-call transcript and answer with JSON.

Call date: {date}
Known medications for this elder: {medications}
Transcript:
{transcript}

Extract the following; use null for anything the transcript does not state:

1. The date being discussed
2. Meal data: meal type (아침/점심/저녁), whether it was eaten (answer exactly "섭취함" or "섭취하지 않음"), and a one-line summary
3. Sleep data: bed time and wake time in HH:MM, and total sleep duration
4. Psychological state: short detail sentences, plus a one-word summary (좋음/나쁨)
5. Blood sugar readings: measurement time, 식전/식후, value in mg/dL, and status (LOW/NORMAL/HIGH)
6. Medication data: medication name, whether it was taken (answer exactly "복용함" or "복용하지 않음"), and the take time (아침/점심/저녁)
7. Health signs: short detail sentences, plus a one-word summary (좋음/나쁨)

If several readings or medications are mentioned, emit one array element each; never merge them into one field.

Answer with exactly this JSON structure:
{{
  "date": "...",
  "mealData": [{{"mealType": "아침", "mealEatenStatus": "섭취함", "mealSummary": "..."}}],
  "sleepData": {{"sleepStartTime": "22:00", "sleepEndTime": "06:00", "totalSleepTime": "8시간"}},
  "psychologicalState": ["..."],
  "psychologicalStatus": "좋음",
  "bloodSugarData": [{{"measurementTime": "아침", "mealTime": "식전", "bloodSugarValue": 120, "status": "NORMAL"}}],
  "medicationData": [{{"medicationType": "...", "taken": "복용함", "takenTime": "저녁"}}],
  "healthSigns": ["..."],
  "healthStatus": "좋음"
}}"#,
            date = request.call_date,
            medications = request.medication_names.join(", "),
            transcript = request.transcript,
        )
    }
}

#[async_trait]
impl HealthDataExtractor for OpenAiHealthExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> HealthDataExtraction {
        let prompt = Self::build_prompt(request);

        let content = match self.client.chat(SYSTEM_MESSAGE, &prompt, 0.1).await {
            Ok(content) => content,
            Err(e) => {
                warn!("health data extraction call failed, treating as empty: {e}");
                return HealthDataExtraction::empty();
            }
        };

        match serde_json::from_str(strip_code_fences(&content)) {
            Ok(extraction) => {
                info!("health data extraction parsed");
                extraction
            }
            Err(e) => {
                warn!("health data extraction returned malformed JSON, treating as empty: {e}");
                HealthDataExtraction::empty()
            }
        }
    }
}

/// Extractor used when no provider is configured; always answers empty
pub struct NoopExtractor;

#[async_trait]
impl HealthDataExtractor for NoopExtractor {
    async fn extract(&self, _request: &ExtractionRequest) -> HealthDataExtraction {
        HealthDataExtraction::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_response_parses_with_absent_fields() {
        let json = r#"{"mealData": [{"mealType": "아침", "mealEatenStatus": "섭취함"}]}"#;
        let parsed: HealthDataExtraction = serde_json::from_str(json).expect("parse");

        let meals = parsed.meal_data.expect("meals");
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].meal_type.as_deref(), Some("아침"));
        assert_eq!(meals[0].meal_summary, None);
        assert!(parsed.sleep_data.is_none());
        assert!(parsed.medication_data.is_none());
    }

    #[test]
    fn test_empty_object_is_empty() {
        let parsed: HealthDataExtraction = serde_json::from_str("{}").expect("parse");
        assert!(parsed.is_empty());
        assert_eq!(parsed, HealthDataExtraction::empty());
    }
}
