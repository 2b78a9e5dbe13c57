//! Summary generation provider
//!
//! Produces the caregiver-facing prose attached to the rollups: a short
//! daily summary, a longer weekly narrative, and a one-line symptom
//! comment. All prompts are built from pre-computed facts; raw
//! transcripts never reach this provider.

use async_trait::async_trait;
use tracing::warn;

use crate::models::ConditionStatus;
use crate::stats::aggregate::WeeklyStatsAggregate;
use super::client::ChatClient;

/// Fixed text stored when the daily summary call fails
pub const DAILY_SUMMARY_FALLBACK: &str = "The daily summary could not be generated.";
/// Fixed text stored when the weekly narrative call fails
pub const WEEKLY_SUMMARY_FALLBACK: &str = "The weekly health summary could not be generated.";

/// Pre-computed facts for the daily summary prompt
#[derive(Debug, Clone, Default)]
pub struct DailySummaryFacts {
    pub breakfast: Option<bool>,
    pub lunch: Option<bool>,
    pub dinner: Option<bool>,
    pub medication_total_taken: i64,
    pub medication_total_goal: i64,
    pub sleep_hours: Option<i64>,
    pub sleep_minutes: Option<i64>,
    pub avg_blood_sugar: Option<i64>,
    pub health_status: Option<ConditionStatus>,
    pub psych_status: Option<ConditionStatus>,
}

/// Text-generation provider contract
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Short daily summary for the caregiver home view
    async fn daily_summary(&self, facts: &DailySummaryFacts) -> String;

    /// Longer weekly narrative for the report view
    async fn weekly_summary(&self, aggregate: &WeeklyStatsAggregate) -> String;

    /// One-line analytical comment on reported symptoms; None when there
    /// is nothing to comment on or the provider is unavailable
    async fn symptom_comment(&self, signs: &[String]) -> Option<String>;
}

/// Summary generation through an OpenAI-compatible chat model
pub struct OpenAiSummaryGenerator {
    client: ChatClient,
}

impl OpenAiSummaryGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    fn meal_fact(name: &str, eaten: Option<bool>) -> String {
        match eaten {
            Some(true) => format!("{name}: eaten"),
            Some(false) => format!("{name}: skipped"),
            None => format!("{name}: not reported"),
        }
    }

    fn daily_prompt(facts: &DailySummaryFacts) -> String {
        let mut lines = vec![
            Self::meal_fact("breakfast", facts.breakfast),
            Self::meal_fact("lunch", facts.lunch),
            Self::meal_fact("dinner", facts.dinner),
            format!(
                "medication: {} of {} doses taken",
                facts.medication_total_taken, facts.medication_total_goal
            ),
        ];
        if let (Some(h), Some(m)) = (facts.sleep_hours, facts.sleep_minutes) {
            lines.push(format!("sleep: {h}h {m}m"));
        }
        if let Some(bs) = facts.avg_blood_sugar {
            lines.push(format!("average blood sugar: {bs} mg/dL"));
        }
        if let Some(status) = facts.health_status {
            lines.push(format!("physical condition: {}", status.as_str()));
        }
        if let Some(status) = facts.psych_status {
            lines.push(format!("mood: {}", status.as_str()));
        }

        format!(
            "Write a warm two-sentence summary of an elder's day for their \
caregiver, based only on these facts:\n{}",
            lines.join("\n")
        )
    }

    fn weekly_prompt(aggregate: &WeeklyStatsAggregate) -> String {
        let sleep = match aggregate.avg_sleep_minutes {
            Some(m) => format!("{}h {}m", m / 60, m % 60),
            None => "not reported".to_string(),
        };

        format!(
            "Write a short weekly health report (4-6 sentences) for an elder's \
caregiver, based only on these facts for {start} to {end}:\n\
meals eaten: {meals} of {meal_goal}\n\
medication doses taken: {taken} of {goal}\n\
average sleep: {sleep}\n\
good mood days: {good}, bad mood days: {bad}\n\
health signals reported: {signals}\n\
missed calls: {missed}\n\
blood sugar before meals (normal/high/low): {bn}/{bh}/{bl}\n\
blood sugar after meals (normal/high/low): {an}/{ah}/{al}",
            start = aggregate.start_date,
            end = aggregate.end_date,
            meals = aggregate.breakfast_count + aggregate.lunch_count + aggregate.dinner_count,
            meal_goal = aggregate.meal_goal_count,
            taken = aggregate.medication_taken_count,
            goal = aggregate.medication_goal_count,
            sleep = sleep,
            good = aggregate.psych_good_count,
            bad = aggregate.psych_bad_count,
            signals = aggregate.health_signals,
            missed = aggregate.missed_calls,
            bn = aggregate.blood_sugar.before_meal.normal,
            bh = aggregate.blood_sugar.before_meal.high,
            bl = aggregate.blood_sugar.before_meal.low,
            an = aggregate.blood_sugar.after_meal.normal,
            ah = aggregate.blood_sugar.after_meal.high,
            al = aggregate.blood_sugar.after_meal.low,
        )
    }
}

#[async_trait]
impl SummaryGenerator for OpenAiSummaryGenerator {
    async fn daily_summary(&self, facts: &DailySummaryFacts) -> String {
        let system = "You summarize elder-care check-in data for family caregivers. \
Be concise and factual; never invent information.";

        match self.client.chat(system, &Self::daily_prompt(facts), 0.3).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("daily summary call failed, using fallback: {e}");
                DAILY_SUMMARY_FALLBACK.to_string()
            }
        }
    }

    async fn weekly_summary(&self, aggregate: &WeeklyStatsAggregate) -> String {
        let system = "You write weekly elder-care reports for family caregivers. \
Be concise and factual; never invent information.";

        match self
            .client
            .chat(system, &Self::weekly_prompt(aggregate), 0.7)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!("weekly summary call failed, using fallback: {e}");
                WEEKLY_SUMMARY_FALLBACK.to_string()
            }
        }
    }

    async fn symptom_comment(&self, signs: &[String]) -> Option<String> {
        if signs.is_empty() {
            return None;
        }

        let system = "You are a careful health assistant. Comment briefly on \
reported symptoms for a caregiver; never diagnose.";
        let prompt = format!(
            "Reported symptoms: {}. Write one short sentence a caregiver should know.",
            signs.join(", ")
        );

        match self.client.chat(system, &prompt, 0.5).await {
            Ok(comment) => Some(comment),
            Err(e) => {
                warn!("symptom comment call failed, skipping: {e}");
                None
            }
        }
    }
}

/// Generator used when no provider is configured; always answers with the
/// fixed fallback text
pub struct NoopSummaryGenerator;

#[async_trait]
impl SummaryGenerator for NoopSummaryGenerator {
    async fn daily_summary(&self, _facts: &DailySummaryFacts) -> String {
        DAILY_SUMMARY_FALLBACK.to_string()
    }

    async fn weekly_summary(&self, _aggregate: &WeeklyStatsAggregate) -> String {
        WEEKLY_SUMMARY_FALLBACK.to_string()
    }

    async fn symptom_comment(&self, _signs: &[String]) -> Option<String> {
        None
    }
}
