//! External AI provider boundary
//!
//! Chat-completions transport plus the two provider contracts the
//! pipeline consumes: structured health-data extraction and short
//! summary generation. Provider failures never propagate past this
//! module; extraction degrades to an all-absent response and summaries
//! degrade to fixed fallback strings.

pub mod client;
pub mod extraction;
pub mod summary;

pub use client::{AiError, ChatClient};
pub use extraction::{
    ExtractionRequest, HealthDataExtraction, HealthDataExtractor, NoopExtractor,
    OpenAiHealthExtractor,
};
pub use summary::{
    DailySummaryFacts, NoopSummaryGenerator, OpenAiSummaryGenerator, SummaryGenerator,
    DAILY_SUMMARY_FALLBACK, WEEKLY_SUMMARY_FALLBACK,
};
