//! Care-call health statistics pipeline
//!
//! Turns finished elder-care calls into persisted raw health records and
//! idempotent daily/weekly rollups for the caregiver reporting surface.

pub mod ai;
pub mod build_info;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod stats;
