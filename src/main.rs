//! CareCall statistics pipeline service
//!
//! Consumes call-finished payloads from stdin (one JSON object per line,
//! as delivered by the outbound call provider's webhook relay), persists
//! the call record, and drives the analysis + rollup pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod ai;
mod build_info;
mod db;
mod models;
mod pipeline;
mod stats;

use ai::{
    ChatClient, HealthDataExtractor, NoopExtractor, NoopSummaryGenerator, OpenAiHealthExtractor,
    OpenAiSummaryGenerator, SummaryGenerator,
};
use models::{CallRecord, CallRecordCreate, CallStatus};
use pipeline::{CallCompletionCoordinator, Dispatcher, EventBus, HealthEvent};
use stats::StatisticsUpdater;

/// One call-finished payload from the call provider
#[derive(Debug, Deserialize)]
struct CallFinishedPayload {
    elder_id: i64,
    #[serde(default)]
    setting_id: Option<i64>,
    called_at: NaiveDateTime,
    call_status: String,
    #[serde(default)]
    transcript: Option<String>,
}

/// Get the database path from environment or use default
fn get_database_path() -> PathBuf {
    std::env::var("CARECALL_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            path.push("carecall.db");
            path
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (stderr; stdout is reserved for the ingest loop's peer)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("carecall=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();

    // Get database path
    let db_path = get_database_path();
    eprintln!("Database path: {}", db_path.display());

    // Ensure data directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    let database = db::Database::new(&db_path)?;

    // Run migrations
    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    // AI providers; without an API key the pipeline still runs, storing
    // empty extractions and fallback summary text
    let (extractor, summaries): (Arc<dyn HealthDataExtractor>, Arc<dyn SummaryGenerator>) =
        match ChatClient::from_env() {
            Some(client) => (
                Arc::new(OpenAiHealthExtractor::new(client.clone())),
                Arc::new(OpenAiSummaryGenerator::new(client)),
            ),
            None => {
                warn!("OPENAI_API_KEY not set, extraction and summaries are disabled");
                (Arc::new(NoopExtractor), Arc::new(NoopSummaryGenerator))
            }
        };

    // Wire the pipeline: bus -> coordinator -> statistics
    let (bus, rx) = EventBus::channel();
    let coordinator =
        CallCompletionCoordinator::new(database.clone(), extractor, summaries.clone(), bus.clone());
    let statistics = StatisticsUpdater::new(database.clone(), summaries);
    let dispatcher = Dispatcher::new(coordinator, statistics);
    let dispatcher_handle = tokio::spawn(dispatcher.run(rx));

    info!("listening for call-finished payloads on stdin");

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let payload: CallFinishedPayload = match serde_json::from_str(&line) {
            Ok(payload) => payload,
            Err(e) => {
                error!("unparseable call-finished payload: {e}");
                continue;
            }
        };

        let status = CallStatus::from_str(&payload.call_status);
        let create = CallRecordCreate {
            elder_id: payload.elder_id,
            setting_id: payload.setting_id,
            called_at: payload.called_at,
            responded: status.is_completed(),
            call_status: status,
            transcript: payload.transcript,
        };

        match database.with_conn(|conn| CallRecord::create(conn, &create)) {
            Ok(record) => {
                bus.publish(HealthEvent::CallFinished { record_id: record.id });
            }
            Err(e) => {
                error!(elder_id = payload.elder_id, "failed to persist call record: {e}");
            }
        }
    }

    // stdin closed: give the dispatcher a moment to drain, then stop.
    // (It holds its own bus clone, so the channel never closes on its own.)
    info!("stdin closed, shutting down");
    tokio::task::yield_now().await;
    dispatcher_handle.abort();

    Ok(())
}
