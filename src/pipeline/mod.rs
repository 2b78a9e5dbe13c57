//! Call analysis pipeline
//!
//! The event-driven sequence that turns a finished call into persisted
//! raw health records: event bus, call-completion coordinator, and the
//! analysis result persister.

pub mod coordinator;
pub mod events;
pub mod persister;

pub use coordinator::{CallCompletionCoordinator, PipelineError};
pub use events::{Dispatcher, EventBus, HealthEvent};
pub use persister::{AnalysisResultPersister, ProcessingError, MEAL_STATUS_UNKNOWN_MESSAGE};
