//! Turn-level error types
//!
//! Only errors that abort a turn live here. The rest of the taxonomy
//! degrades inside the pipeline instead of propagating: model failures
//! ([`crate::llm::LlmError`]) become apologetic assistant messages or a
//! default intent, tool failures are captured in
//! [`crate::tools::ToolResult::error`], and unparsable model output
//! triggers the conservative fallbacks in the planner and refiner.

use thiserror::Error;

/// Errors that abort a turn before it is persisted
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Session store error: {0}")]
    Store(#[from] sessionstore::StoreError),
}
