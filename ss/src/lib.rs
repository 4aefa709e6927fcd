//! SessionStore - durable per-session conversation store
//!
//! Persists chat sessions for the study assistant. Each session is a
//! directory with immutable, append-only message history that survives
//! process restarts.
//!
//! # Architecture
//!
//! ```text
//! sessions/
//! └── {session_id}/
//!     ├── meta.json        # session metadata
//!     └── messages.jsonl   # ordered messages, one JSON object per line
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::{Message, SessionStore};
//!
//! let store = SessionStore::open("sessions")?;
//! let id = store.create()?;
//! store.append_many(&id, &[Message::user("hi"), Message::assistant("hello")])?;
//! let session = store.get(&id)?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{Message, Role, Session, SessionId, SessionMeta, SessionStore, SessionSummary, StoreError};
