//! Core SessionStore implementation

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Unique identifier for a session
pub type SessionId = String;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation message
///
/// Messages are immutable once appended. The attachment carries structured
/// payloads (study plan, tool result) as raw JSON so the store stays free of
/// domain types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<serde_json::Value>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            attachment: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            attachment: None,
        }
    }

    /// Attach a structured payload to this message
    pub fn with_attachment(mut self, attachment: serde_json::Value) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Session metadata, stored as `meta.json` in the session directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: SessionId,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
}

/// A session with its full ordered message history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub created_at: i64,
    pub messages: Vec<Message>,
}

/// Summary entry for history listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub first_message: String,
    pub created_at: i64,
}

/// The durable session store
///
/// One directory per session under the base path, holding `meta.json` and an
/// append-only `messages.jsonl`. Appends go through a single buffered write
/// and flush, so a multi-message append lands whole or not at all.
pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    /// Open or create a session store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened session store");
        Ok(Self { base_path })
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_path.join(session_id)
    }

    fn messages_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("messages.jsonl")
    }

    fn meta_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("meta.json")
    }

    /// Create a new empty session and return its id
    pub fn create(&self) -> Result<SessionId, StoreError> {
        let session_id = Uuid::now_v7().to_string();
        let dir = self.session_dir(&session_id);
        fs::create_dir_all(&dir)?;

        let meta = SessionMeta {
            session_id: session_id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        fs::write(self.meta_file(&session_id), serde_json::to_string_pretty(&meta)?)?;

        info!(%session_id, "Created session");
        Ok(session_id)
    }

    /// Check whether a session exists
    pub fn exists(&self, session_id: &str) -> bool {
        self.meta_file(session_id).exists()
    }

    /// Load a session with its full message history
    pub fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        let meta = self.read_meta(session_id)?;
        let messages = self.read_messages(session_id)?;

        Ok(Session {
            session_id: meta.session_id,
            created_at: meta.created_at,
            messages,
        })
    }

    /// Append a single message to a session
    pub fn append(&self, session_id: &str, message: &Message) -> Result<(), StoreError> {
        self.append_many(session_id, std::slice::from_ref(message))
    }

    /// Append several messages in one write
    ///
    /// All lines are serialized into one buffer and written with a single
    /// write + flush. Callers use this for the user/assistant pair of a turn
    /// so the pair lands both-or-neither.
    pub fn append_many(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        if !self.exists(session_id) {
            return Err(StoreError::NotFound {
                session_id: session_id.to_string(),
            });
        }

        let mut buf = String::new();
        for message in messages {
            buf.push_str(&serde_json::to_string(message)?);
            buf.push('\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.messages_file(session_id))?;
        file.write_all(buf.as_bytes())?;
        file.flush()?;

        debug!(%session_id, count = messages.len(), "Appended messages");
        Ok(())
    }

    /// Get the ordered message history for a session
    pub fn history(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        if !self.exists(session_id) {
            return Err(StoreError::NotFound {
                session_id: session_id.to_string(),
            });
        }
        self.read_messages(session_id)
    }

    /// List summaries of all sessions that have at least one user message
    ///
    /// The summary text is the content of the first user-role message.
    /// Sessions without one are created-but-unused and are excluded.
    /// Sorted newest first.
    pub fn list_summaries(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(session_id) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            let Ok(meta) = self.read_meta(&session_id) else {
                debug!(%session_id, "Skipping directory without meta.json");
                continue;
            };

            let messages = self.read_messages(&session_id)?;
            let first_user = messages.iter().find(|m| m.role == Role::User);

            if let Some(msg) = first_user {
                summaries.push(SessionSummary {
                    session_id,
                    first_message: msg.content.clone(),
                    created_at: meta.created_at,
                });
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn read_meta(&self, session_id: &str) -> Result<SessionMeta, StoreError> {
        let path = self.meta_file(session_id);
        if !path.exists() {
            return Err(StoreError::NotFound {
                session_id: session_id.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn read_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.messages_file(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let messages = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<Message>, _>>()?;
        Ok(messages)
    }
}
