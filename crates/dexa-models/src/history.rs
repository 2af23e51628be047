use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// Schema of the per-session chat log.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS chat_history (
///     id          INTEGER PRIMARY KEY AUTOINCREMENT,
///     session_id  TEXT NOT NULL,
///     role        TEXT NOT NULL,
///     content     TEXT NOT NULL,
///     created_at  TEXT NOT NULL
/// );
///
/// CREATE INDEX IF NOT EXISTS idx_history_session ON chat_history(session_id, id);
/// ```
pub const HISTORY_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS chat_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_session ON chat_history(session_id, id);
";

/// One persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(session_id: &str, message: &Message) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}
