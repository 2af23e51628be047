use std::sync::Mutex;

use dexa_models::config::HistoryConfig;
use dexa_models::history::HistoryEntry;
use dexa_models::message::Message;
use tokio::sync::OwnedMutexGuard;

use crate::error::HistoryError;
use crate::locks::SessionLocks;
use crate::sqlite::SqliteHistory;

/// Session-scoped chat history: SQLite log plus per-session locks.
///
/// A turn calls [`HistoryStore::begin`], reads the transcript, runs the
/// agent, then records the new messages. The session lock is held for the
/// whole span so concurrent turns of one session serialize.
///
/// SQLite access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct HistoryStore {
    sqlite: Mutex<SqliteHistory>,
    locks: SessionLocks,
    retention: usize,
}

impl HistoryStore {
    pub fn new(sqlite: SqliteHistory, locks: SessionLocks, retention: usize) -> Self {
        Self {
            sqlite: Mutex::new(sqlite),
            locks,
            retention,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Result<Self, HistoryError> {
        if let Some(parent) = std::path::Path::new(&config.sqlite_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    HistoryError::Unavailable(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let sqlite = SqliteHistory::open(&config.sqlite_path)?;
        Ok(Self::new(sqlite, SessionLocks::new(), config.retention))
    }

    /// Acquire the session lock. Waits while another turn of the same session runs.
    pub async fn begin(&self, session_id: &str) -> SessionHandle<'_> {
        let guard = self.locks.acquire(session_id).await;
        tracing::debug!(session_id, "session lock acquired");
        SessionHandle {
            store: self,
            session_id: session_id.to_string(),
            _guard: guard,
        }
    }

    fn with_sqlite<T>(
        &self,
        f: impl FnOnce(&mut SqliteHistory) -> Result<T, HistoryError>,
    ) -> Result<T, HistoryError> {
        let mut sqlite = self
            .sqlite
            .lock()
            .map_err(|e| HistoryError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        f(&mut sqlite)
    }
}

/// Exclusive access to one session's history for the duration of a turn.
pub struct SessionHandle<'a> {
    store: &'a HistoryStore,
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionHandle<'_> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The newest `window` messages, oldest first.
    pub fn transcript(&self, window: usize) -> Result<Vec<Message>, HistoryError> {
        let entries = self
            .store
            .with_sqlite(|db| db.recent(&self.session_id, window))?;
        Ok(entries.iter().map(HistoryEntry::to_message).collect())
    }

    /// Append messages, then trim the session to the retention cap.
    pub fn record(&self, messages: &[Message]) -> Result<(), HistoryError> {
        let entries: Vec<HistoryEntry> = messages
            .iter()
            .map(|m| HistoryEntry::new(&self.session_id, m))
            .collect();
        let retention = self.store.retention;

        let trimmed = self.store.with_sqlite(|db| {
            db.append_batch(&entries)?;
            db.trim(&self.session_id, retention)
        })?;

        tracing::debug!(
            session_id = %self.session_id,
            appended = entries.len(),
            trimmed,
            "history recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store(retention: usize) -> HistoryStore {
        HistoryStore::new(
            SqliteHistory::open_in_memory().unwrap(),
            SessionLocks::new(),
            retention,
        )
    }

    #[tokio::test]
    async fn record_then_transcript() {
        let store = store(50);
        let session = store.begin("alice").await;
        session
            .record(&[Message::user("hi"), Message::assistant("hello!")])
            .unwrap();

        let transcript = session.transcript(10).unwrap();
        assert_eq!(
            transcript,
            vec![Message::user("hi"), Message::assistant("hello!")]
        );
    }

    #[tokio::test]
    async fn transcript_respects_window() {
        let store = store(50);
        let session = store.begin("alice").await;
        let batch: Vec<Message> = (0..6).map(|i| Message::user(format!("m{i}"))).collect();
        session.record(&batch).unwrap();

        let transcript = session.transcript(2).unwrap();
        assert_eq!(transcript, vec![Message::user("m4"), Message::user("m5")]);
    }

    #[tokio::test]
    async fn record_enforces_retention() {
        let store = store(4);
        let session = store.begin("alice").await;
        for i in 0..3 {
            session
                .record(&[
                    Message::user(format!("q{i}")),
                    Message::assistant(format!("a{i}")),
                ])
                .unwrap();
        }

        let transcript = session.transcript(100).unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0], Message::user("q1"));
    }

    #[tokio::test]
    async fn concurrent_turns_of_one_session_serialize() {
        let store = store(50);

        let first = async {
            let session = store.begin("alice").await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            session.record(&[Message::user("first")]).unwrap();
        };
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let session = store.begin("alice").await;
            // The first turn has already recorded by the time the lock is granted.
            let seen = session.transcript(10).unwrap();
            session.record(&[Message::user("second")]).unwrap();
            seen
        };

        let ((), seen) = tokio::join!(first, second);
        assert_eq!(seen, vec![Message::user("first")]);
    }

    #[test]
    fn from_config_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let config = HistoryConfig {
            sqlite_path: path.to_str().unwrap().to_string(),
            ..HistoryConfig::default()
        };

        let store = HistoryStore::from_config(&config);
        assert!(store.is_ok());
        assert!(path.exists());
    }
}
